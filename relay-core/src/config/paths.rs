//! Where the daemon looks for its configuration
//!
//! There is a single TOML file and no data directory. Its location is taken
//! from `--config`, then `RELAYGATE_CONFIG`, then the per-user config
//! directory, with `/etc` for accounts that have none (system services).

use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "RELAYGATE_CONFIG";

/// `~/.config/relaygate/config.toml`, or `/etc/relaygate/config.toml`
/// when the account has no config directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/etc"))
        .join("relaygate")
        .join("config.toml")
}

/// Pick the config file: command line, then environment, then default
///
/// An empty environment value counts as unset.
pub fn resolve_config_path(cli: Option<PathBuf>, env: Option<OsString>) -> PathBuf {
    cli.or_else(|| env.filter(|value| !value.is_empty()).map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}
