//! Simulated relay board
//!
//! `MockBackend` stands in for `/dev` and the serial port. Nodes can be
//! attached and detached at runtime to simulate hotplug, and every frame
//! written is recorded. The daemon uses it for `--mock` mode; the tests use it
//! to drive discovery and reconnection deterministically.

use async_trait::async_trait;
use relay_core::protocol::{CommandFrame, Opcode};
use relay_core::{BoardConfig, DefaultBoard, DevicePath, RelayError, Result};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use crate::serial_driver::{DeviceBackend, RelayTransport};

struct MockNode {
    openable: bool,
    vendor_id: Option<u16>,
}

#[derive(Default)]
struct MockState {
    nodes: BTreeMap<DevicePath, MockNode>,
    /// Replies handed out by `read_available`, oldest first
    responses: VecDeque<Vec<u8>>,
    /// Echo query frames back as the reply
    echo_queries: bool,
    sent: Vec<(DevicePath, CommandFrame)>,
    list_calls: usize,
    open_calls: usize,
    live_handles: usize,
    max_live_handles: usize,
}

/// Simulated device backend
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Backend with no nodes attached
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend with one board attached at `path` that answers queries
    pub fn simulated_board(path: &str) -> Self {
        let backend = Self::new();
        backend.attach(path);
        backend.lock().echo_queries = true;
        backend
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make a relay board node appear
    pub fn attach(&self, path: &str) {
        self.attach_with_vendor(path, Some(DefaultBoard::USB_VID));
    }

    /// Make a node appear for some other USB serial adapter
    ///
    /// `None` simulates a node whose vendor id cannot be read.
    pub fn attach_with_vendor(&self, path: &str, vendor_id: Option<u16>) {
        debug!("Mock: attach {} (vendor {:?})", path, vendor_id);
        self.lock().nodes.insert(
            DevicePath::new(path),
            MockNode {
                openable: true,
                vendor_id,
            },
        );
    }

    /// Make a node disappear
    pub fn detach(&self, path: &str) {
        debug!("Mock: detach {}", path);
        self.lock().nodes.remove(&DevicePath::new(path));
    }

    /// Keep a node listed but make opening it fail
    pub fn set_openable(&self, path: &str, openable: bool) {
        if let Some(node) = self.lock().nodes.get_mut(&DevicePath::new(path)) {
            node.openable = openable;
        }
    }

    /// Queue bytes for the next `read_available`
    pub fn queue_response(&self, bytes: Vec<u8>) {
        self.lock().responses.push_back(bytes);
    }

    /// Every frame written so far, in order
    pub fn sent_frames(&self) -> Vec<CommandFrame> {
        self.lock().sent.iter().map(|(_, frame)| *frame).collect()
    }

    /// Every frame written so far, with the node it went to
    pub fn sent_with_paths(&self) -> Vec<(DevicePath, CommandFrame)> {
        self.lock().sent.clone()
    }

    /// Number of `list_nodes` calls
    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    /// Number of `open` calls, probes included
    pub fn open_calls(&self) -> usize {
        self.lock().open_calls
    }

    /// Handles currently open
    pub fn live_handles(&self) -> usize {
        self.lock().live_handles
    }

    /// Highest number of handles ever open at the same time
    pub fn max_live_handles(&self) -> usize {
        self.lock().max_live_handles
    }
}

impl DeviceBackend for MockBackend {
    fn list_nodes(&self, prefix: &str) -> Result<Vec<DevicePath>> {
        let mut state = self.lock();
        state.list_calls += 1;
        // BTreeMap keys are already in lexical order
        Ok(state
            .nodes
            .keys()
            .filter(|path| path.file_name().starts_with(prefix))
            .cloned()
            .collect())
    }

    fn is_present(&self, path: &DevicePath) -> bool {
        self.lock().nodes.contains_key(path)
    }

    fn vendor_id(&self, path: &DevicePath) -> Option<u16> {
        self.lock().nodes.get(path).and_then(|node| node.vendor_id)
    }

    fn open(
        &self,
        path: &DevicePath,
        _baud_rate: u32,
        _timeout: Duration,
    ) -> Result<Box<dyn RelayTransport>> {
        let mut state = self.lock();
        state.open_calls += 1;

        match state.nodes.get(path).map(|node| node.openable) {
            Some(true) => {
                state.live_handles += 1;
                state.max_live_handles = state.max_live_handles.max(state.live_handles);
                Ok(Box::new(MockTransport {
                    path: path.clone(),
                    state: self.state.clone(),
                }))
            }
            Some(false) => Err(RelayError::Open {
                path: path.to_string(),
                reason: "Device or resource busy".to_string(),
            }),
            None => Err(RelayError::Open {
                path: path.to_string(),
                reason: "No such file or directory".to_string(),
            }),
        }
    }
}

/// Handle on a simulated node
struct MockTransport {
    path: DevicePath,
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RelayTransport for MockTransport {
    async fn write_frame(&mut self, frame: &CommandFrame) -> Result<()> {
        let mut state = self.lock();
        if !state.nodes.contains_key(&self.path) {
            return Err(RelayError::Serial("No such device".to_string()));
        }
        state.sent.push((self.path.clone(), *frame));
        if state.echo_queries && frame.opcode() == Opcode::Query.code() {
            state.responses.push_back(frame.as_bytes().to_vec());
        }
        Ok(())
    }

    async fn read_available(&mut self) -> Result<Vec<u8>> {
        let mut state = self.lock();
        if !state.nodes.contains_key(&self.path) {
            return Err(RelayError::Serial("No such device".to_string()));
        }
        Ok(state.responses.pop_front().unwrap_or_default())
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        let mut state = self.lock();
        state.live_handles = state.live_handles.saturating_sub(1);
    }
}
