//! Relay board command protocol
//!
//! Every command is a fixed 4-byte frame:
//!
//! ```text
//! +------+---------+--------+----------+
//! | 0xA0 | channel | opcode | checksum |
//! +------+---------+--------+----------+
//! ```
//!
//! where `checksum = (0xA0 + channel + opcode) mod 256`. The board may answer
//! a query with a few status bytes; their layout is board-specific and is
//! passed through undecoded.

use std::fmt;

use crate::types::Channel;

/// Start-of-frame marker
pub const FRAME_HEADER: u8 = 0xA0;

/// Length of every command frame in bytes
pub const FRAME_LEN: usize = 4;

/// Opcodes understood by the relay board
///
/// The feedback variants ask the board to echo a confirmation. The driver
/// does not wait for it: all commands are fire-and-forget.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Switch the channel off (0x00)
    Off = 0x00,
    /// Switch the channel on (0x01)
    On = 0x01,
    /// Switch off and request confirmation (0x02)
    OffFeedback = 0x02,
    /// Switch on and request confirmation (0x03)
    OnFeedback = 0x03,
    /// Invert the channel state (0x04)
    Toggle = 0x04,
    /// Ask for the channel state (0x05)
    Query = 0x05,
}

impl Opcode {
    /// All opcodes, in wire order
    pub const ALL: [Opcode; 6] = [
        Opcode::Off,
        Opcode::On,
        Opcode::OffFeedback,
        Opcode::OnFeedback,
        Opcode::Toggle,
        Opcode::Query,
    ];

    /// Select the on/off opcode, with or without feedback
    pub fn switch(on: bool, feedback: bool) -> Self {
        match (on, feedback) {
            (true, false) => Opcode::On,
            (true, true) => Opcode::OnFeedback,
            (false, false) => Opcode::Off,
            (false, true) => Opcode::OffFeedback,
        }
    }

    /// Opcode byte as sent on the wire
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// A complete 4-byte command frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandFrame([u8; FRAME_LEN]);

impl CommandFrame {
    /// Raw bytes to write to the port
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// Channel byte
    pub fn channel(&self) -> u8 {
        self.0[1]
    }

    /// Opcode byte
    pub fn opcode(&self) -> u8 {
        self.0[2]
    }

    /// Checksum byte
    pub fn checksum(&self) -> u8 {
        self.0[3]
    }
}

impl fmt::Display for CommandFrame {
    /// Formats as upper-case hex bytes separated by spaces, e.g. `A0 01 01 A2`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{:02X} {:02X} {:02X} {:02X}", a, b, c, d)
    }
}

/// Compute the frame checksum for a channel and opcode byte
#[inline]
pub fn checksum(channel: u8, opcode: u8) -> u8 {
    FRAME_HEADER.wrapping_add(channel).wrapping_add(opcode)
}

/// Build the command frame for `opcode` on `channel`
///
/// The checksum is derived from the other three bytes on every call.
pub fn encode(channel: Channel, opcode: Opcode) -> CommandFrame {
    let ch = channel.get();
    let op = opcode.code();
    CommandFrame([FRAME_HEADER, ch, op, checksum(ch, op)])
}

/// Format raw bytes the same way frames are logged
pub fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(n: u8) -> Channel {
        Channel::new(n).unwrap()
    }

    #[test]
    fn test_encode_open_channel_one() {
        let frame = encode(ch(1), Opcode::On);
        assert_eq!(frame.as_bytes(), &[0xA0, 0x01, 0x01, 0xA2]);
    }

    #[test]
    fn test_encode_query_channel_three() {
        let frame = encode(ch(3), Opcode::Query);
        assert_eq!(frame.as_bytes(), &[0xA0, 0x03, 0x05, 0xA8]);
    }

    #[test]
    fn test_checksum_for_every_channel_and_opcode() {
        for n in 1..=255u8 {
            for opcode in Opcode::ALL {
                let frame = encode(ch(n), opcode);
                let expected = ((0xA0u32 + n as u32 + opcode as u32) % 256) as u8;
                assert_eq!(frame.as_bytes()[0], FRAME_HEADER);
                assert_eq!(frame.channel(), n);
                assert_eq!(frame.opcode(), opcode.code());
                assert_eq!(
                    frame.checksum(),
                    expected,
                    "channel {} opcode {:?}",
                    n,
                    opcode
                );
            }
        }
    }

    #[test]
    fn test_checksum_wraps_for_high_channels() {
        // 0xA0 + 0x60 + 0x00 = 0x100
        let frame = encode(ch(0x60), Opcode::Off);
        assert_eq!(frame.checksum(), 0x00);

        let frame = encode(ch(255), Opcode::Query);
        assert_eq!(frame.checksum(), 0xA4);
    }

    #[test]
    fn test_switch_opcode_selection() {
        assert_eq!(Opcode::switch(true, false), Opcode::On);
        assert_eq!(Opcode::switch(true, true), Opcode::OnFeedback);
        assert_eq!(Opcode::switch(false, false), Opcode::Off);
        assert_eq!(Opcode::switch(false, true), Opcode::OffFeedback);
    }

    #[test]
    fn test_opcode_table() {
        let codes: Vec<u8> = Opcode::ALL.iter().map(|op| op.code()).collect();
        assert_eq!(codes, vec![0x00, 0x01, 0x02, 0x03, 0x04, 0x05]);
    }

    #[test]
    fn test_frame_display() {
        assert_eq!(encode(ch(2), Opcode::OffFeedback).to_string(), "A0 02 02 A4");
        assert_eq!(encode(ch(16), Opcode::Toggle).to_string(), "A0 10 04 B4");
    }

    #[test]
    fn test_hex_string() {
        assert_eq!(hex_string(&[]), "");
        assert_eq!(hex_string(&[0xA0, 0x01, 0x05, 0xA6]), "A0 01 05 A6");
    }
}
