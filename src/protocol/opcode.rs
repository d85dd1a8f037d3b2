//! Protocol op codes
//!
//! One byte per frame type. The values are fixed constants shared with
//! the task manager side and must never be renumbered.

use std::fmt;

/// Protocol version byte sent in the handshake frame
pub const PROTOCOL_VERSION: u8 = 0x02;

/// Handshake frame length: task_id:8 + pid:4 + version:1
pub const HANDSHAKE_LEN: usize = 13;

/// Frame type tag, the first byte of every non-handshake frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Keep-alive, no payload, both directions
    Heartbeat = 0x01,
    /// Work order (manager → worker), length-prefixed JSON payload
    TaskSubmit = 0x02,
    /// Terminal success outcome (worker → manager), no payload
    TaskSuccess = 0x03,
    /// Terminal failure outcome (worker → manager), length-prefixed trace text
    TaskFail = 0x04,
    /// Unconditional shutdown command (manager → worker), no payload
    TaskKill = 0x05,
}

impl OpCode {
    /// Parse an op code byte; `None` for anything outside the protocol
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(OpCode::Heartbeat),
            0x02 => Some(OpCode::TaskSubmit),
            0x03 => Some(OpCode::TaskSuccess),
            0x04 => Some(OpCode::TaskFail),
            0x05 => Some(OpCode::TaskKill),
            _ => None,
        }
    }

    /// The wire byte for this op code
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpCode::Heartbeat => "HEARTBEAT",
            OpCode::TaskSubmit => "TASK_SUBMIT",
            OpCode::TaskSuccess => "TASK_SUCCESS",
            OpCode::TaskFail => "TASK_FAIL",
            OpCode::TaskKill => "TASK_KILL",
        };
        write!(f, "{}", name)
    }
}
