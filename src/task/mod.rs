//! Task model
//!
//! A task is the polymorphic unit of user-supplied work. It exposes up
//! to six lifecycle capabilities; any subset may be implemented, and
//! absent ones default to no-ops. The stateful RPC variant additionally
//! round-trips a task's field state between calls through an explicit,
//! versioned encoding contract instead of opaque object serialization.

mod builtin;
mod packages;
mod registry;

pub use packages::*;
pub use registry::*;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Current task state blob format version
pub const STATE_FORMAT_VERSION: u32 = 1;

/// Error type raised by task code
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for task lifecycle methods
pub type TaskResult<T> = std::result::Result<T, TaskError>;

// ─────────────────────────────────────────────────────────────────
// Capabilities
// ─────────────────────────────────────────────────────────────────

/// The lifecycle capability set a task may implement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Init,
    Execute,
    OnSuccess,
    OnError,
    OnLost,
    OnKilled,
}

impl Capability {
    /// All capabilities, in lifecycle order
    pub const ALL: [Capability; 6] = [
        Capability::Init,
        Capability::Execute,
        Capability::OnSuccess,
        Capability::OnError,
        Capability::OnLost,
        Capability::OnKilled,
    ];

    /// Map an action name from the wire to a capability
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "init" => Some(Capability::Init),
            "execute" => Some(Capability::Execute),
            "on_success" => Some(Capability::OnSuccess),
            "on_error" => Some(Capability::OnError),
            "on_lost" => Some(Capability::OnLost),
            "on_killed" => Some(Capability::OnKilled),
            _ => None,
        }
    }

    /// The wire action name of this capability
    pub fn action_name(self) -> &'static str {
        match self {
            Capability::Init => "init",
            Capability::Execute => "execute",
            Capability::OnSuccess => "on_success",
            Capability::OnError => "on_error",
            Capability::OnLost => "on_lost",
            Capability::OnKilled => "on_killed",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.action_name())
    }
}

// ─────────────────────────────────────────────────────────────────
// Task Trait
// ─────────────────────────────────────────────────────────────────

/// User-supplied unit of work.
///
/// Lifecycle methods default to no-ops; `capabilities` declares which
/// ones the task genuinely implements, which is what action-by-name
/// lookup consults. Task code may block and run indefinitely — it is
/// always invoked from the offload thread pool, never from the
/// connection's scheduler.
pub trait Task: Send {
    /// The lifecycle methods this task actually implements
    fn capabilities(&self) -> &[Capability];

    fn init(&mut self) -> TaskResult<()> {
        Ok(())
    }

    fn execute(&mut self) -> TaskResult<()> {
        Ok(())
    }

    fn on_success(&mut self) -> TaskResult<()> {
        Ok(())
    }

    fn on_error(&mut self) -> TaskResult<()> {
        Ok(())
    }

    fn on_lost(&mut self) -> TaskResult<()> {
        Ok(())
    }

    fn on_killed(&mut self) -> TaskResult<()> {
        Ok(())
    }

    /// Serialize the task's field state for the RPC round-trip
    fn save_state(&self) -> TaskResult<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    /// Restore the task's field state from a previous `save_state`
    fn restore_state(&mut self, _state: serde_json::Value) -> TaskResult<()> {
        Ok(())
    }
}

/// Check whether a task declares a capability
pub fn has_capability(task: &dyn Task, cap: Capability) -> bool {
    task.capabilities().contains(&cap)
}

/// Invoke one lifecycle method by capability
pub fn invoke(task: &mut dyn Task, cap: Capability) -> TaskResult<()> {
    match cap {
        Capability::Init => task.init(),
        Capability::Execute => task.execute(),
        Capability::OnSuccess => task.on_success(),
        Capability::OnError => task.on_error(),
        Capability::OnLost => task.on_lost(),
        Capability::OnKilled => task.on_killed(),
    }
}

// ─────────────────────────────────────────────────────────────────
// State Blob
// ─────────────────────────────────────────────────────────────────

/// Versioned task state envelope round-tripped by the RPC server.
///
/// Carries the entry point so the receiving side can re-resolve the
/// concrete task type before feeding it the saved field state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskState {
    pub format_version: u32,
    pub entry_point: String,
    pub state: serde_json::Value,
}

impl TaskState {
    /// Capture a task's state under the current format version
    pub fn capture(entry_point: &str, task: &dyn Task) -> Result<Self> {
        let state = task.save_state().map_err(|e| Error::StateEncode {
            message: e.to_string(),
        })?;
        Ok(Self {
            format_version: STATE_FORMAT_VERSION,
            entry_point: entry_point.to_string(),
            state,
        })
    }

    /// Encode to the wire blob
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::StateEncode {
            message: e.to_string(),
        })
    }

    /// Decode a wire blob, rejecting unknown format versions
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let state: TaskState = serde_json::from_slice(bytes).map_err(|e| Error::StateDecode {
            message: e.to_string(),
        })?;
        if state.format_version != STATE_FORMAT_VERSION {
            return Err(Error::StateVersion {
                expected: STATE_FORMAT_VERSION,
                found: state.format_version,
            });
        }
        Ok(state)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
