//! Connection-and-execution supervisor
//!
//! Runs one session against the task manager:
//! - the supervisor performs the handshake and owns teardown
//! - the heartbeat monitor and dispatch loop run concurrently on the
//!   async scheduler over the same connection
//! - submitted task code runs on the blocking offload pool so it can
//!   never starve the heartbeat or the kill channel
//! - all writes go through a single scheduler-owned writer task

mod dispatch;
mod heartbeat;
mod offload;
mod supervisor;
mod writer;

pub use dispatch::*;
pub use heartbeat::*;
pub use offload::*;
pub use supervisor::*;
pub use writer::*;
