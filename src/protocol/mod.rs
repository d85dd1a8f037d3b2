//! Wire protocol for worker ↔ task manager communication
//!
//! The protocol is a sequence of single-op-code frames over one TCP
//! connection, big-endian throughout (the manager side uses network
//! byte order for all multi-byte integers).

mod codec;
mod opcode;
mod submission;

pub use codec::*;
pub use opcode::*;
pub use submission::*;
