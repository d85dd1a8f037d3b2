//! Task dispatch loop
//!
//! Reads one frame at a time from the connection and routes it. The
//! loop never waits for a submission to finish executing; it resolves
//! to an [`ExitStatus`] instead of terminating the process, and the
//! supervisor performs the actual teardown.

use tokio::io::AsyncRead;
use tracing::{debug, error, info};

use crate::error::Error;
use crate::protocol::{read_frame, Frame, TaskSubmission};

use super::{ExitStatus, OffloadEngine};

/// Run the dispatch loop until a terminal frame or a connection fault.
///
/// Cancellation mid-read (supervisor teardown) ends the loop without
/// error; the returned status is then never observed.
pub async fn run_dispatch<R>(mut reader: R, engine: OffloadEngine) -> ExitStatus
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_frame(&mut reader).await {
            Ok(Frame::TaskSubmit { payload }) => match TaskSubmission::from_json(&payload) {
                Ok(submission) => {
                    info!(entry_point = %submission.entry_point, "Received task submission");
                    engine.submit(submission);
                }
                Err(e) => {
                    error!(error = %e, "Undecodable task submission");
                    return ExitStatus::Faulted(e);
                }
            },
            Ok(Frame::TaskKill) => {
                info!("Received kill command");
                return ExitStatus::Killed;
            }
            Ok(Frame::Heartbeat) => {
                // peer's own keep-alive
                debug!("HEARTBEAT");
            }
            Ok(frame) => {
                // outcome frames are already rejected by the codec;
                // this arm keeps the match total
                let op_code = frame.op_code().as_u8();
                error!(op = %frame.op_code(), "Unexpected frame direction");
                return ExitStatus::ProtocolViolation { op_code };
            }
            Err(Error::ProtocolViolation { op_code }) => {
                error!(op_code = %format!("0x{:02x}", op_code), "Unrecognized op code");
                return ExitStatus::ProtocolViolation { op_code };
            }
            Err(e) => {
                error!(error = %e, "Connection read failed");
                return ExitStatus::Faulted(e);
            }
        }
    }
}
