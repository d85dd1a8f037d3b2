//! Heartbeat monitor
//!
//! Emits a HEARTBEAT frame at a fixed interval for the lifetime of the
//! connection, independent of whether a submitted task is executing.
//! A failed heartbeat write means the peer is gone and is fatal.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::error::Result;
use crate::protocol::Frame;

use super::WriterHandle;

/// Run the heartbeat loop. Returns only on a fatal write failure;
/// otherwise it runs until cancelled by the supervisor.
pub async fn run_heartbeat(writer: WriterHandle, interval: Duration) -> Result<()> {
    let mut timer = tokio::time::interval(interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately; the first beat goes out
    // one full interval after startup
    timer.tick().await;

    loop {
        timer.tick().await;
        debug!("Send HEARTBEAT");
        writer.write(Frame::Heartbeat).await?;
    }
}
