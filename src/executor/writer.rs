//! Scheduler-owned connection writer
//!
//! The write half of the connection is owned by exactly one task; every
//! producer (heartbeat monitor, result reporter, offload threads) posts
//! frames through a [`WriterHandle`] and awaits the write's completion.
//! This keeps frames from interleaving and gives blocking threads a
//! post-and-wait path onto the scheduler that owns the socket.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::Frame;

/// Depth of the pending-write queue
const WRITE_QUEUE_SIZE: usize = 16;

struct WriteRequest {
    frame: Frame,
    done: oneshot::Sender<Result<()>>,
}

/// Cloneable handle posting frames to the writer task
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<WriteRequest>,
}

impl WriterHandle {
    /// Write a frame and await its completion (async contexts)
    pub async fn write(&self, frame: Frame) -> Result<()> {
        let (done, done_rx) = oneshot::channel();
        self.tx
            .send(WriteRequest { frame, done })
            .await
            .map_err(|_| Error::connection_lost("writer task is gone"))?;
        done_rx
            .await
            .map_err(|_| Error::connection_lost("writer task dropped the request"))?
    }

    /// Write a frame and wait for its completion from a blocking
    /// thread. Must never be called from the async scheduler.
    pub fn blocking_write(&self, frame: Frame) -> Result<()> {
        let (done, done_rx) = oneshot::channel();
        self.tx
            .blocking_send(WriteRequest { frame, done })
            .map_err(|_| Error::connection_lost("writer task is gone"))?;
        done_rx
            .blocking_recv()
            .map_err(|_| Error::connection_lost("writer task dropped the request"))?
    }
}

/// Spawn the writer task owning the connection's write half
pub fn spawn_writer<W>(mut write_half: W) -> (WriterHandle, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<WriteRequest>(WRITE_QUEUE_SIZE);

    let task = tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let op = request.frame.op_code();
            let result = write_frame(&mut write_half, &request.frame).await;
            match &result {
                Ok(()) => trace!(op = %op, "Frame written"),
                Err(e) => warn!(op = %op, error = %e, "Frame write failed"),
            }
            let _ = request.done.send(result);
        }
        debug!("Writer task finished");
    });

    (WriterHandle { tx }, task)
}

async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(&frame.encode())
        .await
        .map_err(|e| Error::connection_lost(format!("write failed: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| Error::connection_lost(format!("flush failed: {}", e)))?;
    Ok(())
}
