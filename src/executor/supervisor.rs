//! Connection supervisor
//!
//! Owns one session against the task manager: connect, handshake, then
//! run the heartbeat monitor and dispatch loop concurrently until a
//! terminal event, then cancel both (idempotently) and close the
//! connection. Terminal events surface as an [`ExitStatus`] returned to
//! the caller instead of a process exit buried in a dispatch branch.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{Error, ErrorCode, Result};
use crate::protocol::encode_handshake;
use crate::task::{PackagePreparer, TaskRegistry};

use super::{run_dispatch, run_heartbeat, spawn_writer, ExecutionOutcome, OffloadEngine};

// ─────────────────────────────────────────────────────────────────
// Exit Status
// ─────────────────────────────────────────────────────────────────

/// Terminal state of one supervisor run
#[derive(Debug)]
pub enum ExitStatus {
    /// A submission ran to completion and its outcome was reported
    Completed(ExecutionOutcome),
    /// The manager sent TASK_KILL; nothing further was written
    Killed,
    /// The manager sent an op code outside the protocol
    ProtocolViolation { op_code: u8 },
    /// The connection or a payload failed mid-session
    Faulted(Error),
}

impl ExitStatus {
    /// Map to a process exit code. A reported outcome and an ordered
    /// kill are both clean exits; the peer already knows everything
    /// it needs to know.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExitStatus::Completed(_) | ExitStatus::Killed => 0,
            ExitStatus::ProtocolViolation { .. } => ErrorCode::ProtocolViolation.exit_code(),
            ExitStatus::Faulted(e) => e.exit_code(),
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Completed(ExecutionOutcome::Success) => write!(f, "completed: success"),
            ExitStatus::Completed(ExecutionOutcome::Failure { .. }) => {
                write!(f, "completed: failure reported")
            }
            ExitStatus::Killed => write!(f, "killed by task manager"),
            ExitStatus::ProtocolViolation { op_code } => {
                write!(f, "protocol violation (op 0x{:02x})", op_code)
            }
            ExitStatus::Faulted(e) => write!(f, "faulted: {}", e),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Supervisor
// ─────────────────────────────────────────────────────────────────

/// Configuration for one supervisor run
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Task manager host
    pub host: String,

    /// Task manager port
    pub port: u16,

    /// Worker-assigned task id sent at handshake
    pub task_id: i64,

    /// Heartbeat emission interval
    pub heartbeat_interval: Duration,

    /// Connection establishment timeout
    pub connect_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 21000,
            task_id: 0,
            heartbeat_interval: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Orchestrates one connection lifetime
pub struct ConnectionSupervisor {
    config: SupervisorConfig,
    registry: TaskRegistry,
    preparer: Arc<dyn PackagePreparer>,
}

impl ConnectionSupervisor {
    pub fn new(
        config: SupervisorConfig,
        registry: TaskRegistry,
        preparer: Arc<dyn PackagePreparer>,
    ) -> Self {
        Self {
            config,
            registry,
            preparer,
        }
    }

    /// Run the session to its terminal state.
    ///
    /// Handshake failures are fatal and surface as `Err`; everything
    /// after a successful handshake resolves to an `ExitStatus`.
    pub async fn run(self) -> Result<ExitStatus> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!(addr = %addr, task_id = self.config.task_id, "Connecting to task manager");

        let stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::connection_failed(addr.as_str(), "connect timed out"))?
            .map_err(|e| Error::connection_failed(addr.as_str(), e.to_string()))?;

        let (read_half, mut write_half) = stream.into_split();

        // Handshake goes out before any other frame
        let handshake = encode_handshake(self.config.task_id, std::process::id());
        write_half
            .write_all(&handshake)
            .await
            .map_err(|e| Error::handshake_failed(e.to_string()))?;
        write_half
            .flush()
            .await
            .map_err(|e| Error::handshake_failed(e.to_string()))?;
        info!(task_id = self.config.task_id, "Handshake sent");

        let (writer, writer_task) = spawn_writer(write_half);
        let (outcome_tx, mut outcome_rx) = mpsc::channel(1);
        let engine = OffloadEngine::new(
            self.registry,
            self.preparer,
            writer.clone(),
            outcome_tx,
            self.config.task_id,
        );

        let mut heartbeat = tokio::spawn(run_heartbeat(
            writer.clone(),
            self.config.heartbeat_interval,
        ));
        let mut dispatch = tokio::spawn(run_dispatch(read_half, engine));

        let status = tokio::select! {
            res = &mut dispatch => match res {
                Ok(status) => status,
                Err(e) => ExitStatus::Faulted(Error::Internal(format!(
                    "dispatch task failed: {}", e
                ))),
            },
            res = &mut heartbeat => {
                let err = match res {
                    Ok(Err(e)) => e,
                    Ok(Ok(())) => Error::Internal("heartbeat loop ended unexpectedly".to_string()),
                    Err(e) => Error::Internal(format!("heartbeat task failed: {}", e)),
                };
                ExitStatus::Faulted(err)
            }
            Some(outcome) = outcome_rx.recv() => ExitStatus::Completed(outcome),
        };

        // Idempotent teardown: cancel both activities and drop the
        // connection. In-flight offload work is abandoned, not awaited.
        heartbeat.abort();
        dispatch.abort();
        writer_task.abort();
        debug!("Supervised activities cancelled");

        info!(status = %status, "Connection supervisor finished");
        Ok(status)
    }
}
