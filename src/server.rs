//! Stateful task RPC server
//!
//! Serves one lifecycle action per connection. The client sends a
//! 4-byte-length-prefixed JSON descriptor naming the entry point,
//! packages and action; for every action other than `init` a second
//! length-prefixed block carries the task state saved by the previous
//! call. The response is an 8-byte-length-prefixed JSON envelope with
//! the action result and, on success, the task's new state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{read_block, write_block8, TaskSubmission};
use crate::task::{
    has_capability, invoke, Capability, PackagePreparer, TaskRegistry, TaskState,
    STATE_FORMAT_VERSION,
};

// ─────────────────────────────────────────────────────────────────
// Response Envelope
// ─────────────────────────────────────────────────────────────────

/// JSON envelope returned for every RPC action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub format_version: u32,

    /// Whether the action ran without error
    pub ok: bool,

    /// Diagnostic message when `ok` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// The task's state after the action, for the next call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskState>,
}

impl ActionResponse {
    fn success(task: TaskState) -> Self {
        Self {
            format_version: STATE_FORMAT_VERSION,
            ok: true,
            error: None,
            task: Some(task),
        }
    }

    fn failure(err: &Error) -> Self {
        Self {
            format_version: STATE_FORMAT_VERSION,
            ok: false,
            error: Some(err.format_for_log()),
            task: None,
        }
    }

    /// Serialize to the wire blob
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Internal(e.to_string()))
    }

    /// Decode a wire blob
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::StateDecode {
            message: e.to_string(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────

/// Accept loop for the stateful task RPC service
pub struct TaskRpcServer {
    listener: TcpListener,
    registry: TaskRegistry,
    preparer: Arc<dyn PackagePreparer>,
}

impl TaskRpcServer {
    /// Bind the service to an address
    pub async fn bind(
        addr: &str,
        registry: TaskRegistry,
        preparer: Arc<dyn PackagePreparer>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::connection_failed(addr, e.to_string()))?;
        Ok(Self {
            listener,
            registry,
            preparer,
        })
    }

    /// The bound local address
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::Internal(e.to_string()))
    }

    /// Run the accept loop forever
    pub async fn run(self) -> Result<()> {
        info!(addr = %self.local_addr()?, "Task RPC server listening");

        loop {
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .map_err(|e| Error::connection_lost(format!("accept failed: {}", e)))?;
            debug!(peer = %peer, "Accepted RPC connection");

            let registry = self.registry.clone();
            let preparer = self.preparer.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_request(stream, registry, preparer).await {
                    warn!(peer = %peer, error = %e, "RPC request failed");
                }
            });
        }
    }
}

/// Serve one action request on one connection.
///
/// Action errors are reported in-band through the response envelope;
/// only transport failures surface as `Err` here.
async fn handle_request(
    mut stream: TcpStream,
    registry: TaskRegistry,
    preparer: Arc<dyn PackagePreparer>,
) -> Result<()> {
    let descriptor = read_block(&mut stream).await?;
    let submission = match parse_descriptor(&descriptor) {
        Ok(submission) => submission,
        Err(e) => {
            error!(error = %e, "Undecodable RPC descriptor");
            return respond(&mut stream, ActionResponse::failure(&e)).await;
        }
    };

    let action = match required_action(&submission) {
        Ok(action) => action,
        Err(e) => return respond(&mut stream, ActionResponse::failure(&e)).await,
    };

    // every action except init consumes the previously saved state
    let prior_state = if action != Capability::Init {
        match TaskState::decode(&read_block(&mut stream).await?) {
            Ok(state) => Some(state),
            Err(e) => {
                error!(error = %e, "Undecodable task state blob");
                return respond(&mut stream, ActionResponse::failure(&e)).await;
            }
        }
    } else {
        None
    };

    info!(
        entry_point = %submission.entry_point,
        action = %action,
        task_id = submission.task_id,
        "RPC action started"
    );

    // lifecycle methods are arbitrary task code; run them off the
    // scheduler like any other execution
    let result = tokio::task::spawn_blocking(move || {
        run_action(&registry, preparer.as_ref(), &submission, action, prior_state)
    })
    .await
    .map_err(|e| Error::Internal(format!("action task failed: {}", e)))?;

    let response = match result {
        Ok(state) => ActionResponse::success(state),
        Err(e) => {
            error!(error = %e, "RPC action failed");
            ActionResponse::failure(&e)
        }
    };
    respond(&mut stream, response).await
}

fn parse_descriptor(bytes: &[u8]) -> Result<TaskSubmission> {
    let json = std::str::from_utf8(bytes).map_err(|e| Error::ProtocolMalformed {
        message: format!("descriptor is not valid UTF-8: {}", e),
    })?;
    TaskSubmission::from_json(json)
}

fn required_action(submission: &TaskSubmission) -> Result<Capability> {
    let name = submission.action.as_deref().ok_or(Error::ProtocolMalformed {
        message: "descriptor is missing the 'action' field".to_string(),
    })?;
    Capability::from_action(name).ok_or_else(|| Error::ProtocolMalformed {
        message: format!("unknown action '{}'", name),
    })
}

/// Resolve, restore, invoke and re-capture. Blocking.
fn run_action(
    registry: &TaskRegistry,
    preparer: &dyn PackagePreparer,
    submission: &TaskSubmission,
    action: Capability,
    prior_state: Option<TaskState>,
) -> Result<TaskState> {
    let entry_point = match &prior_state {
        // resolve through the saved state so a renamed descriptor
        // cannot detach an action from the task it belongs to
        Some(state) => state.entry_point.clone(),
        None => {
            preparer.prepare(&submission.package_list())?;
            submission.entry_point.clone()
        }
    };

    let mut task = registry.resolve(&entry_point)?;

    if let Some(state) = prior_state {
        task.restore_state(state.state)
            .map_err(|e| Error::StateDecode {
                message: e.to_string(),
            })?;
    }

    // an action the task does not declare is a contract violation in
    // both branches, init included
    if !has_capability(task.as_ref(), action) {
        return Err(Error::missing_capability(
            entry_point.as_str(),
            action.action_name(),
        ));
    }

    invoke(task.as_mut(), action)
        .map_err(|e| Error::execution_failed(submission.task_id, e.to_string()))?;

    TaskState::capture(&entry_point, task.as_ref())
}

async fn respond(stream: &mut TcpStream, response: ActionResponse) -> Result<()> {
    let blob = response.encode()?;
    write_block8(stream, &blob).await
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
