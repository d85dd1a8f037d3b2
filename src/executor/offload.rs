//! Execution offload engine and result reporter
//!
//! Task code is arbitrary: it may block, hang, or panic. Every
//! submission therefore runs on the blocking thread pool, never on the
//! scheduler driving the heartbeat and dispatch loops. The offload
//! thread reports the outcome itself: it posts the terminal frame to
//! the scheduler-owned writer, waits for the write to complete, and
//! then signals the supervisor to tear the connection down.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::protocol::{Frame, TaskSubmission};
use crate::task::{PackagePreparer, TaskRegistry};

use super::WriterHandle;

/// Terminal result of one task execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success,
    Failure { trace: String },
}

impl ExecutionOutcome {
    /// The terminal frame reporting this outcome
    pub fn to_frame(&self) -> Frame {
        match self {
            ExecutionOutcome::Success => Frame::TaskSuccess,
            ExecutionOutcome::Failure { trace } => Frame::TaskFail {
                trace: trace.clone(),
            },
        }
    }
}

/// Runs submissions on the blocking pool and reports their outcomes
pub struct OffloadEngine {
    registry: TaskRegistry,
    preparer: Arc<dyn PackagePreparer>,
    writer: WriterHandle,
    outcome_tx: mpsc::Sender<ExecutionOutcome>,
    task_id: i64,
}

impl OffloadEngine {
    pub fn new(
        registry: TaskRegistry,
        preparer: Arc<dyn PackagePreparer>,
        writer: WriterHandle,
        outcome_tx: mpsc::Sender<ExecutionOutcome>,
        task_id: i64,
    ) -> Self {
        Self {
            registry,
            preparer,
            writer,
            outcome_tx,
            task_id,
        }
    }

    /// Run a submission asynchronously. Returns immediately; the
    /// dispatch loop keeps reading frames while the task executes.
    pub fn submit(&self, submission: TaskSubmission) {
        let registry = self.registry.clone();
        let preparer = self.preparer.clone();
        let writer = self.writer.clone();
        let outcome_tx = self.outcome_tx.clone();
        let task_id = self.task_id;

        tokio::task::spawn_blocking(move || {
            let outcome = run_submission(&registry, preparer.as_ref(), &submission, task_id);

            match &outcome {
                ExecutionOutcome::Success => {
                    info!(task_id = task_id, "Task execute succeeded")
                }
                ExecutionOutcome::Failure { trace } => {
                    error!(task_id = task_id, trace = %trace, "Task execute failed")
                }
            }

            // post-and-wait: the write happens on the scheduler that
            // owns the connection, and this thread blocks until it is
            // flushed before signalling teardown
            if let Err(e) = writer.blocking_write(outcome.to_frame()) {
                error!(task_id = task_id, error = %e, "Failed to report task outcome");
                return;
            }
            info!(task_id = task_id, "Task outcome reported");

            let _ = outcome_tx.blocking_send(outcome);
        });
    }
}

/// Prepare dependencies, resolve the entry point and invoke `execute`
fn run_submission(
    registry: &TaskRegistry,
    preparer: &dyn PackagePreparer,
    submission: &TaskSubmission,
    task_id: i64,
) -> ExecutionOutcome {
    if let Err(e) = preparer.prepare(&submission.package_list()) {
        return ExecutionOutcome::Failure {
            trace: format_trace(&submission.entry_point, &e),
        };
    }

    let mut task = match registry.resolve(&submission.entry_point) {
        Ok(task) => task,
        Err(e) => {
            return ExecutionOutcome::Failure {
                trace: format_trace(&submission.entry_point, &e),
            }
        }
    };

    info!(task_id = task_id, entry_point = %submission.entry_point, "Task execute started");

    match catch_unwind(AssertUnwindSafe(|| task.execute())) {
        Ok(Ok(())) => ExecutionOutcome::Success,
        Ok(Err(e)) => ExecutionOutcome::Failure {
            trace: format_trace(&submission.entry_point, &*e),
        },
        Err(panic) => ExecutionOutcome::Failure {
            trace: format!(
                "task '{}' execute panicked: {}",
                submission.entry_point,
                panic_message(&panic)
            ),
        },
    }
}

/// Format a diagnostic trace: the error message plus its source chain
pub fn format_trace(entry_point: &str, err: &dyn std::error::Error) -> String {
    let mut trace = format!("task '{}' execute raised: {}", entry_point, err);
    let mut source = err.source();
    while let Some(cause) = source {
        trace.push_str(&format!("\ncaused by: {}", cause));
        source = cause.source();
    }
    trace
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
