//! Built-in demo tasks
//!
//! Small tasks used by the integration tests and as a reference for
//! what a registered task looks like. `CounterTask` additionally
//! demonstrates the state round-trip contract used by the RPC server.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Capability, Task, TaskRegistry, TaskResult};

/// Register all demo tasks under the `demo.*` namespace
pub fn register_builtin(registry: &TaskRegistry) {
    registry.register("demo.OkTask", || Box::new(OkTask));
    registry.register("demo.FailTask", || Box::new(FailTask));
    registry.register("demo.SleepTask", || Box::new(SleepTask::default()));
    registry.register("demo.CounterTask", || Box::new(CounterTask::default()));
}

/// Task whose `execute` returns normally
pub struct OkTask;

impl Task for OkTask {
    fn capabilities(&self) -> &[Capability] {
        &[Capability::Init, Capability::Execute, Capability::OnSuccess]
    }

    fn execute(&mut self) -> TaskResult<()> {
        info!("OkTask executed");
        Ok(())
    }
}

/// Task whose `execute` always raises
pub struct FailTask;

impl FailTask {
    pub const FAILURE_MESSAGE: &'static str = "execute failure";
}

impl Task for FailTask {
    fn capabilities(&self) -> &[Capability] {
        &[Capability::Init, Capability::Execute, Capability::OnError]
    }

    fn execute(&mut self) -> TaskResult<()> {
        Err(Self::FAILURE_MESSAGE.into())
    }
}

/// Task whose `execute` blocks for a while, exercising the offload path
pub struct SleepTask {
    duration: Duration,
}

impl Default for SleepTask {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(60),
        }
    }
}

impl Task for SleepTask {
    fn capabilities(&self) -> &[Capability] {
        &[Capability::Execute]
    }

    fn execute(&mut self) -> TaskResult<()> {
        std::thread::sleep(self.duration);
        Ok(())
    }
}

/// Stateful task counting lifecycle invocations across RPC calls
#[derive(Default)]
pub struct CounterTask {
    fields: CounterFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CounterFields {
    executions: u64,
    successes: u64,
}

impl Task for CounterTask {
    fn capabilities(&self) -> &[Capability] {
        &[Capability::Init, Capability::Execute, Capability::OnSuccess]
    }

    fn init(&mut self) -> TaskResult<()> {
        self.fields = CounterFields::default();
        Ok(())
    }

    fn execute(&mut self) -> TaskResult<()> {
        self.fields.executions += 1;
        Ok(())
    }

    fn on_success(&mut self) -> TaskResult<()> {
        self.fields.successes += 1;
        Ok(())
    }

    fn save_state(&self) -> TaskResult<serde_json::Value> {
        serde_json::to_value(&self.fields).map_err(Into::into)
    }

    fn restore_state(&mut self, state: serde_json::Value) -> TaskResult<()> {
        self.fields = serde_json::from_value(state)?;
        Ok(())
    }
}
