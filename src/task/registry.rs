//! Task registry — the code loader seam
//!
//! Resolves a qualified entry point (e.g. `demo.CounterTask`) into a
//! fresh task instance. Production deployments register their own task
//! factories; the built-in demo tasks are registered by
//! `TaskRegistry::with_builtin`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Error, Result};

use super::builtin;
use super::Task;

/// Factory producing a fresh task instance
pub type TaskFactory = Arc<dyn Fn() -> Box<dyn Task> + Send + Sync>;

/// Registry of known task entry points
#[derive(Clone, Default)]
pub struct TaskRegistry {
    factories: Arc<RwLock<HashMap<String, TaskFactory>>>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the built-in demo tasks
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        builtin::register_builtin(&registry);
        registry
    }

    /// Register a task factory under a qualified entry point
    pub fn register<F>(&self, entry_point: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Task> + Send + Sync + 'static,
    {
        let entry_point = entry_point.into();
        debug!(entry_point = %entry_point, "Registered task factory");
        self.factories
            .write()
            .insert(entry_point, Arc::new(factory));
    }

    /// Resolve an entry point into a fresh task instance
    pub fn resolve(&self, entry_point: &str) -> Result<Box<dyn Task>> {
        let factories = self.factories.read();
        let factory = factories
            .get(entry_point)
            .ok_or_else(|| Error::TaskNotFound {
                entry_point: entry_point.to_string(),
            })?;
        Ok(factory())
    }

    /// Check whether an entry point is registered
    pub fn contains(&self, entry_point: &str) -> bool {
        self.factories.read().contains_key(entry_point)
    }

    /// Registered entry point names, sorted
    pub fn entry_points(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Capability;

    struct NopTask;

    impl Task for NopTask {
        fn capabilities(&self) -> &[Capability] {
            &[Capability::Execute]
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = TaskRegistry::new();
        registry.register("test.NopTask", || Box::new(NopTask));

        assert!(registry.contains("test.NopTask"));
        let mut task = registry.resolve("test.NopTask").unwrap();
        assert!(task.execute().is_ok());
    }

    #[test]
    fn test_resolve_unknown_entry_point() {
        let registry = TaskRegistry::new();
        assert!(matches!(
            registry.resolve("missing.Task"),
            Err(Error::TaskNotFound { .. })
        ));
    }

    #[test]
    fn test_builtin_registry() {
        let registry = TaskRegistry::with_builtin();
        assert!(registry.contains("demo.OkTask"));
        assert!(registry.contains("demo.FailTask"));
        assert!(registry.contains("demo.SleepTask"));
        assert!(registry.contains("demo.CounterTask"));
    }

    #[test]
    fn test_entry_points_sorted() {
        let registry = TaskRegistry::new();
        registry.register("b.Task", || Box::new(NopTask));
        registry.register("a.Task", || Box::new(NopTask));
        assert_eq!(registry.entry_points(), vec!["a.Task", "b.Task"]);
    }
}
