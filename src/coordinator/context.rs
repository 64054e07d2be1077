//! Per-call execution state.
//!
//! Each `execute_tasks` call owns one [`ExecutionContext`] holding its
//! running-id set and completed-result map, so concurrent calls on the same
//! coordinator never share task bookkeeping. Only the metrics store is
//! process-wide.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use crate::error::{ConvoyError, Result};
use crate::task::{AgentTask, AgentTaskResult, TaskStatus};

#[derive(Debug, Default)]
pub(crate) struct ExecutionContext {
    running: RwLock<HashSet<String>>,
    results: RwLock<HashMap<String, AgentTaskResult>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a task as running. A task id that is already running is a
    /// duplicate submission and a caller error.
    pub fn begin(&self, task_id: &str) -> Result<()> {
        let mut running = self.running.write();
        if !running.insert(task_id.to_string()) {
            return Err(ConvoyError::DuplicateTask(task_id.to_string()));
        }
        Ok(())
    }

    /// Records a terminal result and releases the running slot.
    pub fn finish(&self, result: AgentTaskResult) {
        self.running.write().remove(&result.task_id);
        self.results.write().insert(result.task_id.clone(), result);
    }

    /// Records a result for a task that was never started (skipped tasks).
    pub fn record(&self, result: AgentTaskResult) {
        self.results.write().insert(result.task_id.clone(), result);
    }

    /// Verifies every declared dependency has a `completed` result in this
    /// call. Returns the first unmet dependency otherwise.
    pub fn check_dependencies(&self, task: &AgentTask) -> Result<()> {
        let results = self.results.read();
        for dep in &task.depends_on {
            let met = results
                .get(dep)
                .map(|r| r.status == TaskStatus::Completed)
                .unwrap_or(false);
            if !met {
                return Err(ConvoyError::DependencyUnmet {
                    task_id: task.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
        Ok(())
    }

    /// Results in the submission order of the given tasks. Tasks that were
    /// never attempted (sequential abandonment) have no entry.
    pub fn results_for(&self, tasks: &[AgentTask]) -> Vec<AgentTaskResult> {
        let results = self.results.read();
        tasks
            .iter()
            .filter_map(|t| results.get(&t.id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::AgentOutput;
    use serde_json::json;

    #[test]
    fn duplicate_begin_rejected() {
        let ctx = ExecutionContext::new();
        ctx.begin("t1").unwrap();
        assert!(matches!(
            ctx.begin("t1"),
            Err(ConvoyError::DuplicateTask(_))
        ));
    }

    #[test]
    fn finish_releases_running_slot() {
        let ctx = ExecutionContext::new();
        ctx.begin("t1").unwrap();
        ctx.finish(AgentTaskResult::failed("t1", "boom"));
        // A fresh attempt with the same id is allowed again (retry path).
        assert!(ctx.begin("t1").is_ok());
    }

    #[test]
    fn dependency_check_requires_completed_status() {
        let ctx = ExecutionContext::new();
        let task = AgentTask::new("b", "review", json!({}))
            .with_dependencies(vec!["a".to_string()]);

        assert!(ctx.check_dependencies(&task).is_err());

        ctx.record(AgentTaskResult::failed("a", "boom"));
        assert!(matches!(
            ctx.check_dependencies(&task),
            Err(ConvoyError::DependencyUnmet { .. })
        ));

        ctx.record(AgentTaskResult::completed(
            "a",
            AgentOutput::success("review", json!({})),
        ));
        assert!(ctx.check_dependencies(&task).is_ok());
    }

    #[test]
    fn results_follow_submission_order() {
        let ctx = ExecutionContext::new();
        let tasks = vec![
            AgentTask::new("a", "review", json!({})),
            AgentTask::new("b", "review", json!({})),
        ];
        ctx.record(AgentTaskResult::failed("b", "boom"));
        ctx.record(AgentTaskResult::completed(
            "a",
            AgentOutput::success("review", json!({})),
        ));

        let results = ctx.results_for(&tasks);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].task_id, "a");
        assert_eq!(results[1].task_id, "b");
    }
}
