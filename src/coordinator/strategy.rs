//! Execution strategy selection.

use std::sync::Arc;

use crate::task::AgentTask;

/// Predicate deciding whether a conditional task executes.
pub type TaskPredicate = Arc<dyn Fn(&AgentTask) -> bool + Send + Sync>;

/// How a submitted task set is scheduled.
#[derive(Clone)]
pub enum ExecutionStrategy {
    /// Dependency levels run one after another; tasks within a level run
    /// concurrently, bounded by `max_concurrency`, with all-settled
    /// semantics.
    Parallel,
    /// One task at a time in resolved order. Unless the coordinator is
    /// configured to continue past failures, a failing task abandons the
    /// remainder (never attempted, no result recorded).
    Sequential,
    /// Each task is gated by a predicate; a false predicate records the task
    /// as skipped with zero execution time.
    Conditional(TaskPredicate),
}

impl ExecutionStrategy {
    /// Convenience constructor for conditional execution.
    pub fn conditional<F>(predicate: F) -> Self
    where
        F: Fn(&AgentTask) -> bool + Send + Sync + 'static,
    {
        Self::Conditional(Arc::new(predicate))
    }
}

impl std::fmt::Debug for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parallel => write!(f, "Parallel"),
            Self::Sequential => write!(f, "Sequential"),
            Self::Conditional(_) => write!(f, "Conditional"),
        }
    }
}
