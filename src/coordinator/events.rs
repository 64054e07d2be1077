//! Typed lifecycle events and progress snapshots.
//!
//! Callers subscribe to a broadcast stream of [`CoordinatorEvent`]s or poll
//! the [`ProgressSnapshot`] API; there are no ad-hoc listener lists.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::agent::AgentKind;

/// Lifecycle event emitted during task execution.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CoordinatorEvent {
    TaskStarted {
        task_id: String,
        kind: AgentKind,
    },
    TaskCompleted {
        task_id: String,
        duration_ms: u64,
    },
    TaskFailed {
        task_id: String,
        error: String,
    },
    TaskCached {
        task_id: String,
    },
    ExecutionCompleted {
        total: usize,
        completed: usize,
        failed: usize,
    },
    ExecutionFailed {
        error: String,
    },
}

/// Fan-out sender wrapping a broadcast channel. Sending with no subscribers
/// is not an error.
#[derive(Debug)]
pub(crate) struct EventBus {
    sender: broadcast::Sender<CoordinatorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: CoordinatorEvent) {
        if self.sender.send(event).is_err() {
            debug!("no event subscribers");
        }
    }
}

/// Point-in-time progress over submitted tasks. Safe to poll concurrently
/// with in-flight execution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub skipped_tasks: u64,
    pub running_tasks: u64,
    pub percentage_complete: f64,
}

#[derive(Debug, Default)]
pub(crate) struct ProgressTracker {
    total: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    running: AtomicU64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self, count: u64) {
        self.total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn started(&self) {
        self.running.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed(&self) {
        self.running.fetch_sub(1, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed(&self) {
        self.running.fetch_sub(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// For conditional tasks whose predicate declined execution.
    pub fn skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// For tasks that fail without ever running (duplicate submission).
    pub fn failed_without_running(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let completed = self.completed.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let skipped = self.skipped.load(Ordering::Relaxed);
        let settled = completed + failed + skipped;
        ProgressSnapshot {
            total_tasks: total,
            completed_tasks: completed,
            failed_tasks: failed,
            skipped_tasks: skipped,
            running_tasks: self.running.load(Ordering::Relaxed),
            percentage_complete: if total > 0 {
                settled as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    pub fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.skipped.store(0, Ordering::Relaxed);
        self.running.store(0, Ordering::Relaxed);
    }
}
