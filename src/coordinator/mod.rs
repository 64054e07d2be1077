//! The agent coordinator: the unit-of-work API.
//!
//! Validates the dependency graph, schedules tasks under the chosen
//! execution strategy, enforces per-task timeouts and bounded retries,
//! caches completed outputs, aggregates results, and exposes progress,
//! metrics, and a typed event stream.

mod aggregate;
mod cache;
mod context;
mod events;
mod metrics;
mod strategy;

pub use aggregate::{aggregate, AggregatedResult, AggregationStrategy};
pub use cache::ResultCache;
pub use events::{CoordinatorEvent, ProgressSnapshot};
pub use metrics::{KindMetrics, MetricsStore};
pub use strategy::{ExecutionStrategy, TaskPredicate};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::{broadcast, Semaphore};
use tracing::{debug, info, warn};

use crate::agent::{AgentKind, AgentRegistry};
use crate::config::CoordinatorConfig;
use crate::confidence::ConfidenceLevel;
use crate::error::{ConvoyError, Result};
use crate::task::{graph, AgentTask, AgentTaskResult, TaskStatus};

use context::ExecutionContext;
use events::{EventBus, ProgressTracker};

/// Outcome of one `execute_tasks` call: per-task results plus totals.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub results: Vec<AgentTaskResult>,
    pub duration_ms: u64,
}

impl ExecutionReport {
    pub fn count_with(&self, status: TaskStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn completed(&self) -> usize {
        self.count_with(TaskStatus::Completed)
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, TaskStatus::Failed | TaskStatus::Timeout))
            .count()
    }
}

/// Coordinates dependent agent tasks through registered invokers.
pub struct AgentCoordinator {
    config: CoordinatorConfig,
    registry: Arc<AgentRegistry>,
    cache: ResultCache,
    metrics: MetricsStore,
    events: EventBus,
    progress: ProgressTracker,
    semaphore: Arc<Semaphore>,
}

impl AgentCoordinator {
    pub fn new(config: CoordinatorConfig, registry: Arc<AgentRegistry>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrency)),
            events: EventBus::new(config.event_channel_capacity),
            cache: ResultCache::new(),
            metrics: MetricsStore::new(),
            progress: ProgressTracker::new(),
            registry,
            config,
        })
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Executes a task set under the chosen strategy and returns one result
    /// per attempted task.
    pub async fn execute_tasks(
        &self,
        tasks: &[AgentTask],
        strategy: ExecutionStrategy,
    ) -> Result<ExecutionReport> {
        let start = Instant::now();
        let ctx = ExecutionContext::new();
        self.progress.submitted(tasks.len() as u64);

        info!(tasks = tasks.len(), strategy = ?strategy, "executing task set");

        let run = match &strategy {
            ExecutionStrategy::Parallel => self.run_parallel(&ctx, tasks).await,
            ExecutionStrategy::Sequential => self.run_sequential(&ctx, tasks).await,
            ExecutionStrategy::Conditional(predicate) => {
                self.run_conditional(&ctx, tasks, predicate).await
            }
        };

        if let Err(e) = run {
            self.events.emit(CoordinatorEvent::ExecutionFailed {
                error: e.to_string(),
            });
            return Err(e);
        }

        let report = ExecutionReport {
            results: ctx.results_for(tasks),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        self.events.emit(CoordinatorEvent::ExecutionCompleted {
            total: report.results.len(),
            completed: report.completed(),
            failed: report.failed(),
        });

        info!(
            total = report.results.len(),
            completed = report.completed(),
            failed = report.failed(),
            duration_ms = report.duration_ms,
            "task set finished"
        );

        Ok(report)
    }

    /// Executes a task set and collapses (or reorders) the results with the
    /// given aggregation strategy.
    pub async fn execute_aggregated(
        &self,
        tasks: &[AgentTask],
        strategy: ExecutionStrategy,
        aggregation: &AggregationStrategy,
    ) -> Result<AggregatedResult> {
        let report = self.execute_tasks(tasks, strategy).await?;
        aggregate(&report.results, aggregation)
    }

    /// Single-task convenience entry point.
    pub async fn execute_task(&self, task: &AgentTask) -> AgentTaskResult {
        let ctx = ExecutionContext::new();
        self.progress.submitted(1);
        self.run_single(&ctx, task).await
    }

    /// Point-in-time progress; safe to poll concurrently with execution.
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Rolling per-kind metrics; persist across calls until `reset()`.
    pub fn metrics(&self) -> HashMap<AgentKind, KindMetrics> {
        self.metrics.snapshot()
    }

    /// Subscribe to the lifecycle event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    /// Clears the result cache, progress counters, and accumulated metrics.
    pub fn reset(&self) {
        self.cache.clear();
        self.progress.reset();
        self.metrics.reset();
    }

    async fn run_parallel(&self, ctx: &ExecutionContext, tasks: &[AgentTask]) -> Result<()> {
        let levels = graph::dependency_levels(tasks)?;
        for level in &levels {
            // All-settled: a failing task never aborts its siblings.
            let futures = level.iter().map(|task| self.run_bounded(ctx, task));
            join_all(futures).await;
        }
        Ok(())
    }

    async fn run_sequential(&self, ctx: &ExecutionContext, tasks: &[AgentTask]) -> Result<()> {
        let ordered = graph::resolve_order(tasks)?;
        for task in &ordered {
            let result = self.run_single(ctx, task).await;
            let failed = matches!(result.status, TaskStatus::Failed | TaskStatus::Timeout);
            if failed && !self.config.continue_on_failure {
                warn!(task_id = %task.id, "abandoning remaining tasks after failure");
                break;
            }
        }
        Ok(())
    }

    async fn run_conditional(
        &self,
        ctx: &ExecutionContext,
        tasks: &[AgentTask],
        predicate: &TaskPredicate,
    ) -> Result<()> {
        let ordered = graph::resolve_order(tasks)?;
        for task in &ordered {
            if predicate(task) {
                self.run_single(ctx, task).await;
            } else {
                debug!(task_id = %task.id, "predicate false, skipping");
                ctx.record(AgentTaskResult::skipped(&task.id));
                self.progress.skipped();
            }
        }
        Ok(())
    }

    async fn run_bounded(&self, ctx: &ExecutionContext, task: &AgentTask) -> AgentTaskResult {
        // Semaphore lives as long as the coordinator; acquire cannot fail.
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("coordinator semaphore closed");
        self.run_single(ctx, task).await
    }

    /// Runs one task through its whole lifecycle: duplicate check, cache
    /// lookup, dependency verification, timed invocation, retry policy.
    async fn run_single(&self, ctx: &ExecutionContext, task: &AgentTask) -> AgentTaskResult {
        if let Err(e) = ctx.begin(&task.id) {
            let result = AgentTaskResult::failed(&task.id, e.to_string());
            self.progress.failed_without_running();
            self.events.emit(CoordinatorEvent::TaskFailed {
                task_id: task.id.clone(),
                error: e.to_string(),
            });
            ctx.record(result.clone());
            return result;
        }

        self.progress.started();
        self.events.emit(CoordinatorEvent::TaskStarted {
            task_id: task.id.clone(),
            kind: task.kind.clone(),
        });

        if self.config.enable_caching {
            if let Some(mut output) = self.cache.get(&task.kind, &task.input) {
                debug!(task_id = %task.id, kind = %task.kind, "cache hit");
                output.execution_time_ms = 0;
                let result = AgentTaskResult::completed(&task.id, output);
                self.events.emit(CoordinatorEvent::TaskCached {
                    task_id: task.id.clone(),
                });
                self.progress.completed();
                ctx.finish(result.clone());
                return result;
            }
        }

        if let Err(e) = ctx.check_dependencies(task) {
            let result = AgentTaskResult::failed(&task.id, e.to_string());
            self.fail(ctx, result.clone());
            return result;
        }

        let handler = match self.registry.resolve(&task.kind) {
            Ok(handler) => handler,
            Err(e) => {
                let result = AgentTaskResult::failed(&task.id, e.to_string());
                self.fail(ctx, result.clone());
                return result;
            }
        };

        let timeout = task
            .timeout
            .unwrap_or(Duration::from_secs(self.config.default_timeout_secs));
        let max_attempts = task.retry.as_ref().map(|r| r.max_attempts).unwrap_or(1).max(1);
        let started_at = Utc::now();
        let mut attempt = 1u32;

        // Re-attempts repeat only the invocation: the running-set entry,
        // cache miss, and dependency results are fixed for the lifetime of
        // this call and cannot change between attempts.
        let result = loop {
            let attempt_start = Instant::now();
            match tokio::time::timeout(timeout, handler.invoke(&task.kind, &task.input)).await {
                // Timed out: terminal, never retried. The dropped future is
                // cancelled at its next await point.
                Err(_) => {
                    self.metrics.record(
                        &task.kind,
                        false,
                        attempt_start.elapsed(),
                        ConfidenceLevel::Low,
                    );
                    let err = ConvoyError::TaskTimeout {
                        task_id: task.id.clone(),
                        duration_secs: timeout.as_secs(),
                    };
                    break AgentTaskResult::timed_out(&task.id, err.to_string())
                        .with_span(started_at, Utc::now());
                }
                Ok(Ok(mut output)) => {
                    let elapsed = attempt_start.elapsed();
                    output.execution_time_ms = elapsed.as_millis() as u64;
                    self.metrics
                        .record(&task.kind, output.success, elapsed, output.confidence);
                    if self.config.enable_caching && output.success {
                        self.cache.insert(&task.kind, &task.input, output.clone());
                    }
                    break AgentTaskResult::completed(&task.id, output)
                        .with_span(started_at, Utc::now());
                }
                Ok(Err(e)) => {
                    self.metrics.record(
                        &task.kind,
                        false,
                        attempt_start.elapsed(),
                        ConfidenceLevel::Low,
                    );
                    let retry = task.retry.as_ref();
                    if let Some(retry) = retry {
                        if attempt < retry.max_attempts && e.is_retryable() {
                            let delay = retry.delay_for_attempt(attempt);
                            warn!(
                                task_id = %task.id,
                                attempt,
                                max_attempts,
                                delay_ms = delay.as_millis() as u64,
                                error = %e,
                                "task failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                            continue;
                        }
                    }
                    break AgentTaskResult::failed(&task.id, e.to_string())
                        .with_span(started_at, Utc::now());
                }
            }
        };

        match result.status {
            TaskStatus::Completed => {
                self.progress.completed();
                self.events.emit(CoordinatorEvent::TaskCompleted {
                    task_id: task.id.clone(),
                    duration_ms: result
                        .output
                        .as_ref()
                        .map(|o| o.execution_time_ms)
                        .unwrap_or(0),
                });
            }
            _ => {
                self.progress.failed();
                self.events.emit(CoordinatorEvent::TaskFailed {
                    task_id: task.id.clone(),
                    error: result.error.clone().unwrap_or_default(),
                });
            }
        }

        ctx.finish(result.clone());
        result
    }

    /// Terminal failure for a task that was marked running but never invoked.
    fn fail(&self, ctx: &ExecutionContext, result: AgentTaskResult) {
        self.progress.failed();
        self.events.emit(CoordinatorEvent::TaskFailed {
            task_id: result.task_id.clone(),
            error: result.error.clone().unwrap_or_default(),
        });
        ctx.finish(result);
    }
}
