//! convoy: coordinated execution of dependent agent tasks, plus a research
//! pipeline built on top of it.
//!
//! The coordinator half schedules tasks through registered invokers under a
//! chosen execution strategy, with dependency ordering, timeouts, bounded
//! retries, result caching, aggregation, metrics, and a typed event stream.
//! The research half drives discovery, analysis, and synthesis agents over a
//! source tree to produce a structured report.
//!
//! ```no_run
//! use std::sync::Arc;
//! use convoy::{
//!     AgentCoordinator, AgentRegistry, AgentTask, CoordinatorConfig, ExecutionStrategy,
//! };
//!
//! # async fn run(registry: Arc<AgentRegistry>) -> convoy::Result<()> {
//! let coordinator = AgentCoordinator::new(CoordinatorConfig::default(), registry)?;
//! let tasks = vec![
//!     AgentTask::new("scan", "scanner", serde_json::json!({"scope": "src"})),
//!     AgentTask::new("summarize", "summarizer", serde_json::json!({}))
//!         .with_dependencies(vec!["scan".into()]),
//! ];
//! let report = coordinator
//!     .execute_tasks(&tasks, ExecutionStrategy::Parallel)
//!     .await?;
//! println!("{} completed", report.completed());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod confidence;
pub mod coordinator;
pub mod error;
pub mod research;
pub mod source;
pub mod task;

pub use agent::{AgentInvoker, AgentKind, AgentRegistry};
pub use config::{CoordinatorConfig, ResearchConfig};
pub use confidence::ConfidenceLevel;
pub use coordinator::{
    aggregate, AgentCoordinator, AggregatedResult, AggregationStrategy, CoordinatorEvent,
    ExecutionReport, ExecutionStrategy, KindMetrics, MetricsStore, ProgressSnapshot, ResultCache,
    TaskPredicate,
};
pub use error::{ConvoyError, Phase, Result};
pub use research::{ResearchOrchestrator, ResearchQuery, SynthesisReport};
pub use source::{FsSource, SourceAccess};
pub use task::{AgentOutput, AgentTask, AgentTaskResult, RetryConfig, TaskStatus};
