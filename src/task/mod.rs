//! Task and result types plus dependency graph resolution.

pub mod graph;
mod types;

pub use types::{AgentOutput, AgentTask, AgentTaskResult, RetryConfig, TaskStatus};
