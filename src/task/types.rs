//! Task and result types for coordinated agent execution.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentKind;
use crate::confidence::ConfidenceLevel;

/// A unit of requested work, addressed to one agent capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: String,
    pub kind: AgentKind,
    pub input: serde_json::Value,
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Per-task timeout; falls back to the coordinator default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

impl AgentTask {
    pub fn new(id: impl Into<String>, kind: impl Into<AgentKind>, input: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            input,
            depends_on: Vec::new(),
            timeout: None,
            retry: None,
        }
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.depends_on = deps;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }
}

/// Bounded retry for a single task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Base delay between attempts.
    pub delay_ms: u64,
    /// Multiplier applied per attempt; absent means a fixed delay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_multiplier: Option<f64>,
}

impl RetryConfig {
    pub fn new(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            delay_ms,
            backoff_multiplier: None,
        }
    }

    pub fn with_backoff(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = Some(multiplier);
        self
    }

    /// Delay before the given attempt (attempts are 1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.delay_ms as f64;
        let ms = match self.backoff_multiplier {
            Some(mult) => base * mult.powi(attempt.saturating_sub(1) as i32),
            None => base,
        };
        Duration::from_millis(ms as u64)
    }
}

/// Lifecycle state of a task within one coordinator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Timeout | Self::Skipped
        )
    }
}

/// Structured output reported by an agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    pub kind: AgentKind,
    pub success: bool,
    pub result: serde_json::Value,
    #[serde(default)]
    pub findings: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub confidence: ConfidenceLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub execution_time_ms: u64,
}

impl AgentOutput {
    pub fn success(kind: impl Into<AgentKind>, result: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            success: true,
            result,
            findings: Vec::new(),
            recommendations: Vec::new(),
            confidence: ConfidenceLevel::Medium,
            reasoning: None,
            execution_time_ms: 0,
        }
    }

    pub fn failure(kind: impl Into<AgentKind>, reason: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            success: false,
            result: serde_json::Value::Null,
            findings: Vec::new(),
            recommendations: Vec::new(),
            confidence: ConfidenceLevel::Low,
            reasoning: Some(reason.into()),
            execution_time_ms: 0,
        }
    }

    pub fn with_findings(mut self, findings: Vec<String>) -> Self {
        self.findings = findings;
        self
    }

    pub fn with_recommendations(mut self, recommendations: Vec<String>) -> Self {
        self.recommendations = recommendations;
        self
    }

    pub fn with_confidence(mut self, confidence: ConfidenceLevel) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}

/// Outcome of one task. Output is present iff the task completed; error is
/// present iff it failed or timed out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTaskResult {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<AgentOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl AgentTaskResult {
    pub fn completed(task_id: impl Into<String>, output: AgentOutput) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Completed,
            output: Some(output),
            error: None,
            started_at: now,
            ended_at: now,
        }
    }

    pub fn failed(task_id: impl Into<String>, error: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Failed,
            output: None,
            error: Some(error.into()),
            started_at: now,
            ended_at: now,
        }
    }

    pub fn timed_out(task_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Timeout,
            ..Self::failed(task_id, error)
        }
    }

    pub fn skipped(task_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Skipped,
            output: None,
            error: None,
            started_at: now,
            ended_at: now,
        }
    }

    pub fn with_span(mut self, started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self.ended_at = ended_at;
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Confidence of the result, low when no output is present.
    pub fn confidence(&self) -> ConfidenceLevel {
        self.output
            .as_ref()
            .map(|o| o.confidence)
            .unwrap_or(ConfidenceLevel::Low)
    }
}
