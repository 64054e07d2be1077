use std::path::PathBuf;

use thiserror::Error;

/// Pipeline phase in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discovery,
    Analysis,
    Synthesis,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovery => write!(f, "discovery"),
            Self::Analysis => write!(f, "analysis"),
            Self::Synthesis => write!(f, "synthesis"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConvoyError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Circular dependency detected at task: {task_id}")]
    CircularDependency { task_id: String },

    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),

    #[error("Task {task_id} has unmet dependency: {dependency}")]
    DependencyUnmet { task_id: String, dependency: String },

    #[error("Task {task_id} timed out after {duration_secs}s")]
    TaskTimeout { task_id: String, duration_secs: u64 },

    #[error("Agent {kind} failed: {message}")]
    AgentFailure { kind: String, message: String },

    #[error("No agent registered for kind: {0}")]
    UnknownAgentKind(String),

    #[error("File exceeds read limit: {path} ({size} > {max} bytes)")]
    SizeExceeded { path: PathBuf, size: u64, max: u64 },

    #[error("{phase} phase failed: {message}. Suggestion: {remediation}")]
    Phase {
        phase: Phase,
        message: String,
        remediation: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ConvoyError {
    /// Whether the retry policy may re-attempt a task that failed with this
    /// error. Timeouts are terminal (the underlying work may still be
    /// running) and graph/validation errors are caller bugs.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AgentFailure { .. } | Self::Io(_) | Self::Other(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ConvoyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_not_retryable() {
        let err = ConvoyError::TaskTimeout {
            task_id: "t1".into(),
            duration_secs: 30,
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn agent_failure_is_retryable() {
        let err = ConvoyError::AgentFailure {
            kind: "code-review".into(),
            message: "transient".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn circular_dependency_is_not_retryable() {
        let err = ConvoyError::CircularDependency {
            task_id: "t1".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn phase_error_mentions_remediation() {
        let err = ConvoyError::Phase {
            phase: Phase::Discovery,
            message: "all agents failed".into(),
            remediation: "check the search scope".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("discovery"));
        assert!(msg.contains("check the search scope"));
    }
}
