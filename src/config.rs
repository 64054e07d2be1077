//! Configuration for the coordinator and the research pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{ConvoyError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Upper bound on concurrently in-flight tasks within a parallel level.
    pub max_concurrency: usize,
    /// Default per-task timeout when the task does not declare one.
    pub default_timeout_secs: u64,
    /// Whether completed outputs are cached by (kind, input).
    pub enable_caching: bool,
    /// Sequential strategy: keep executing after a task failure.
    pub continue_on_failure: bool,
    /// Capacity of the lifecycle event channel.
    pub event_channel_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            default_timeout_secs: 300,
            enable_caching: true,
            continue_on_failure: false,
            event_channel_capacity: 256,
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.max_concurrency == 0 {
            errors.push("max_concurrency must be greater than 0");
        }
        if self.default_timeout_secs == 0 {
            errors.push("default_timeout_secs must be greater than 0");
        }
        if self.event_channel_capacity == 0 {
            errors.push("event_channel_capacity must be greater than 0");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConvoyError::Validation(errors.join("; ")))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Per-discovery-agent timeout.
    pub discovery_timeout_secs: u64,
    /// Maximum file hits a single discovery agent may return.
    pub max_files_per_agent: usize,
    /// Maximum documentation hits a single discovery agent may return.
    pub max_docs_per_agent: usize,
    /// Highest-relevance items an analysis agent reads content for.
    pub max_analysis_items: usize,
    /// Maximum file size the analysis phase will read, in bytes.
    pub max_read_bytes: u64,
    /// Findings kept per category in the synthesized report.
    pub max_findings_per_category: usize,
    /// Evidence-count floor below which synthesis raises an open question.
    pub min_evidence_floor: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            discovery_timeout_secs: 60,
            max_files_per_agent: 25,
            max_docs_per_agent: 15,
            max_analysis_items: 20,
            max_read_bytes: 512 * 1024,
            max_findings_per_category: 5,
            min_evidence_floor: 5,
        }
    }
}

impl ResearchConfig {
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.discovery_timeout_secs == 0 {
            errors.push("discovery_timeout_secs must be greater than 0");
        }
        if self.max_analysis_items == 0 {
            errors.push("max_analysis_items must be greater than 0");
        }
        if self.max_read_bytes == 0 {
            errors.push("max_read_bytes must be greater than 0");
        }
        if self.max_findings_per_category == 0 {
            errors.push("max_findings_per_category must be greater than 0");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConvoyError::Validation(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(CoordinatorConfig::default().validate().is_ok());
        assert!(ResearchConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_concurrency_rejected() {
        let config = CoordinatorConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_deserializes_with_partial_fields() {
        let config: CoordinatorConfig = serde_json::from_str(r#"{"max_concurrency": 8}"#).unwrap();
        assert_eq!(config.max_concurrency, 8);
        assert!(config.enable_caching);
    }
}
