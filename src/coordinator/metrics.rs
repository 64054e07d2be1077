//! Rolling per-agent-kind execution metrics.
//!
//! The one piece of state intentionally shared across calls and callers.
//! Counters live for the process lifetime and are cleared only by an explicit
//! `reset()`.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::agent::AgentKind;
use crate::confidence::ConfidenceLevel;

/// Rolling statistics for one agent kind.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KindMetrics {
    pub execution_count: u64,
    pub average_execution_time_ms: f64,
    /// Running average of success outcomes: `(prev*(n-1) + outcome) / n`.
    pub success_rate: f64,
    pub average_confidence: f64,
    pub last_execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_executed_at: Option<DateTime<Utc>>,
}

impl KindMetrics {
    fn record(&mut self, success: bool, duration: Duration, confidence: ConfidenceLevel) {
        let n = self.execution_count + 1;
        let duration_ms = duration.as_millis() as u64;
        let outcome = if success { 1.0 } else { 0.0 };

        self.average_execution_time_ms = running_average(
            self.average_execution_time_ms,
            duration_ms as f64,
            n,
        );
        self.success_rate = running_average(self.success_rate, outcome, n);
        self.average_confidence =
            running_average(self.average_confidence, confidence.as_score(), n);
        self.execution_count = n;
        self.last_execution_time_ms = duration_ms;
        self.last_executed_at = Some(Utc::now());
    }
}

fn running_average(prev: f64, sample: f64, n: u64) -> f64 {
    (prev * (n - 1) as f64 + sample) / n as f64
}

/// Process-wide metrics store keyed by agent kind.
#[derive(Debug, Default)]
pub struct MetricsStore {
    by_kind: RwLock<HashMap<AgentKind, KindMetrics>>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &self,
        kind: &AgentKind,
        success: bool,
        duration: Duration,
        confidence: ConfidenceLevel,
    ) {
        let mut by_kind = self.by_kind.write();
        by_kind
            .entry(kind.clone())
            .or_default()
            .record(success, duration, confidence);
    }

    pub fn snapshot(&self) -> HashMap<AgentKind, KindMetrics> {
        self.by_kind.read().clone()
    }

    pub fn for_kind(&self, kind: &AgentKind) -> Option<KindMetrics> {
        self.by_kind.read().get(kind).cloned()
    }

    pub fn reset(&self) {
        self.by_kind.write().clear();
    }
}
