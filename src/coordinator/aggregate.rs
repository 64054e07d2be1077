//! Aggregation of multiple task results into one logical result.

use std::collections::{HashMap, HashSet};

use crate::agent::AgentKind;
use crate::confidence::ConfidenceLevel;
use crate::error::{ConvoyError, Result};
use crate::task::{AgentOutput, AgentTaskResult};

/// How multiple task results collapse (or reorder) into the caller's answer.
#[derive(Debug, Clone)]
pub enum AggregationStrategy {
    /// Union outputs, concatenate findings, de-duplicate recommendations,
    /// average confidence.
    Merge,
    /// The single completed result with the highest confidence; ties break
    /// by earliest completion.
    Vote,
    /// The completed result maximizing `weight(kind) * confidence`; unlisted
    /// kinds weigh 1.0.
    Weighted(HashMap<AgentKind, f64>),
    /// Stable reorder of the full result list by the given kind ordering;
    /// unlisted kinds keep relative order at the end.
    Priority(Vec<AgentKind>),
}

/// Aggregation output: a single collapsed result, or the full reordered list.
#[derive(Debug, Clone)]
pub enum AggregatedResult {
    Single(AgentTaskResult),
    Ranked(Vec<AgentTaskResult>),
}

impl AggregatedResult {
    pub fn into_single(self) -> Option<AgentTaskResult> {
        match self {
            Self::Single(result) => Some(result),
            Self::Ranked(_) => None,
        }
    }
}

/// Kind attached to the synthetic result produced by `Merge`.
const MERGED_KIND: &str = "merged";

pub fn aggregate(
    results: &[AgentTaskResult],
    strategy: &AggregationStrategy,
) -> Result<AggregatedResult> {
    if results.is_empty() {
        return Err(ConvoyError::Validation(
            "cannot aggregate an empty result set".into(),
        ));
    }

    match strategy {
        AggregationStrategy::Merge => merge(results).map(AggregatedResult::Single),
        AggregationStrategy::Vote => vote(results).map(AggregatedResult::Single),
        AggregationStrategy::Weighted(weights) => {
            weighted(results, weights).map(AggregatedResult::Single)
        }
        AggregationStrategy::Priority(order) => {
            Ok(AggregatedResult::Ranked(priority(results, order)))
        }
    }
}

/// Discards failed results unless all failed, in which case the first failed
/// result is returned unmodified.
fn merge(results: &[AgentTaskResult]) -> Result<AgentTaskResult> {
    let completed: Vec<&AgentTaskResult> = results.iter().filter(|r| r.is_completed()).collect();

    if completed.is_empty() {
        return Ok(results[0].clone());
    }

    let mut merged_payload = serde_json::Map::new();
    let mut findings = Vec::new();
    let mut recommendations = Vec::new();
    let mut seen_recommendations = HashSet::new();
    let mut total_time_ms = 0u64;

    for result in &completed {
        let output = result
            .output
            .as_ref()
            .ok_or_else(|| ConvoyError::Other("completed result without output".into()))?;

        // Last-write-wins union of same-named keys.
        if let serde_json::Value::Object(map) = &output.result {
            for (key, value) in map {
                merged_payload.insert(key.clone(), value.clone());
            }
        }

        findings.extend(output.findings.iter().cloned());
        for rec in &output.recommendations {
            if seen_recommendations.insert(rec.clone()) {
                recommendations.push(rec.clone());
            }
        }
        total_time_ms += output.execution_time_ms;
    }

    let confidence = ConfidenceLevel::mean_of(
        completed
            .iter()
            .filter_map(|r| r.output.as_ref())
            .map(|o| o.confidence),
    );

    let started_at = completed
        .iter()
        .map(|r| r.started_at)
        .min()
        .unwrap_or_else(chrono::Utc::now);
    let ended_at = completed
        .iter()
        .map(|r| r.ended_at)
        .max()
        .unwrap_or_else(chrono::Utc::now);

    let mut output = AgentOutput::success(MERGED_KIND, serde_json::Value::Object(merged_payload))
        .with_findings(findings)
        .with_recommendations(recommendations)
        .with_confidence(confidence);
    output.execution_time_ms = total_time_ms;

    Ok(AgentTaskResult::completed(MERGED_KIND, output).with_span(started_at, ended_at))
}

/// Highest-confidence completed result; earliest completion wins ties.
fn vote(results: &[AgentTaskResult]) -> Result<AgentTaskResult> {
    results
        .iter()
        .filter(|r| r.is_completed())
        .min_by(|a, b| {
            b.confidence()
                .as_score()
                .partial_cmp(&a.confidence().as_score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.ended_at.cmp(&b.ended_at))
        })
        .cloned()
        .ok_or_else(|| ConvoyError::Validation("vote requires at least one completed result".into()))
}

fn weighted(
    results: &[AgentTaskResult],
    weights: &HashMap<AgentKind, f64>,
) -> Result<AgentTaskResult> {
    let score = |result: &AgentTaskResult| -> f64 {
        let weight = result
            .output
            .as_ref()
            .and_then(|o| weights.get(&o.kind))
            .copied()
            .unwrap_or(1.0);
        weight * result.confidence().as_score()
    };

    results
        .iter()
        .filter(|r| r.is_completed())
        .max_by(|a, b| {
            score(a)
                .partial_cmp(&score(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .cloned()
        .ok_or_else(|| {
            ConvoyError::Validation("weighted aggregation requires a completed result".into())
        })
}

/// Stable reorder: results whose kind appears earlier in the caller's list
/// sort first; unlisted kinds retain relative order at the end.
fn priority(results: &[AgentTaskResult], order: &[AgentKind]) -> Vec<AgentTaskResult> {
    let rank = |result: &AgentTaskResult| -> usize {
        result
            .output
            .as_ref()
            .and_then(|o| order.iter().position(|k| *k == o.kind))
            .unwrap_or(usize::MAX)
    };

    let mut reordered = results.to_vec();
    reordered.sort_by_key(rank);
    reordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::json;

    fn completed(
        id: &str,
        kind: &str,
        payload: serde_json::Value,
        confidence: ConfidenceLevel,
    ) -> AgentTaskResult {
        AgentTaskResult::completed(
            id,
            AgentOutput::success(kind, payload).with_confidence(confidence),
        )
    }

    #[test]
    fn merge_unions_with_last_write_wins() {
        let results = vec![
            completed("a", "x", json!({"k": 1, "shared": "first"}), ConfidenceLevel::High),
            completed("b", "y", json!({"m": 2, "shared": "second"}), ConfidenceLevel::High),
        ];

        let merged = aggregate(&results, &AggregationStrategy::Merge)
            .unwrap()
            .into_single()
            .unwrap();
        let output = merged.output.unwrap();
        assert_eq!(output.result["k"], json!(1));
        assert_eq!(output.result["m"], json!(2));
        assert_eq!(output.result["shared"], json!("second"));
    }

    #[test]
    fn merge_dedupes_recommendations_and_concatenates_findings() {
        let mut first = AgentOutput::success("x", json!({}))
            .with_findings(vec!["f1".into()])
            .with_recommendations(vec!["use tracing".into(), "add tests".into()]);
        first.execution_time_ms = 5;
        let second = AgentOutput::success("y", json!({}))
            .with_findings(vec!["f2".into()])
            .with_recommendations(vec!["add tests".into(), "split module".into()]);

        let results = vec![
            AgentTaskResult::completed("a", first),
            AgentTaskResult::completed("b", second),
        ];

        let merged = aggregate(&results, &AggregationStrategy::Merge)
            .unwrap()
            .into_single()
            .unwrap();
        let output = merged.output.unwrap();
        assert_eq!(output.findings, vec!["f1".to_string(), "f2".to_string()]);
        assert_eq!(
            output.recommendations,
            vec![
                "use tracing".to_string(),
                "add tests".to_string(),
                "split module".to_string()
            ]
        );
    }

    #[test]
    fn merge_all_failed_returns_first_unmodified() {
        let results = vec![
            AgentTaskResult::failed("a", "first failure"),
            AgentTaskResult::failed("b", "second failure"),
        ];

        let merged = aggregate(&results, &AggregationStrategy::Merge)
            .unwrap()
            .into_single()
            .unwrap();
        assert_eq!(merged.task_id, "a");
        assert_eq!(merged.error.as_deref(), Some("first failure"));
        assert!(merged.output.is_none());
    }

    #[test]
    fn merge_averages_confidence() {
        let results = vec![
            completed("a", "x", json!({}), ConfidenceLevel::Low),
            completed("b", "y", json!({}), ConfidenceLevel::VeryHigh),
        ];
        let merged = aggregate(&results, &AggregationStrategy::Merge)
            .unwrap()
            .into_single()
            .unwrap();
        // (0.25 + 1.0) / 2 = 0.625 -> medium
        assert_eq!(merged.output.unwrap().confidence, ConfidenceLevel::Medium);
    }

    #[test]
    fn vote_picks_highest_confidence() {
        let results = vec![
            completed("a", "x", json!({}), ConfidenceLevel::Medium),
            completed("b", "y", json!({}), ConfidenceLevel::VeryHigh),
            completed("c", "z", json!({}), ConfidenceLevel::High),
        ];

        let winner = aggregate(&results, &AggregationStrategy::Vote)
            .unwrap()
            .into_single()
            .unwrap();
        assert_eq!(winner.task_id, "b");
    }

    #[test]
    fn vote_ties_break_by_earliest_completion() {
        let earlier = Utc::now() - ChronoDuration::seconds(10);
        let later = Utc::now();

        let mut first = completed("a", "x", json!({}), ConfidenceLevel::High);
        first.ended_at = later;
        let mut second = completed("b", "y", json!({}), ConfidenceLevel::High);
        second.ended_at = earlier;

        let winner = aggregate(&[first, second], &AggregationStrategy::Vote)
            .unwrap()
            .into_single()
            .unwrap();
        assert_eq!(winner.task_id, "b");
    }

    #[test]
    fn weighted_prefers_heavier_kind() {
        let results = vec![
            completed("a", "security", json!({}), ConfidenceLevel::Medium),
            completed("b", "style", json!({}), ConfidenceLevel::High),
        ];
        let mut weights = HashMap::new();
        weights.insert(AgentKind::from("security"), 3.0);

        // security: 3.0 * 0.5 = 1.5; style: 1.0 * 0.75 = 0.75
        let winner = aggregate(&results, &AggregationStrategy::Weighted(weights))
            .unwrap()
            .into_single()
            .unwrap();
        assert_eq!(winner.task_id, "a");
    }

    #[test]
    fn priority_reorders_full_list() {
        let results = vec![
            completed("a", "style", json!({}), ConfidenceLevel::Medium),
            completed("b", "security", json!({}), ConfidenceLevel::Medium),
            completed("c", "docs", json!({}), ConfidenceLevel::Medium),
            completed("d", "security", json!({}), ConfidenceLevel::Medium),
        ];
        let order = vec![AgentKind::from("security"), AgentKind::from("style")];

        let ranked = match aggregate(&results, &AggregationStrategy::Priority(order)).unwrap() {
            AggregatedResult::Ranked(list) => list,
            other => panic!("expected ranked output, got {:?}", other),
        };

        let ids: Vec<&str> = ranked.iter().map(|r| r.task_id.as_str()).collect();
        // Listed kinds first in priority order, stable within a kind;
        // unlisted "docs" keeps its position at the end.
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn empty_input_is_a_validation_error() {
        assert!(matches!(
            aggregate(&[], &AggregationStrategy::Merge),
            Err(ConvoyError::Validation(_))
        ));
    }
}
