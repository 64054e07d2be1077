//! Synthesis phase: a pure function from analysis output to the final
//! report. Deterministic by construction — grouping uses ordered maps and
//! every ranking has a stable tie-break.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use chrono::Utc;
use uuid::Uuid;

use crate::config::ResearchConfig;
use crate::confidence::ConfidenceLevel;

use super::types::{
    AnalysisPhaseOutput, CodeReference, DetailedFinding, Evidence, EvidenceType, Horizon, Impact,
    Insight, Recommendation, RecommendationPriority, Risk, RiskType, SynthesisReport,
};

const MAX_IMMEDIATE_RECOMMENDATIONS: usize = 5;
const MAX_SHORT_TERM_RECOMMENDATIONS: usize = 3;
const MAX_RISKS: usize = 3;
const MAX_OPEN_QUESTIONS: usize = 5;
/// Debt findings above which an aggregate debt risk is reported.
const DEBT_RISK_THRESHOLD: usize = 2;

/// Builds the final report for a query from the concatenated analysis
/// output. Repeated calls over the same input produce identical findings,
/// recommendations, and risks.
pub fn synthesize(
    query: &str,
    analysis: &AnalysisPhaseOutput,
    agents_used: Vec<String>,
    config: &ResearchConfig,
) -> SynthesisReport {
    let insights = dedup_insights(analysis);
    let evidence = dedup_evidence(analysis);

    let findings = build_findings(&insights, config);
    let code_references = build_code_references(&evidence);
    let recommendations = build_recommendations(&findings, &insights);
    let risks = build_risks(&findings);
    let open_questions = build_open_questions(&insights, &evidence, config);

    let confidence = ConfidenceLevel::mean_of(
        insights
            .iter()
            .map(|i| i.confidence)
            .chain(evidence.iter().map(|e| e.confidence)),
    );

    let synopsis = build_synopsis(query, &insights, &evidence, &findings);
    let summary = findings
        .iter()
        .take(5)
        .map(|f| format!("[{}] {}", f.category, f.title))
        .collect();

    SynthesisReport {
        id: Uuid::new_v4(),
        query: query.to_string(),
        synopsis,
        summary,
        findings,
        code_references,
        recommendations,
        risks,
        open_questions,
        confidence,
        agents_used,
        generated_at: Utc::now(),
    }
}

/// De-duplicates by (title, description), keeping first occurrence, then
/// sorts by impact high to low (stable).
fn dedup_insights(analysis: &AnalysisPhaseOutput) -> Vec<Insight> {
    let mut seen = HashSet::new();
    let mut insights: Vec<Insight> = analysis
        .all_insights()
        .filter(|i| seen.insert((i.title.clone(), i.description.clone())))
        .cloned()
        .collect();
    insights.sort_by(|a, b| b.impact.cmp(&a.impact));
    insights
}

/// De-duplicates by (content, file), keeping first occurrence.
fn dedup_evidence(analysis: &AnalysisPhaseOutput) -> Vec<Evidence> {
    let mut seen = HashSet::new();
    analysis
        .all_evidence()
        .filter(|e| seen.insert((e.content.clone(), e.file.clone())))
        .cloned()
        .collect()
}

/// Groups insights into findings by category, capped per category; output
/// keeps the impact-sorted order.
fn build_findings(insights: &[Insight], config: &ResearchConfig) -> Vec<DetailedFinding> {
    let mut per_category: BTreeMap<&str, usize> = BTreeMap::new();
    let mut findings = Vec::new();

    for insight in insights {
        let count = per_category.entry(insight.category.as_str()).or_insert(0);
        if *count >= config.max_findings_per_category {
            continue;
        }
        *count += 1;
        findings.push(DetailedFinding {
            category: insight.category.clone(),
            title: insight.title.clone(),
            description: insight.description.clone(),
            impact: insight.impact,
            evidence_count: insight.evidence.len(),
            confidence: insight.confidence,
        });
    }

    findings
}

/// Summarizes code evidence per file with the covered line range.
fn build_code_references(evidence: &[Evidence]) -> Vec<CodeReference> {
    let mut by_file: BTreeMap<PathBuf, (Option<(usize, usize)>, usize)> = BTreeMap::new();

    for item in evidence {
        if item.evidence_type != EvidenceType::Code {
            continue;
        }
        let Some(file) = &item.file else { continue };
        let entry = by_file.entry(file.clone()).or_insert((None, 0));
        entry.1 += 1;
        if let Some(line) = item.line {
            entry.0 = Some(match entry.0 {
                Some((lo, hi)) => (lo.min(line), hi.max(line)),
                None => (line, line),
            });
        }
    }

    by_file
        .into_iter()
        .map(|(file, (lines, evidence_count))| CodeReference {
            file,
            lines,
            evidence_count,
        })
        .collect()
}

fn build_recommendations(
    findings: &[DetailedFinding],
    insights: &[Insight],
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    for finding in findings
        .iter()
        .filter(|f| f.impact == Impact::High)
        .take(MAX_IMMEDIATE_RECOMMENDATIONS)
    {
        recommendations.push(Recommendation {
            horizon: Horizon::Immediate,
            priority: RecommendationPriority::Critical,
            action: format!("Address: {}", finding.title),
            rationale: finding.description.clone(),
        });
    }

    for finding in findings
        .iter()
        .filter(|f| f.impact == Impact::Medium)
        .take(MAX_SHORT_TERM_RECOMMENDATIONS)
    {
        recommendations.push(Recommendation {
            horizon: Horizon::ShortTerm,
            priority: RecommendationPriority::Medium,
            action: format!("Plan work on: {}", finding.title),
            rationale: finding.description.clone(),
        });
    }

    if insights.iter().any(|i| i.category.contains("architecture")) {
        recommendations.push(Recommendation {
            horizon: Horizon::LongTerm,
            priority: RecommendationPriority::Medium,
            action: "Review the architectural patterns surfaced by this analysis".into(),
            rationale: "Architecture-category insights were derived from the evidence".into(),
        });
    }

    recommendations
}

fn risk_type_for(category: &str) -> RiskType {
    if category.contains("security") {
        RiskType::Security
    } else if category.contains("performance") {
        RiskType::Performance
    } else if category.contains("architecture") {
        RiskType::Architectural
    } else if category.contains("debt") || category.contains("maintain") {
        RiskType::Maintainability
    } else {
        RiskType::Technical
    }
}

fn build_risks(findings: &[DetailedFinding]) -> Vec<Risk> {
    let mut risks: Vec<Risk> = findings
        .iter()
        .filter(|f| f.impact == Impact::High)
        .take(MAX_RISKS)
        .map(|finding| Risk {
            risk_type: risk_type_for(&finding.category),
            description: finding.title.clone(),
            probability: Impact::Medium,
            impact: Impact::High,
            mitigation: format!("Prioritize remediation of: {}", finding.title),
        })
        .collect();

    let debt_findings = findings
        .iter()
        .filter(|f| f.category.contains("debt"))
        .count();
    if debt_findings > DEBT_RISK_THRESHOLD {
        risks.push(Risk {
            risk_type: RiskType::Maintainability,
            description: "Accumulated technical debt across multiple findings".into(),
            probability: Impact::High,
            impact: Impact::Medium,
            mitigation: "Schedule a dedicated debt-reduction effort".into(),
        });
    }

    risks
}

/// Open questions come from structural gaps in the gathered knowledge.
fn build_open_questions(
    insights: &[Insight],
    evidence: &[Evidence],
    config: &ResearchConfig,
) -> Vec<String> {
    let mut questions = Vec::new();

    if insights.is_empty() {
        questions.push(
            "No insights were derived - does the scope actually cover the queried topic?".into(),
        );
    }
    if evidence.len() < config.min_evidence_floor {
        questions.push(format!(
            "Only {} evidence items were gathered; is the search scope broad enough?",
            evidence.len()
        ));
    }
    if !insights.iter().any(|i| i.category.contains("architecture")) {
        questions.push("What architectural constraints apply to this area?".into());
    }
    if !insights.iter().any(|i| i.category.contains("performance")) {
        questions.push("Are there performance-sensitive paths in this area?".into());
    }

    questions.truncate(MAX_OPEN_QUESTIONS);
    questions
}

fn build_synopsis(
    query: &str,
    insights: &[Insight],
    evidence: &[Evidence],
    findings: &[DetailedFinding],
) -> String {
    let high_impact = findings.iter().filter(|f| f.impact == Impact::High).count();
    format!(
        "Research into \"{}\" derived {} insights from {} evidence items, \
         yielding {} findings ({} high-impact).",
        query,
        insights.len(),
        evidence.len(),
        findings.len(),
        high_impact
    )
}
