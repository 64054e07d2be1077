//! Analysis phase: sequential enrichment of discovery output.
//!
//! Agents run strictly one after another so each later agent can build on
//! the chain of prior findings instead of working from raw discovery data
//! alone. Each agent reads a bounded number of highest-relevance sources,
//! extracts evidence through a fixed pattern library, derives insights via
//! threshold rules, and links insights through evidence overlap and category
//! equality.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::ResearchConfig;
use crate::confidence::ConfidenceLevel;
use crate::error::{ConvoyError, Phase, Result};
use crate::source::SourceAccess;

use super::types::{
    AnalysisOutput, AnalysisPhaseOutput, DiscoveryPhaseOutput, Evidence, EvidenceType, Impact,
    Insight, InsightType, RelationType, Relationship, ResearchQuery,
};

/// Evidence needed in one category before a pattern insight is derived.
const PATTERN_THRESHOLD: usize = 5;
/// Evidence concentrated in one file before a complexity finding is derived.
const COMPLEXITY_THRESHOLD: usize = 20;
/// Debt evidence above which the debt finding escalates to high impact.
const HEAVY_DEBT_THRESHOLD: usize = 10;

/// Debt markers scanned in both code and documentation.
const DEBT_MARKERS: &[&str] = &["TODO", "FIXME", "HACK", "XXX"];
/// Structural declaration markers for code evidence.
const STRUCTURE_MARKERS: &[&str] = &["pub fn ", "fn ", "struct ", "impl ", "trait ", "class ", "function "];

/// One sequential analysis pass.
#[async_trait]
pub trait AnalysisAgent: Send + Sync {
    fn name(&self) -> &str;

    /// `prior` holds the outputs of agents that already ran, in order.
    async fn analyze(
        &self,
        query: &ResearchQuery,
        discovery: &DiscoveryPhaseOutput,
        prior: &[AnalysisOutput],
        source: &dyn SourceAccess,
        config: &ResearchConfig,
    ) -> Result<AnalysisOutput>;
}

/// Bookkeeping while an agent accumulates evidence and derives insights.
struct AnalysisBuilder {
    agent: String,
    output: AnalysisOutput,
    by_category: BTreeMap<String, Vec<String>>,
    by_file: BTreeMap<PathBuf, Vec<String>>,
    insight_seq: usize,
}

impl AnalysisBuilder {
    fn new(agent: &str) -> Self {
        Self {
            agent: agent.to_string(),
            output: AnalysisOutput::new(agent),
            by_category: BTreeMap::new(),
            by_file: BTreeMap::new(),
            insight_seq: 0,
        }
    }

    fn push_evidence(
        &mut self,
        evidence_type: EvidenceType,
        category: &str,
        content: &str,
        file: Option<&PathBuf>,
        line: Option<usize>,
        relevance: f64,
    ) {
        let id = format!("{}-ev-{}", self.agent, self.output.evidence.len() + 1);
        let trimmed = content.trim();
        let excerpt: String = trimmed.chars().take(200).collect();

        self.by_category
            .entry(category.to_string())
            .or_default()
            .push(id.clone());
        if let Some(file) = file {
            self.by_file.entry(file.clone()).or_default().push(id.clone());
        }

        self.output.evidence.push(Evidence {
            id,
            evidence_type,
            source_agent: self.agent.clone(),
            content: excerpt,
            file: file.cloned(),
            line,
            confidence: ConfidenceLevel::Medium,
            relevance,
        });
    }

    fn push_insight(
        &mut self,
        insight_type: InsightType,
        title: String,
        description: String,
        evidence: Vec<String>,
        impact: Impact,
        category: &str,
    ) {
        self.insight_seq += 1;
        let confidence = if evidence.len() >= PATTERN_THRESHOLD {
            ConfidenceLevel::High
        } else {
            ConfidenceLevel::Medium
        };
        self.output.insights.push(Insight {
            id: format!("{}-in-{}", self.agent, self.insight_seq),
            insight_type,
            title,
            description,
            evidence,
            confidence,
            impact,
            category: category.to_string(),
        });
    }

    /// Threshold rules shared by the built-in agents.
    fn derive_insights(&mut self) {
        let by_category = std::mem::take(&mut self.by_category);
        for (category, ids) in &by_category {
            if ids.len() >= PATTERN_THRESHOLD {
                self.push_insight(
                    InsightType::Pattern,
                    format!("Recurring {} pattern", category),
                    format!(
                        "{} pieces of {} evidence recur across the analyzed sources",
                        ids.len(),
                        category
                    ),
                    ids.clone(),
                    Impact::Medium,
                    category,
                );
            }
        }

        let by_file = std::mem::take(&mut self.by_file);
        for (file, ids) in &by_file {
            if ids.len() >= COMPLEXITY_THRESHOLD {
                self.push_insight(
                    InsightType::Finding,
                    format!("High evidence concentration in {}", file.display()),
                    format!(
                        "{} evidence items cluster in a single file, indicating high complexity",
                        ids.len()
                    ),
                    ids.clone(),
                    Impact::High,
                    "complexity",
                );
            }
        }

        if let Some(debt_ids) = by_category.get("technical-debt") {
            let impact = if debt_ids.len() >= HEAVY_DEBT_THRESHOLD {
                Impact::High
            } else {
                Impact::Medium
            };
            self.push_insight(
                InsightType::Finding,
                "Technical debt markers present".into(),
                format!("{} debt markers found in the analyzed sources", debt_ids.len()),
                debt_ids.clone(),
                impact,
                "technical-debt",
            );
        }
    }

    /// Pairwise relationships: evidence overlap yields similarity edges,
    /// shared categories without overlap yield enhancement edges. Prior
    /// agents' insights enhance same-category insights from this pass.
    fn derive_relationships(&mut self, prior: &[AnalysisOutput]) {
        let insights = &self.output.insights;
        for (i, a) in insights.iter().enumerate() {
            for b in insights.iter().skip(i + 1) {
                let set_a: HashSet<&String> = a.evidence.iter().collect();
                let set_b: HashSet<&String> = b.evidence.iter().collect();
                let shared: Vec<String> =
                    set_a.intersection(&set_b).map(|s| s.to_string()).collect();

                if !shared.is_empty() {
                    let union = set_a.union(&set_b).count();
                    self.output.relationships.push(Relationship {
                        source: a.id.clone(),
                        target: b.id.clone(),
                        relation: RelationType::Similarity,
                        strength: shared.len() as f64 / union as f64,
                        evidence: shared,
                    });
                } else if a.category == b.category {
                    self.output.relationships.push(Relationship {
                        source: a.id.clone(),
                        target: b.id.clone(),
                        relation: RelationType::Enhancement,
                        strength: 0.5,
                        evidence: Vec::new(),
                    });
                }
            }
        }

        for prior_output in prior {
            for prior_insight in &prior_output.insights {
                for own in &self.output.insights {
                    if prior_insight.category == own.category {
                        self.output.relationships.push(Relationship {
                            source: prior_insight.id.clone(),
                            target: own.id.clone(),
                            relation: RelationType::Enhancement,
                            strength: 0.5,
                            evidence: Vec::new(),
                        });
                    }
                }
            }
        }
    }

    fn finish(mut self, prior: &[AnalysisOutput]) -> AnalysisOutput {
        self.derive_insights();
        self.derive_relationships(prior);
        self.output
    }
}

fn marker_in_line<'a>(line: &str, markers: &[&'a str]) -> Option<&'a str> {
    markers.iter().find(|m| line.contains(*m)).copied()
}

/// Extracts evidence from the highest-relevance source files.
pub struct CodeAnalysis;

#[async_trait]
impl AnalysisAgent for CodeAnalysis {
    fn name(&self) -> &str {
        "code-analysis"
    }

    async fn analyze(
        &self,
        _query: &ResearchQuery,
        discovery: &DiscoveryPhaseOutput,
        prior: &[AnalysisOutput],
        source: &dyn SourceAccess,
        config: &ResearchConfig,
    ) -> Result<AnalysisOutput> {
        let mut builder = AnalysisBuilder::new(self.name());

        let top = discovery.merged.files.iter().take(config.max_analysis_items);
        for hit in top {
            let content = match source.read_bounded(&hit.path, config.max_read_bytes).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %hit.path.display(), error = %e, "skipping unreadable source");
                    continue;
                }
            };

            for (line_no, line) in content.lines().enumerate() {
                if marker_in_line(line, DEBT_MARKERS).is_some() {
                    builder.push_evidence(
                        EvidenceType::Code,
                        "technical-debt",
                        line,
                        Some(&hit.path),
                        Some(line_no + 1),
                        hit.relevance,
                    );
                } else if marker_in_line(line, STRUCTURE_MARKERS).is_some() {
                    builder.push_evidence(
                        EvidenceType::Code,
                        "structure",
                        line,
                        Some(&hit.path),
                        Some(line_no + 1),
                        hit.relevance,
                    );
                }
            }
        }

        debug!(
            agent = self.name(),
            evidence = builder.output.evidence.len(),
            "code evidence extracted"
        );
        Ok(builder.finish(prior))
    }
}

/// Extracts evidence from documentation hits: headings, links, and debt
/// markers carried in prose.
pub struct DocAnalysis;

#[async_trait]
impl AnalysisAgent for DocAnalysis {
    fn name(&self) -> &str {
        "doc-analysis"
    }

    async fn analyze(
        &self,
        _query: &ResearchQuery,
        discovery: &DiscoveryPhaseOutput,
        prior: &[AnalysisOutput],
        source: &dyn SourceAccess,
        config: &ResearchConfig,
    ) -> Result<AnalysisOutput> {
        let mut builder = AnalysisBuilder::new(self.name());

        let top = discovery
            .merged
            .documentation
            .iter()
            .take(config.max_analysis_items);
        for hit in top {
            let content = match source.read_bounded(&hit.path, config.max_read_bytes).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %hit.path.display(), error = %e, "skipping unreadable doc");
                    continue;
                }
            };

            for (line_no, line) in content.lines().enumerate() {
                if line.starts_with('#') {
                    builder.push_evidence(
                        EvidenceType::Documentation,
                        "documentation",
                        line,
                        Some(&hit.path),
                        Some(line_no + 1),
                        hit.relevance,
                    );
                } else if line.contains("](") {
                    builder.push_evidence(
                        EvidenceType::Documentation,
                        "reference",
                        line,
                        Some(&hit.path),
                        Some(line_no + 1),
                        hit.relevance,
                    );
                } else if marker_in_line(line, DEBT_MARKERS).is_some() {
                    builder.push_evidence(
                        EvidenceType::Documentation,
                        "technical-debt",
                        line,
                        Some(&hit.path),
                        Some(line_no + 1),
                        hit.relevance,
                    );
                }
            }
        }

        if discovery.merged.documentation.is_empty() {
            builder.push_insight(
                InsightType::Finding,
                "No documentation coverage".into(),
                "Discovery located no documentation for the queried scope".into(),
                Vec::new(),
                Impact::Medium,
                "documentation",
            );
        }

        Ok(builder.finish(prior))
    }
}

/// Runs the configured analysis agents in order. A failing agent is logged
/// and skipped; the phase fails only when every agent fails.
pub struct AnalysisRunner {
    agents: Vec<std::sync::Arc<dyn AnalysisAgent>>,
}

impl AnalysisRunner {
    pub fn new(agents: Vec<std::sync::Arc<dyn AnalysisAgent>>) -> Self {
        Self { agents }
    }

    /// The standard two-pass pipeline: code first, then documentation.
    pub fn standard() -> Self {
        Self::new(vec![
            std::sync::Arc::new(CodeAnalysis),
            std::sync::Arc::new(DocAnalysis),
        ])
    }

    pub async fn run(
        &self,
        query: &ResearchQuery,
        discovery: &DiscoveryPhaseOutput,
        source: &dyn SourceAccess,
        config: &ResearchConfig,
    ) -> Result<AnalysisPhaseOutput> {
        let mut outputs: Vec<AnalysisOutput> = Vec::new();
        let mut failures = 0usize;

        for agent in &self.agents {
            match agent
                .analyze(query, discovery, &outputs, source, config)
                .await
            {
                Ok(output) => {
                    info!(
                        agent = agent.name(),
                        insights = output.insights.len(),
                        evidence = output.evidence.len(),
                        relationships = output.relationships.len(),
                        "analysis pass finished"
                    );
                    outputs.push(output);
                }
                Err(e) => {
                    warn!(agent = agent.name(), error = %e, "analysis pass failed");
                    failures += 1;
                }
            }
        }

        if !self.agents.is_empty() && failures == self.agents.len() {
            return Err(ConvoyError::Phase {
                phase: Phase::Analysis,
                message: "every analysis agent failed".into(),
                remediation: "verify the discovered files are readable and within the size limit"
                    .into(),
            });
        }

        Ok(AnalysisPhaseOutput { outputs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::types::{DiscoveryResult, FileHit, MergedDiscovery};
    use std::io::Write;
    use std::path::Path;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn discovery_with_files(files: Vec<FileHit>) -> DiscoveryPhaseOutput {
        DiscoveryPhaseOutput {
            per_agent: vec![DiscoveryResult::empty("code-discovery")],
            merged: MergedDiscovery {
                files,
                documentation: Vec::new(),
                patterns: Vec::new(),
            },
            agents_used: vec!["code-discovery".into()],
        }
    }

    #[tokio::test]
    async fn debt_markers_become_a_debt_finding() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "src/lib.rs",
            "// TODO: one\nfn a() {}\n// FIXME: two\nfn b() {}\n",
        );

        let discovery = discovery_with_files(vec![FileHit {
            path,
            relevance: 0.8,
            language: Some("rust".into()),
            snippet: None,
        }]);

        let output = CodeAnalysis
            .analyze(
                &ResearchQuery::new("debt", dir.path()),
                &discovery,
                &[],
                &crate::source::FsSource::new(),
                &ResearchConfig::default(),
            )
            .await
            .unwrap();

        let debt = output
            .insights
            .iter()
            .find(|i| i.category == "technical-debt")
            .expect("debt finding");
        assert_eq!(debt.insight_type, InsightType::Finding);
        assert_eq!(debt.evidence.len(), 2);
    }

    #[tokio::test]
    async fn five_same_category_evidence_yields_pattern_insight() {
        let dir = tempfile::tempdir().unwrap();
        let body = "fn a() {}\nfn b() {}\nfn c() {}\nfn d() {}\nfn e() {}\n";
        let path = write_file(dir.path(), "src/lib.rs", body);

        let discovery = discovery_with_files(vec![FileHit {
            path,
            relevance: 0.5,
            language: Some("rust".into()),
            snippet: None,
        }]);

        let output = CodeAnalysis
            .analyze(
                &ResearchQuery::new("structure", dir.path()),
                &discovery,
                &[],
                &crate::source::FsSource::new(),
                &ResearchConfig::default(),
            )
            .await
            .unwrap();

        assert!(output
            .insights
            .iter()
            .any(|i| i.insight_type == InsightType::Pattern && i.category == "structure"));
    }

    #[tokio::test]
    async fn unreadable_file_does_not_fail_the_pass() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = discovery_with_files(vec![FileHit {
            path: dir.path().join("missing.rs"),
            relevance: 0.9,
            language: Some("rust".into()),
            snippet: None,
        }]);

        let output = CodeAnalysis
            .analyze(
                &ResearchQuery::new("anything", dir.path()),
                &discovery,
                &[],
                &crate::source::FsSource::new(),
                &ResearchConfig::default(),
            )
            .await
            .unwrap();
        assert!(output.evidence.is_empty());
    }

    #[tokio::test]
    async fn later_agent_links_to_prior_same_category_insights() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write_file(dir.path(), "README.md", "# Title\n\nTODO revisit this\n");

        let mut prior = AnalysisOutput::new("code-analysis");
        prior.insights.push(Insight {
            id: "code-analysis-in-1".into(),
            insight_type: InsightType::Finding,
            title: "Technical debt markers present".into(),
            description: "debt".into(),
            evidence: vec![],
            confidence: ConfidenceLevel::Medium,
            impact: Impact::Medium,
            category: "technical-debt".into(),
        });

        let discovery = DiscoveryPhaseOutput {
            per_agent: vec![],
            merged: MergedDiscovery {
                files: Vec::new(),
                documentation: vec![crate::research::types::DocHit {
                    path: doc,
                    relevance: 0.7,
                    title: Some("Title".into()),
                    section: None,
                }],
                patterns: Vec::new(),
            },
            agents_used: vec![],
        };

        let output = DocAnalysis
            .analyze(
                &ResearchQuery::new("debt docs", dir.path()),
                &discovery,
                &[prior],
                &crate::source::FsSource::new(),
                &ResearchConfig::default(),
            )
            .await
            .unwrap();

        // The doc pass found the TODO in prose, derived a debt finding, and
        // linked it back to the code pass's debt finding.
        assert!(output.relationships.iter().any(|r| {
            r.relation == RelationType::Enhancement && r.source == "code-analysis-in-1"
        }));
    }
}
