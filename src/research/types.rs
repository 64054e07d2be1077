//! Data model for the research pipeline: discovery hits, the three-tier
//! knowledge representation (evidence, insight, relationship), and the final
//! synthesis report.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::confidence::ConfidenceLevel;

/// A research request: free-text query plus file-system scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchQuery {
    pub query: String,
    /// Root directory to search under.
    pub root: PathBuf,
    /// Optional glob constraints; empty means everything under the root.
    #[serde(default)]
    pub include: Vec<String>,
}

impl ResearchQuery {
    pub fn new(query: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            query: query.into(),
            root: root.into(),
            include: Vec::new(),
        }
    }

    pub fn with_include(mut self, include: Vec<String>) -> Self {
        self.include = include;
        self
    }

    /// Lowercased keywords derived from the query text, used by the
    /// deterministic relevance heuristics.
    pub fn keywords(&self) -> Vec<String> {
        self.query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
            .map(|w| w.to_lowercase())
            .collect()
    }
}

/// A candidate source file located by a discovery agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHit {
    pub path: PathBuf,
    /// Relevance in [0, 1].
    pub relevance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// A candidate documentation file located by a discovery agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocHit {
    pub path: PathBuf,
    pub relevance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

/// A recurring pattern observed by a discovery agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternHit {
    pub pattern: String,
    pub frequency: usize,
    pub confidence: ConfidenceLevel,
    pub category: String,
}

/// Output of one discovery agent for one query. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    /// Discovery agent identifier.
    pub source: String,
    pub files: Vec<FileHit>,
    pub documentation: Vec<DocHit>,
    pub patterns: Vec<PatternHit>,
    pub confidence: ConfidenceLevel,
    pub execution_time_ms: u64,
}

impl DiscoveryResult {
    pub fn empty(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            files: Vec::new(),
            documentation: Vec::new(),
            patterns: Vec::new(),
            confidence: ConfidenceLevel::Medium,
            execution_time_ms: 0,
        }
    }
}

/// Deduplicated cross-agent view of the discovery phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergedDiscovery {
    pub files: Vec<FileHit>,
    pub documentation: Vec<DocHit>,
    pub patterns: Vec<PatternHit>,
}

/// Full discovery phase output: per-agent results plus the merged view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryPhaseOutput {
    pub per_agent: Vec<DiscoveryResult>,
    pub merged: MergedDiscovery,
    /// Agents that returned a result (failed or timed-out agents excluded).
    pub agents_used: Vec<String>,
}

/// Kind of observed fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    Code,
    Documentation,
    Pattern,
}

/// An atomic observed fact; never mutated after creation and referenced by
/// id from insights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub id: String,
    pub evidence_type: EvidenceType,
    pub source_agent: String,
    /// Raw excerpt.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub confidence: ConfidenceLevel,
    pub relevance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    Pattern,
    Finding,
    Decision,
    Relationship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Low,
    Medium,
    High,
}

/// A derived claim referencing supporting evidence by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub insight_type: InsightType,
    pub title: String,
    pub description: String,
    /// Evidence ids; the same evidence can support multiple insights.
    pub evidence: Vec<String>,
    pub confidence: ConfidenceLevel,
    pub impact: Impact,
    /// Free-form grouping key, e.g. "technical-debt" or "architecture".
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Similarity,
    Enhancement,
    Contradiction,
}

/// A typed edge between two insights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    pub relation: RelationType,
    /// Strength in [0, 1].
    pub strength: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// Output of one analysis agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub agent: String,
    pub insights: Vec<Insight>,
    pub evidence: Vec<Evidence>,
    pub relationships: Vec<Relationship>,
}

impl AnalysisOutput {
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            insights: Vec::new(),
            evidence: Vec::new(),
            relationships: Vec::new(),
        }
    }
}

/// Concatenated analysis-phase output, in agent order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisPhaseOutput {
    pub outputs: Vec<AnalysisOutput>,
}

impl AnalysisPhaseOutput {
    pub fn all_insights(&self) -> impl Iterator<Item = &Insight> {
        self.outputs.iter().flat_map(|o| o.insights.iter())
    }

    pub fn all_evidence(&self) -> impl Iterator<Item = &Evidence> {
        self.outputs.iter().flat_map(|o| o.evidence.iter())
    }

    pub fn all_relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.outputs.iter().flat_map(|o| o.relationships.iter())
    }
}

/// A ranked finding in the final report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedFinding {
    pub category: String,
    pub title: String,
    pub description: String,
    pub impact: Impact,
    pub evidence_count: usize,
    pub confidence: ConfidenceLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    Immediate,
    ShortTerm,
    LongTerm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPriority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub horizon: Horizon,
    pub priority: RecommendationPriority,
    pub action: String,
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskType {
    Technical,
    Architectural,
    Security,
    Performance,
    Maintainability,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub risk_type: RiskType,
    pub description: String,
    pub probability: Impact,
    pub impact: Impact,
    pub mitigation: String,
}

/// Code evidence summarized per file with a covered line range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeReference {
    pub file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<(usize, usize)>,
    pub evidence_count: usize,
}

/// Terminal artifact of a research run. Immutable once produced; a pure
/// function of the analysis output for a given query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisReport {
    pub id: Uuid,
    pub query: String,
    pub synopsis: String,
    pub summary: Vec<String>,
    pub findings: Vec<DetailedFinding>,
    pub code_references: Vec<CodeReference>,
    pub recommendations: Vec<Recommendation>,
    pub risks: Vec<Risk>,
    pub open_questions: Vec<String>,
    pub confidence: ConfidenceLevel,
    pub agents_used: Vec<String>,
    pub generated_at: DateTime<Utc>,
}
