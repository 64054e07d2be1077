//! Research pipeline built on top of the coordinator.
//!
//! Three phases over a source tree: discovery fans out independent agents
//! in parallel, analysis runs agents sequentially so each can build on the
//! passes before it, and synthesis folds everything into one report.

mod analysis;
mod discovery;
mod orchestrator;
mod synthesis;
mod types;

pub use analysis::{AnalysisAgent, AnalysisRunner, CodeAnalysis, DocAnalysis};
pub use discovery::{
    merge_discovery, CodeDiscovery, DiscoveryAgent, DocsDiscovery, PatternDiscovery,
};
pub use orchestrator::ResearchOrchestrator;
pub use synthesis::synthesize;
pub use types::{
    AnalysisOutput, AnalysisPhaseOutput, CodeReference, DetailedFinding, DiscoveryPhaseOutput,
    DiscoveryResult, DocHit, Evidence, EvidenceType, FileHit, Horizon, Impact, Insight,
    InsightType, MergedDiscovery, PatternHit, Recommendation, RecommendationPriority,
    RelationType, Relationship, ResearchQuery, Risk, RiskType, SynthesisReport,
};
