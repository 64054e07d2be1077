//! The three-phase research pipeline: parallel discovery through the
//! coordinator, sequential analysis, then pure synthesis.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::agent::{AgentKind, AgentRegistry};
use crate::config::{CoordinatorConfig, ResearchConfig};
use crate::coordinator::{AgentCoordinator, ExecutionStrategy};
use crate::error::{ConvoyError, Phase, Result};
use crate::source::{FsSource, SourceAccess};
use crate::task::{AgentTask, AgentTaskResult};

use super::analysis::AnalysisRunner;
use super::discovery::{
    merge_discovery, CodeDiscovery, DiscoveryAgent, DiscoveryInvoker, DocsDiscovery,
    PatternDiscovery,
};
use super::synthesis::synthesize;
use super::types::{DiscoveryPhaseOutput, DiscoveryResult, ResearchQuery, SynthesisReport};

/// Drives a query through discovery, analysis, and synthesis. Discovery
/// agents run as coordinator tasks, so they inherit its concurrency bound,
/// timeout handling, caching, and metrics.
pub struct ResearchOrchestrator {
    coordinator: AgentCoordinator,
    source: Arc<dyn SourceAccess>,
    config: ResearchConfig,
    discovery_kinds: Vec<AgentKind>,
    analysis: AnalysisRunner,
}

impl ResearchOrchestrator {
    /// Builds an orchestrator with the standard agents: code, docs, and
    /// pattern discovery feeding code and doc analysis.
    pub fn new(
        coordinator_config: CoordinatorConfig,
        config: ResearchConfig,
        source: Arc<dyn SourceAccess>,
    ) -> Result<Self> {
        let agents: Vec<Arc<dyn DiscoveryAgent>> = vec![
            Arc::new(CodeDiscovery),
            Arc::new(DocsDiscovery),
            Arc::new(PatternDiscovery),
        ];
        Self::with_agents(
            coordinator_config,
            config,
            source,
            agents,
            AnalysisRunner::standard(),
        )
    }

    /// Builds an orchestrator over a caller-supplied agent roster.
    pub fn with_agents(
        coordinator_config: CoordinatorConfig,
        config: ResearchConfig,
        source: Arc<dyn SourceAccess>,
        agents: Vec<Arc<dyn DiscoveryAgent>>,
        analysis: AnalysisRunner,
    ) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(AgentRegistry::new());
        let mut discovery_kinds = Vec::with_capacity(agents.len());
        for agent in agents {
            let kind = AgentKind::from(agent.name());
            registry.register(
                kind.clone(),
                Arc::new(DiscoveryInvoker::new(
                    agent,
                    Arc::clone(&source),
                    config.clone(),
                )),
            )?;
            discovery_kinds.push(kind);
        }

        let coordinator = AgentCoordinator::new(coordinator_config, registry)?;

        Ok(Self {
            coordinator,
            source,
            config,
            discovery_kinds,
            analysis,
        })
    }

    /// Convenience constructor over the local filesystem.
    pub fn local(coordinator_config: CoordinatorConfig, config: ResearchConfig) -> Result<Self> {
        Self::new(coordinator_config, config, Arc::new(FsSource::new()))
    }

    /// The coordinator backing the discovery phase; exposes progress,
    /// metrics, and the event stream for the pipeline.
    pub fn coordinator(&self) -> &AgentCoordinator {
        &self.coordinator
    }

    /// Runs the full pipeline for one query.
    pub async fn research(&self, query: &ResearchQuery) -> Result<SynthesisReport> {
        info!(query = %query.query, root = %query.root.display(), "research started");

        let discovery = self.discover(query).await?;
        info!(
            agents = discovery.agents_used.len(),
            files = discovery.merged.files.len(),
            docs = discovery.merged.documentation.len(),
            patterns = discovery.merged.patterns.len(),
            "discovery phase finished"
        );

        let analysis = self
            .analysis
            .run(query, &discovery, self.source.as_ref(), &self.config)
            .await?;

        let mut agents_used = discovery.agents_used.clone();
        agents_used.extend(analysis.outputs.iter().map(|o| o.agent.clone()));

        let report = synthesize(&query.query, &analysis, agents_used, &self.config);
        info!(
            findings = report.findings.len(),
            recommendations = report.recommendations.len(),
            confidence = %report.confidence,
            "research finished"
        );
        Ok(report)
    }

    /// Runs only the discovery fan-out. Agents that fail or time out are
    /// dropped from the output; the phase itself fails only when no agent
    /// produced a result.
    pub async fn discover(&self, query: &ResearchQuery) -> Result<DiscoveryPhaseOutput> {
        let input = serde_json::to_value(query)?;
        let timeout = Duration::from_secs(self.config.discovery_timeout_secs);

        let tasks: Vec<AgentTask> = self
            .discovery_kinds
            .iter()
            .map(|kind| {
                AgentTask::new(kind.to_string(), kind.clone(), input.clone()).with_timeout(timeout)
            })
            .collect();

        let report = self
            .coordinator
            .execute_tasks(&tasks, ExecutionStrategy::Parallel)
            .await?;

        let per_agent: Vec<DiscoveryResult> = report
            .results
            .iter()
            .filter_map(parse_discovery)
            .collect();

        if per_agent.is_empty() {
            return Err(ConvoyError::Phase {
                phase: Phase::Discovery,
                message: "every discovery agent failed or timed out".into(),
                remediation: "verify the root path exists and is readable, or raise the discovery timeout".into(),
            });
        }

        let merged = merge_discovery(&per_agent);
        let agents_used = per_agent.iter().map(|r| r.source.clone()).collect();

        Ok(DiscoveryPhaseOutput {
            per_agent,
            merged,
            agents_used,
        })
    }
}

/// A timed-out, failed, or malformed per-agent result is dropped from the
/// phase output, never escalated; the phase-level emptiness check decides
/// whether the run fails.
fn parse_discovery(result: &AgentTaskResult) -> Option<DiscoveryResult> {
    let Some(output) = result.output.as_ref().filter(|o| o.success) else {
        warn!(
            task_id = %result.task_id,
            status = ?result.status,
            "discovery agent produced no result"
        );
        return None;
    };
    match serde_json::from_value(output.result.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(
                task_id = %result.task_id,
                error = %e,
                "discarding malformed discovery payload"
            );
            None
        }
    }
}
