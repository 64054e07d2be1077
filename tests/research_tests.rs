//! End-to-end coverage of the research pipeline over real temporary trees.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use convoy::research::{
    AnalysisRunner, CodeAnalysis, DiscoveryAgent, DiscoveryResult, DocAnalysis, FileHit,
    ResearchQuery,
};
use convoy::{
    ConvoyError, CoordinatorConfig, FsSource, Phase, ResearchConfig, ResearchOrchestrator,
    SourceAccess,
};

fn write_file(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut file = std::fs::File::create(path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
}

fn seed_project(root: &Path) {
    write_file(
        root,
        "src/cache.rs",
        "// TODO expire stale entries\n\
         pub struct Cache;\n\
         impl Cache {\n\
             pub fn get(&self) {}\n\
             pub fn insert(&self) {}\n\
         }\n",
    );
    write_file(
        root,
        "src/retry.rs",
        "// FIXME jitter is missing\n\
         pub fn retry_delay(attempt: u32) -> u64 {\n\
             attempt as u64 * 10\n\
         }\n",
    );
    write_file(
        root,
        "docs/cache.md",
        "# Cache design\n\n## Eviction\n\nThe cache evicts by age.\n\nSee [retry](retry.md).\n",
    );
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn orchestrator() -> ResearchOrchestrator {
    init_tracing();
    ResearchOrchestrator::local(CoordinatorConfig::default(), ResearchConfig::default()).unwrap()
}

#[tokio::test]
async fn pipeline_produces_a_grounded_report() {
    let dir = tempfile::tempdir().unwrap();
    seed_project(dir.path());

    let report = orchestrator()
        .research(&ResearchQuery::new("cache eviction", dir.path()))
        .await
        .unwrap();

    assert!(report.agents_used.contains(&"code-discovery".to_string()));
    assert!(report.agents_used.contains(&"docs-discovery".to_string()));
    assert!(report.agents_used.contains(&"code-analysis".to_string()));
    assert!(!report.findings.is_empty());
    assert!(report
        .findings
        .iter()
        .any(|f| f.category == "technical-debt"));
    assert!(!report.synopsis.is_empty());
}

#[tokio::test]
async fn repeated_runs_yield_identical_findings() {
    let dir = tempfile::tempdir().unwrap();
    seed_project(dir.path());

    let orchestrator = orchestrator();
    let query = ResearchQuery::new("cache eviction", dir.path());

    let first = orchestrator.research(&query).await.unwrap();
    let second = orchestrator.research(&query).await.unwrap();

    assert_eq!(first.findings, second.findings);
    assert_eq!(first.recommendations, second.recommendations);
    assert_eq!(first.risks, second.risks);
    assert_eq!(first.confidence, second.confidence);
}

#[tokio::test]
async fn include_globs_narrow_the_discovery_scope() {
    let dir = tempfile::tempdir().unwrap();
    seed_project(dir.path());

    let discovery = orchestrator()
        .discover(
            &ResearchQuery::new("cache", dir.path())
                .with_include(vec!["**/*.rs".to_string()]),
        )
        .await
        .unwrap();

    assert!(!discovery.merged.files.is_empty());
    assert!(discovery.merged.documentation.is_empty());
}

/// Reports a fixed file hit regardless of what is on disk.
struct FixedDiscovery {
    name: &'static str,
    path: &'static str,
}

#[async_trait]
impl DiscoveryAgent for FixedDiscovery {
    fn name(&self) -> &str {
        self.name
    }

    async fn discover(
        &self,
        _query: &ResearchQuery,
        _source: &dyn SourceAccess,
        _config: &ResearchConfig,
    ) -> convoy::Result<DiscoveryResult> {
        Ok(DiscoveryResult {
            files: vec![FileHit {
                path: PathBuf::from(self.path),
                relevance: 0.8,
                language: None,
                snippet: None,
            }],
            ..DiscoveryResult::empty(self.name)
        })
    }
}

/// Sleeps past the discovery timeout.
struct StalledDiscovery;

#[async_trait]
impl DiscoveryAgent for StalledDiscovery {
    fn name(&self) -> &str {
        "stalled-discovery"
    }

    async fn discover(
        &self,
        _query: &ResearchQuery,
        _source: &dyn SourceAccess,
        _config: &ResearchConfig,
    ) -> convoy::Result<DiscoveryResult> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(DiscoveryResult::empty("stalled-discovery"))
    }
}

fn custom_orchestrator(
    agents: Vec<Arc<dyn DiscoveryAgent>>,
    config: ResearchConfig,
) -> ResearchOrchestrator {
    init_tracing();
    ResearchOrchestrator::with_agents(
        CoordinatorConfig::default(),
        config,
        Arc::new(FsSource::new()),
        agents,
        AnalysisRunner::new(vec![Arc::new(CodeAnalysis), Arc::new(DocAnalysis)]),
    )
    .unwrap()
}

#[tokio::test]
async fn overlapping_agent_results_are_deduplicated_first_seen_wins() {
    let dir = tempfile::tempdir().unwrap();
    seed_project(dir.path());

    let orchestrator = custom_orchestrator(
        vec![
            Arc::new(FixedDiscovery {
                name: "agent-one",
                path: "src/shared.rs",
            }),
            Arc::new(FixedDiscovery {
                name: "agent-two",
                path: "src/shared.rs",
            }),
        ],
        ResearchConfig::default(),
    );

    let discovery = orchestrator
        .discover(&ResearchQuery::new("shared", dir.path()))
        .await
        .unwrap();

    assert_eq!(discovery.per_agent.len(), 2);
    assert_eq!(discovery.merged.files.len(), 1);
    assert_eq!(discovery.agents_used, vec!["agent-one", "agent-two"]);
}

#[tokio::test]
async fn timed_out_agent_is_excluded_from_agents_used() {
    let dir = tempfile::tempdir().unwrap();
    seed_project(dir.path());

    let orchestrator = custom_orchestrator(
        vec![
            Arc::new(FixedDiscovery {
                name: "prompt-agent",
                path: "src/fast.rs",
            }),
            Arc::new(StalledDiscovery),
        ],
        ResearchConfig {
            discovery_timeout_secs: 1,
            ..ResearchConfig::default()
        },
    );

    let discovery = orchestrator
        .discover(&ResearchQuery::new("fast", dir.path()))
        .await
        .unwrap();

    assert_eq!(discovery.agents_used, vec!["prompt-agent"]);
    assert_eq!(discovery.per_agent.len(), 1);
}

#[tokio::test]
async fn pipeline_survives_a_stalled_discovery_agent() {
    let dir = tempfile::tempdir().unwrap();
    seed_project(dir.path());

    let orchestrator = custom_orchestrator(
        vec![
            Arc::new(convoy::research::CodeDiscovery),
            Arc::new(StalledDiscovery),
            Arc::new(convoy::research::DocsDiscovery),
        ],
        ResearchConfig {
            discovery_timeout_secs: 1,
            ..ResearchConfig::default()
        },
    );

    let report = orchestrator
        .research(&ResearchQuery::new("cache eviction", dir.path()))
        .await
        .unwrap();

    assert!(report.agents_used.contains(&"code-discovery".to_string()));
    assert!(report.agents_used.contains(&"docs-discovery".to_string()));
    assert!(!report.agents_used.contains(&"stalled-discovery".to_string()));
}

#[tokio::test]
async fn all_agents_timing_out_fails_the_discovery_phase() {
    let dir = tempfile::tempdir().unwrap();
    seed_project(dir.path());

    let orchestrator = custom_orchestrator(
        vec![Arc::new(StalledDiscovery)],
        ResearchConfig {
            discovery_timeout_secs: 1,
            ..ResearchConfig::default()
        },
    );

    let err = orchestrator
        .discover(&ResearchQuery::new("anything", dir.path()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ConvoyError::Phase {
            phase: Phase::Discovery,
            ..
        }
    ));
}

#[tokio::test]
async fn oversized_files_do_not_sink_the_analysis_phase() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    seed_project(dir.path());
    write_file(dir.path(), "src/huge.rs", &"x".repeat(4096));

    let orchestrator = ResearchOrchestrator::local(
        CoordinatorConfig::default(),
        ResearchConfig {
            max_read_bytes: 1024,
            ..ResearchConfig::default()
        },
    )
    .unwrap();

    // The oversized file is skipped; the readable ones still yield findings.
    let report = orchestrator
        .research(&ResearchQuery::new("cache huge", dir.path()))
        .await
        .unwrap();
    assert!(report.agents_used.contains(&"code-analysis".to_string()));
}
