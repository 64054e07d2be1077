//! Discovery phase: parallel fan-out to independent discovery agents.
//!
//! Each agent derives search criteria from the query, locates candidate
//! files, documents, or pattern matches under the scope, and scores relevance
//! with deterministic heuristics. The runner merges agent outputs into a
//! deduplicated view, first seen wins.

use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::agent::{AgentInvoker, AgentKind};
use crate::config::ResearchConfig;
use crate::confidence::ConfidenceLevel;
use crate::error::Result;
use crate::source::SourceAccess;
use crate::task::AgentOutput;

use super::types::{
    DiscoveryResult, DocHit, FileHit, MergedDiscovery, PatternHit, ResearchQuery,
};

/// Extensions treated as source code, with their language names.
const CODE_EXTENSIONS: &[(&str, &str)] = &[
    ("rs", "rust"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("js", "javascript"),
    ("py", "python"),
    ("go", "go"),
    ("java", "java"),
    ("c", "c"),
    ("cpp", "cpp"),
    ("h", "c"),
];

const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "rst", "txt"];

/// Marker classes scanned by the pattern discovery agent.
const PATTERN_MARKERS: &[(&str, &str)] = &[
    ("TODO", "debt"),
    ("FIXME", "debt"),
    ("HACK", "debt"),
    ("unwrap()", "error-handling"),
    ("panic!", "error-handling"),
    ("async fn", "concurrency"),
    ("#[test]", "testing"),
];

/// One independent discovery capability.
#[async_trait]
pub trait DiscoveryAgent: Send + Sync {
    fn name(&self) -> &str;

    async fn discover(
        &self,
        query: &ResearchQuery,
        source: &dyn SourceAccess,
        config: &ResearchConfig,
    ) -> Result<DiscoveryResult>;
}

/// Deterministic path relevance: keyword presence in the file stem scores
/// highest, presence anywhere in the path scores lower.
fn path_relevance(path: &Path, keywords: &[String]) -> f64 {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let full = path.to_string_lossy().to_lowercase();

    let mut score: f64 = 0.1;
    for keyword in keywords {
        if stem.contains(keyword.as_str()) {
            score += 0.5;
        } else if full.contains(keyword.as_str()) {
            score += 0.2;
        }
    }
    score.min(1.0)
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn sort_and_cap<T, F: Fn(&T) -> f64>(hits: &mut Vec<T>, relevance: F, cap: usize) {
    hits.sort_by(|a, b| {
        relevance(b)
            .partial_cmp(&relevance(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(cap);
}

/// Locates candidate source files by extension and keyword relevance.
pub struct CodeDiscovery;

#[async_trait]
impl DiscoveryAgent for CodeDiscovery {
    fn name(&self) -> &str {
        "code-discovery"
    }

    async fn discover(
        &self,
        query: &ResearchQuery,
        source: &dyn SourceAccess,
        config: &ResearchConfig,
    ) -> Result<DiscoveryResult> {
        let start = Instant::now();
        let keywords = query.keywords();
        let paths = source.list(&query.root, &query.include).await?;

        let mut files: Vec<FileHit> = paths
            .into_iter()
            .filter_map(|path| {
                let ext = extension_of(&path);
                let language = CODE_EXTENSIONS
                    .iter()
                    .find(|(e, _)| *e == ext)
                    .map(|(_, lang)| lang.to_string())?;
                Some(FileHit {
                    relevance: path_relevance(&path, &keywords),
                    language: Some(language),
                    snippet: None,
                    path,
                })
            })
            .collect();

        sort_and_cap(&mut files, |f| f.relevance, config.max_files_per_agent);

        let confidence = if files.iter().any(|f| f.relevance >= 0.6) {
            ConfidenceLevel::High
        } else {
            ConfidenceLevel::Medium
        };

        Ok(DiscoveryResult {
            source: self.name().to_string(),
            files,
            documentation: Vec::new(),
            patterns: Vec::new(),
            confidence,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Locates documentation files, boosting keyword matches in titles and
/// section headings.
pub struct DocsDiscovery;

#[async_trait]
impl DiscoveryAgent for DocsDiscovery {
    fn name(&self) -> &str {
        "docs-discovery"
    }

    async fn discover(
        &self,
        query: &ResearchQuery,
        source: &dyn SourceAccess,
        config: &ResearchConfig,
    ) -> Result<DiscoveryResult> {
        let start = Instant::now();
        let keywords = query.keywords();
        let paths = source.list(&query.root, &query.include).await?;

        let mut documentation = Vec::new();
        for path in paths {
            if !DOC_EXTENSIONS.contains(&extension_of(&path).as_str()) {
                continue;
            }

            let mut relevance = path_relevance(&path, &keywords);
            let mut title = None;
            let mut section = None;

            // Unreadable or oversized docs still count as hits, scored on
            // the path alone.
            if let Ok(content) = source.read_bounded(&path, config.max_read_bytes).await {
                for line in content.lines() {
                    if title.is_none() {
                        if let Some(heading) = line.strip_prefix("# ") {
                            let heading = heading.trim();
                            if keywords.iter().any(|k| heading.to_lowercase().contains(k.as_str())) {
                                relevance += 0.3;
                            }
                            title = Some(heading.to_string());
                            continue;
                        }
                    }
                    if section.is_none() {
                        if let Some(heading) = line.strip_prefix("## ") {
                            let heading = heading.trim();
                            if keywords.iter().any(|k| heading.to_lowercase().contains(k.as_str())) {
                                relevance += 0.2;
                                section = Some(heading.to_string());
                            }
                        }
                    }
                }
            }

            documentation.push(DocHit {
                path,
                relevance: relevance.min(1.0),
                title,
                section,
            });
        }

        sort_and_cap(
            &mut documentation,
            |d| d.relevance,
            config.max_docs_per_agent,
        );

        let confidence = if documentation.iter().any(|d| d.relevance >= 0.6) {
            ConfidenceLevel::High
        } else {
            ConfidenceLevel::Medium
        };

        Ok(DiscoveryResult {
            source: self.name().to_string(),
            files: Vec::new(),
            documentation,
            patterns: Vec::new(),
            confidence,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Counts recurring marker patterns across the highest-relevance code files.
pub struct PatternDiscovery;

#[async_trait]
impl DiscoveryAgent for PatternDiscovery {
    fn name(&self) -> &str {
        "pattern-discovery"
    }

    async fn discover(
        &self,
        query: &ResearchQuery,
        source: &dyn SourceAccess,
        config: &ResearchConfig,
    ) -> Result<DiscoveryResult> {
        let start = Instant::now();
        let keywords = query.keywords();
        let paths = source.list(&query.root, &query.include).await?;

        let mut code_paths: Vec<_> = paths
            .into_iter()
            .filter(|p| {
                let ext = extension_of(p);
                CODE_EXTENSIONS.iter().any(|(e, _)| *e == ext)
            })
            .collect();
        code_paths.sort_by(|a, b| {
            path_relevance(b, &keywords)
                .partial_cmp(&path_relevance(a, &keywords))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        code_paths.truncate(config.max_analysis_items);

        let mut frequencies = vec![0usize; PATTERN_MARKERS.len()];
        for path in &code_paths {
            let content = match source.read_bounded(path, config.max_read_bytes).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };
            for (i, (marker, _)) in PATTERN_MARKERS.iter().enumerate() {
                frequencies[i] += content.matches(marker).count();
            }
        }

        let patterns: Vec<PatternHit> = PATTERN_MARKERS
            .iter()
            .zip(frequencies)
            .filter(|(_, freq)| *freq > 0)
            .map(|((marker, category), frequency)| PatternHit {
                pattern: marker.to_string(),
                frequency,
                confidence: if frequency >= 10 {
                    ConfidenceLevel::High
                } else if frequency >= 3 {
                    ConfidenceLevel::Medium
                } else {
                    ConfidenceLevel::Low
                },
                category: category.to_string(),
            })
            .collect();

        Ok(DiscoveryResult {
            source: self.name().to_string(),
            files: Vec::new(),
            documentation: Vec::new(),
            confidence: if patterns.is_empty() {
                ConfidenceLevel::Low
            } else {
                ConfidenceLevel::Medium
            },
            patterns,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Merges per-agent results into a deduplicated view. Identity keys are the
/// file path, the doc path, and the pattern string; the first agent to report
/// an item wins.
pub fn merge_discovery(results: &[DiscoveryResult]) -> MergedDiscovery {
    let mut merged = MergedDiscovery::default();
    let mut seen_files = HashSet::new();
    let mut seen_docs = HashSet::new();
    let mut seen_patterns = HashSet::new();

    for result in results {
        for file in &result.files {
            if seen_files.insert(file.path.clone()) {
                merged.files.push(file.clone());
            }
        }
        for doc in &result.documentation {
            if seen_docs.insert(doc.path.clone()) {
                merged.documentation.push(doc.clone());
            }
        }
        for pattern in &result.patterns {
            if seen_patterns.insert(pattern.pattern.clone()) {
                merged.patterns.push(pattern.clone());
            }
        }
    }

    merged
}

/// Adapts a discovery agent to the coordinator's invoker boundary so the
/// discovery fan-out runs as ordinary parallel tasks.
pub(crate) struct DiscoveryInvoker {
    agent: std::sync::Arc<dyn DiscoveryAgent>,
    source: std::sync::Arc<dyn SourceAccess>,
    config: ResearchConfig,
}

impl DiscoveryInvoker {
    pub fn new(
        agent: std::sync::Arc<dyn DiscoveryAgent>,
        source: std::sync::Arc<dyn SourceAccess>,
        config: ResearchConfig,
    ) -> Self {
        Self {
            agent,
            source,
            config,
        }
    }
}

#[async_trait]
impl AgentInvoker for DiscoveryInvoker {
    async fn invoke(&self, kind: &AgentKind, input: &Value) -> Result<AgentOutput> {
        let query: ResearchQuery = serde_json::from_value(input.clone())?;
        let result = self
            .agent
            .discover(&query, self.source.as_ref(), &self.config)
            .await?;
        let confidence = result.confidence;
        Ok(AgentOutput::success(kind.clone(), serde_json::to_value(&result)?)
            .with_confidence(confidence))
    }
}
