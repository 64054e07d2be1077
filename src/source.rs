//! Bounded file-system collaborator used by the research phases.
//!
//! The pipeline only ever asks for two things: candidate paths under a scope,
//! and file content bounded by a maximum size. Everything else about the
//! file system stays behind this trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::fs;
use walkdir::WalkDir;

use crate::error::{ConvoyError, Result};

#[async_trait]
pub trait SourceAccess: Send + Sync {
    /// Lists candidate file paths under `root`, filtered by the given glob
    /// patterns (an empty pattern list matches everything).
    async fn list(&self, root: &Path, include: &[String]) -> Result<Vec<PathBuf>>;

    /// Reads a file as text, failing with a size-exceeded condition when the
    /// file is larger than `max_bytes`.
    async fn read_bounded(&self, path: &Path, max_bytes: u64) -> Result<String>;
}

/// Default implementation over the local file system.
#[derive(Debug, Default, Clone)]
pub struct FsSource;

impl FsSource {
    pub fn new() -> Self {
        Self
    }

    fn build_globset(include: &[String]) -> Result<Option<GlobSet>> {
        if include.is_empty() {
            return Ok(None);
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in include {
            let glob = Glob::new(pattern)
                .map_err(|e| ConvoyError::Validation(format!("bad glob {}: {}", pattern, e)))?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| ConvoyError::Validation(format!("glob set: {}", e)))?;
        Ok(Some(set))
    }
}

#[async_trait]
impl SourceAccess for FsSource {
    async fn list(&self, root: &Path, include: &[String]) -> Result<Vec<PathBuf>> {
        let globset = Self::build_globset(include)?;
        let root = root.to_path_buf();

        // A missing root is an input error, not an empty scope.
        fs::metadata(&root).await?;

        let paths = tokio::task::spawn_blocking(move || {
            let mut paths = Vec::new();
            let walker = WalkDir::new(&root).into_iter().filter_entry(|entry| {
                // The filter applies to descendants only; a root whose own
                // name is hidden (dotted tempdirs, ~/.config trees) must
                // still be walked.
                if entry.depth() == 0 {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                // Hidden directories and build output are never candidates.
                !(entry.file_type().is_dir()
                    && (name.starts_with('.') || name == "target" || name == "node_modules"))
            });

            for entry in walker.flatten() {
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.into_path();
                let matches = match &globset {
                    Some(set) => {
                        let relative = path.strip_prefix(&root).unwrap_or(&path);
                        set.is_match(relative)
                    }
                    None => true,
                };
                if matches {
                    paths.push(path);
                }
            }
            paths.sort();
            paths
        })
        .await
        .map_err(|e| ConvoyError::Other(format!("walk task panicked: {}", e)))?;

        Ok(paths)
    }

    async fn read_bounded(&self, path: &Path, max_bytes: u64) -> Result<String> {
        let metadata = fs::metadata(path).await?;
        if metadata.len() > max_bytes {
            return Err(ConvoyError::SizeExceeded {
                path: path.to_path_buf(),
                size: metadata.len(),
                max: max_bytes,
            });
        }
        Ok(fs::read_to_string(path).await?)
    }
}
