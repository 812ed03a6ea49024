//! Incremental container assembly.
//!
//! A DjVu book grows one artifact at a time. [`Assembler::insert`] owns the
//! position rules and the page-count check; the [`ContainerTool`] it wraps
//! only knows how to merge two files and count pages.

use super::tools::ToolCommand;
use crate::error::BindError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Merges page artifacts into a multi-page container.
///
/// Implementations block; callers run them on the blocking pool.
pub trait ContainerTool: Send + Sync {
    fn name(&self) -> &str;

    fn requires(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Insert every page of `artifact` into the existing `container`.
    ///
    /// `position` is 1-based and within `1..=page_count(container)`; `None`
    /// appends.
    fn merge(&self, artifact: &Path, container: &Path, position: Option<usize>) -> Result<(), BindError>;

    /// Start a new `container` from the first artifact. Copies it verbatim.
    fn create(&self, artifact: &Path, container: &Path) -> Result<(), BindError> {
        std::fs::copy(artifact, container).map_err(|e| BindError::io(container, e))?;
        Ok(())
    }

    /// Number of pages in a container or artifact.
    fn page_count(&self, path: &Path) -> Result<usize, BindError>;
}

/// `djvm -i` for merging, `djvused -e n` for counting.
#[derive(Debug, Clone, Default)]
pub struct Djvm;

impl ContainerTool for Djvm {
    fn name(&self) -> &str {
        "djvm"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec!["djvm", "djvused"]
    }

    fn merge(&self, artifact: &Path, container: &Path, position: Option<usize>) -> Result<(), BindError> {
        let mut cmd = ToolCommand::new("djvm").arg("-i").arg(container).arg(artifact);
        if let Some(position) = position {
            cmd = cmd.arg(position.to_string());
        }
        cmd.run()
    }

    fn page_count(&self, path: &Path) -> Result<usize, BindError> {
        let out = ToolCommand::new("djvused").arg("-e").arg("n").arg(path).capture()?;
        out.trim().parse().map_err(|_| BindError::ToolFailed {
            tool: "djvused".into(),
            detail: format!("unexpected page count output {:?} for '{}'", out.trim(), path.display()),
        })
    }
}

/// The single writer of one growing container.
#[derive(Clone)]
pub struct Assembler {
    tool: Arc<dyn ContainerTool>,
    container: PathBuf,
}

impl Assembler {
    pub fn new(tool: Arc<dyn ContainerTool>, container: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            container: container.into(),
        }
    }

    pub fn container(&self) -> &Path {
        &self.container
    }

    /// Current page count; 0 while the container does not exist.
    pub fn page_count(&self) -> Result<usize, BindError> {
        if self.container.exists() {
            self.tool.page_count(&self.container)
        } else {
            Ok(0)
        }
    }

    /// Pages held by a not yet inserted artifact.
    pub fn artifact_pages(&self, artifact: &Path) -> Result<usize, BindError> {
        self.tool.page_count(artifact)
    }

    /// Insert `artifact` at `position` and consume it.
    ///
    /// * container absent: the artifact becomes the container, position ignored;
    /// * `None` or a position past the end: append;
    /// * positive: 1-based insert position;
    /// * negative: counted from the end, `-1` appends.
    ///
    /// Returns the new page count.
    ///
    /// # Errors
    /// [`BindError::MergeFailure`] when the container did not grow by exactly
    /// the artifact's page count, or the first insert left no container.
    pub fn insert(&self, artifact: &Path, position: Option<i64>) -> Result<usize, BindError> {
        let added = self.tool.page_count(artifact)?;
        let before = self.page_count()?;
        let expected = before + added;

        if !self.container.exists() {
            self.tool.create(artifact, &self.container)?;
            debug!("Created '{}' from first artifact", self.container.display());
        } else {
            let at = resolve_position(position, before);
            self.tool.merge(artifact, &self.container, at)?;
            debug!(
                "Merged {} page(s) into '{}' at {}",
                added,
                self.container.display(),
                at.map_or_else(|| "end".to_string(), |p| p.to_string())
            );
        }

        let actual = self.page_count()?;
        if !self.container.exists() || actual != expected {
            return Err(BindError::MergeFailure {
                container: self.container.clone(),
                expected,
                actual,
            });
        }

        if let Err(e) = std::fs::remove_file(artifact) {
            warn!("Could not remove merged artifact '{}': {}", artifact.display(), e);
        }
        Ok(actual)
    }
}

/// Translate a caller position into the tool's `1..=count` or append.
pub fn resolve_position(position: Option<i64>, count: usize) -> Option<usize> {
    let count = count as i64;
    let at = match position? {
        p if p < 0 => count + 2 + p,
        0 => 1,
        p => p,
    };
    if at > count {
        None
    } else {
        Some(at.max(1) as usize)
    }
}
