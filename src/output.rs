//! Result types returned by the binding entry points.

use crate::config::TargetFormat;
use crate::error::Degradation;
use crate::pipeline::plan::PositionPlan;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The result of binding a book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindOutput {
    /// Where the finished book was written.
    pub output: PathBuf,
    pub format: TargetFormat,
    /// Final position of every page and cover.
    pub plan: PositionPlan,
    /// Non-fatal reductions in content, such as a skipped page class.
    pub warnings: Vec<Degradation>,
    pub stats: BindStats,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindStats {
    /// Pages in the source book.
    pub body_pages: usize,
    pub bitonal_pages: usize,
    pub color_pages: usize,
    /// Covers placed around the body.
    pub cover_pages: usize,
    /// Body pages left out because their class had no usable encoder.
    pub skipped_pages: usize,
    /// Pages in the written document.
    pub placed_pages: usize,
    pub output_bytes: u64,
    pub total_duration_ms: u64,
}

impl BindOutput {
    /// `true` when every source page made it into the output.
    pub fn is_complete(&self) -> bool {
        self.stats.skipped_pages == 0
    }
}
