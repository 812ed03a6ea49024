//! Pipeline stages for binding a book.
//!
//! Each submodule implements one step. The external programs behind every
//! step sit behind a trait, so the same orchestration runs against the real
//! DjVuLibre/ImageMagick/jbig2enc tools or against fakes in tests.
//!
//! ## Data Flow
//!
//! ```text
//!          plan ──▶ encode ──▶ assemble ──▶ metadata      (DjVu)
//!  (positions)  (per page)  (djvm -i)   (djvused)
//!
//!          plan ──▶ jbig2 ──▶ crate::pdf                  (PDF)
//!               (layers)   (object graph)
//! ```
//!
//! 1. [`plan`]     — final 1-based position of every page, computed once
//! 2. [`encode`]   — page image → DjVu artifact; runs on the blocking pool,
//!    several pages at a time
//! 3. [`assemble`] — merge artifacts into one container, strictly in order
//! 4. [`metadata`] — one post-assembly script for metadata, bookmarks,
//!    titles and OCR text
//! 5. [`jbig2`]    — PDF target: layer separation and symbol coding
//! 6. [`tools`]    — `PATH` lookup and command execution shared by all steps

pub mod assemble;
pub mod djvu;
pub mod encode;
pub mod jbig2;
pub mod metadata;
pub mod plan;
pub mod tools;

use crate::config::{BindConfig, TargetFormat};
use crate::error::BindError;
use crate::progress::ProgressCallback;
use plan::{ClassSelection, PositionPlan};

pub use djvu::DjvuToolchain;
pub use jbig2::PdfToolchain;

/// Every external collaborator one run needs.
pub enum Toolchain {
    Djvu(DjvuToolchain),
    Pdf(PdfToolchain),
}

impl Toolchain {
    /// The real tools for `config.target`.
    pub fn from_config(config: &BindConfig) -> Self {
        match config.target {
            TargetFormat::Djvu => Toolchain::Djvu(DjvuToolchain::from_config(config)),
            TargetFormat::Pdf => Toolchain::Pdf(PdfToolchain::from_config(config)),
        }
    }

    pub fn target(&self) -> TargetFormat {
        match self {
            Toolchain::Djvu(_) => TargetFormat::Djvu,
            Toolchain::Pdf(_) => TargetFormat::Pdf,
        }
    }

    /// Classes this toolchain has an encoder for.
    pub fn selection(&self) -> ClassSelection {
        match self {
            Toolchain::Djvu(t) => t.selection(),
            Toolchain::Pdf(_) => ClassSelection::ALL,
        }
    }

    /// Programs that must be on `PATH` to bind the planned pages.
    pub fn required_tools(&self, plan: &PositionPlan) -> Vec<&'static str> {
        let mut tools = match self {
            Toolchain::Djvu(t) => t.required_tools(plan),
            Toolchain::Pdf(t) => t.required_tools(plan),
        };
        let mut seen = std::collections::HashSet::new();
        tools.retain(|t| seen.insert(*t));
        tools
    }
}

/// Run blocking work on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, BindError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, BindError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BindError::Internal(format!("blocking task failed: {e}")))?
}

/// Progress reporting plus the stop check, shared by both targets.
#[derive(Clone)]
pub(crate) struct RunState {
    callback: Option<ProgressCallback>,
    stop: crate::progress::StopHandle,
    total: usize,
}

impl RunState {
    pub(crate) fn new(config: &BindConfig, total: usize) -> Self {
        Self {
            callback: config.progress_callback.clone(),
            stop: config.stop.clone(),
            total,
        }
    }

    pub(crate) fn page_start(&self, position: usize) {
        if let Some(cb) = &self.callback {
            cb.on_page_start(position, self.total);
        }
    }

    pub(crate) fn page_complete(&self, position: usize) {
        if let Some(cb) = &self.callback {
            cb.on_page_complete(position, self.total);
        }
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// `Err(Cancelled)` once the stop handle has been triggered.
    pub(crate) fn check_stop(&self, placed: usize) -> Result<(), BindError> {
        if self.stop.is_stopped() {
            Err(BindError::Cancelled {
                placed,
                total: self.total,
            })
        } else {
            Ok(())
        }
    }
}
