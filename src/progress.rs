//! Progress events and cooperative cancellation.
//!
//! Inject an [`Arc<dyn BindProgressCallback>`] via
//! [`crate::config::BindConfigBuilder::progress_callback`] to receive events
//! as pages are placed, and a [`StopHandle`] via
//! [`crate::config::BindConfigBuilder::stop_handle`] to halt a run.
//!
//! # Example
//!
//! ```rust
//! use bindery::{BindConfig, BindProgressCallback, StopHandle};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     placed: AtomicUsize,
//! }
//!
//! impl BindProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, position: usize, total: usize) {
//!         let done = self.placed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("placed page {position} ({done}/{total})");
//!     }
//! }
//!
//! let stop = StopHandle::new();
//! let config = BindConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { placed: AtomicUsize::new(0) }))
//!     .stop_handle(stop.clone())
//!     .build()
//!     .unwrap();
//! // Later, from another thread: stop.stop();
//! ```

use crate::model::PageClass;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Called by the binding pipeline as it places each page.
///
/// Implementations must be `Send + Sync`: events are raised from the task
/// driving the pipeline, which may move between runtime threads. All methods
/// have default no-op implementations.
pub trait BindProgressCallback: Send + Sync {
    /// Called once before any page is encoded.
    ///
    /// # Arguments
    /// * `total_pages` — pages that will be placed, covers included
    fn on_bind_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page's encoder runs.
    ///
    /// # Arguments
    /// * `position` — final 1-based position of the page
    /// * `total`    — pages that will be placed
    fn on_page_start(&self, position: usize, total: usize) {
        let _ = (position, total);
    }

    /// Called once a page has been placed in the output.
    fn on_page_complete(&self, position: usize, total: usize) {
        let _ = (position, total);
    }

    /// Called when a whole class of pages is left out.
    ///
    /// # Arguments
    /// * `class`   — the skipped class
    /// * `encoder` — the unrecognised encoder name
    /// * `pages`   — number of pages omitted
    fn on_class_skipped(&self, class: PageClass, encoder: &str, pages: usize) {
        let _ = (class, encoder, pages);
    }

    /// Called once after the output has been written.
    fn on_bind_complete(&self, placed_pages: usize) {
        let _ = placed_pages;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BindProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BindConfig`].
pub type ProgressCallback = Arc<dyn BindProgressCallback>;

/// A cloneable stop flag.
///
/// The pipeline polls it between page iterations only, so an external
/// process that is already running always finishes and the container is
/// never left half-merged.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the run halts at the next page boundary.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
