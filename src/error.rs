//! Error types for the bindery library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BindError`] — **Fatal**: the book cannot be bound at all (a required
//!   tool is missing, an encoder produced nothing, a merge lost pages).
//!   Returned as `Err(BindError)` from the top-level `bind*` functions. The
//!   output path is only written on success, so a fatal error leaves it
//!   absent.
//!
//! * [`Degradation`] — **Non-fatal**: a whole class of pages or an optional
//!   feature could not be produced with the current configuration. The run
//!   continues with reduced content and the degradation is reported in
//!   [`crate::output::BindOutput::warnings`].

use crate::model::PageClass;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the bindery library.
#[derive(Debug, Error)]
pub enum BindError {
    // ── Environment errors ───────────────────────────────────────────────
    /// A required external tool is not installed or not on `PATH`.
    #[error("Required tool '{tool}' is not installed.\nInstall it or add its directory to PATH.")]
    MissingDependency { tool: String },

    // ── Input errors ─────────────────────────────────────────────────────
    /// A page, cover or supplement file does not exist.
    #[error("Source file not found: '{path}'")]
    SourceNotFound { path: PathBuf },

    /// A page image could not be decoded.
    #[error("Cannot read image '{path}': {detail}")]
    InvalidImage { path: PathBuf, detail: String },

    /// The JSON book manifest is malformed.
    #[error("Invalid book manifest '{path}': {detail}")]
    InvalidManifest { path: PathBuf, detail: String },

    /// No page or cover survives encoder selection, so there is nothing to write.
    #[error("Nothing to bind: the book has no pages or covers that can be encoded")]
    EmptyBook,

    // ── Tool errors ──────────────────────────────────────────────────────
    /// An encoder returned but its output artifact is missing or short of pages.
    #[error("Encoder '{tool}' reported success but '{output}' is unusable: {detail}")]
    EncodeFailure {
        tool: String,
        output: PathBuf,
        detail: String,
    },

    /// The container did not grow by the expected number of pages.
    #[error("Merge into '{container}' failed: expected {expected} pages, found {actual}")]
    MergeFailure {
        container: PathBuf,
        expected: usize,
        actual: usize,
    },

    /// The post-assembly script was rejected.
    #[error("Script could not be applied to '{container}': {detail}")]
    ScriptFailure { container: PathBuf, detail: String },

    /// An external tool could not be spawned or exited unsuccessfully.
    #[error("Tool '{tool}' failed: {detail}")]
    ToolFailed { tool: String, detail: String },

    // ── Run control ──────────────────────────────────────────────────────
    /// The stop handle was triggered between pages.
    #[error("Binding cancelled after {placed} of {total} pages")]
    Cancelled { placed: usize, total: usize },

    // ── I/O errors ───────────────────────────────────────────────────────
    /// Reading or writing an intermediate file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not move the finished book to its output path.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BindError {
    /// Wrap an [`std::io::Error`] with the path it happened on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BindError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A non-fatal reduction in output content.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum Degradation {
    /// The configured encoder for a page class is not recognised; every page
    /// of that class was left out.
    #[error("Invalid {class} encoder '{encoder}'; {pages} {class} pages omitted")]
    UnsupportedEncoderChoice {
        class: PageClass,
        encoder: String,
        pages: usize,
    },

    /// An optional supplement has no representation in the target format.
    #[error("{feature} is not supported for {target} output and was skipped")]
    FeatureUnsupported { feature: String, target: String },
}
