//! Configuration types for binding a book.
//!
//! All binding behaviour is controlled through [`BindConfig`], built via its
//! [`BindConfigBuilder`]. Every knob lives in one struct so a config can be
//! shared with the blocking encoder tasks, logged, and compared between runs.
//!
//! Encoder choices are kept as plain names rather than enums: an unknown
//! name is not a configuration error but a degradation, reported when the
//! run starts (see [`crate::error::Degradation::UnsupportedEncoderChoice`]).

use crate::error::BindError;
use crate::progress::{ProgressCallback, StopHandle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Platform command-length ceiling used to split batched encoder calls.
pub const DEFAULT_COMMAND_LENGTH_LIMIT: usize = 32_000;

/// Configuration for binding a book.
///
/// Built via [`BindConfig::builder()`] or using [`BindConfig::default()`].
///
/// # Example
/// ```rust
/// use bindery::{BindConfig, TargetFormat};
///
/// let config = BindConfig::builder()
///     .target(TargetFormat::Djvu)
///     .bitonal_encoder("minidjvu")
///     .color_encoder("csepdjvu")
///     .title("Collected Essays")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct BindConfig {
    /// Output container format. Default: [`TargetFormat::Djvu`].
    pub target: TargetFormat,

    /// Encoder for bitonal pages: `cjb2` or `minidjvu`. Default: `minidjvu`.
    ///
    /// `minidjvu` shares one symbol dictionary across all bitonal pages, which
    /// compresses books with repeated glyphs far better than per-page `cjb2`.
    pub bitonal_encoder: String,

    /// Encoder for color pages: `csepdjvu`, `c44` or `cpaldjvu`. Default: `csepdjvu`.
    pub color_encoder: String,

    /// Extra arguments passed to `cjb2`. Default: `-lossless`.
    pub cjb2_options: String,
    /// Extra arguments passed to `minidjvu`. Default: `--match -p 0 -l`.
    pub minidjvu_options: String,
    /// Extra arguments passed to `c44`. Default: empty.
    pub c44_options: String,
    /// Extra arguments passed to `cpaldjvu`. Default: `-colors 4`.
    pub cpaldjvu_options: String,
    /// Extra arguments passed to `csepdjvu`. Default: empty.
    pub csepdjvu_options: String,
    /// Extra arguments passed to `jbig2` (PDF target). Default: empty.
    pub jbig2_options: String,

    /// Embed each page's pre-computed OCR text. Default: false.
    pub ocr: bool,

    /// Document title metadata.
    pub title: Option<String>,
    /// Document author metadata.
    pub author: Option<String>,
    /// Document subject metadata.
    pub subject: Option<String>,

    /// Maximum length in bytes of one external command line. Default: 32 000.
    ///
    /// Batched encoders receive every page path on the command line; when the
    /// list would exceed this, the batch is split into several calls whose
    /// outputs are merged in page order.
    pub command_length_limit: usize,

    /// Number of pages encoded at the same time. Default: 4.
    ///
    /// Encoding is CPU-bound work done by external processes. Insertion into
    /// the container stays strictly sequential regardless of this value.
    pub concurrency: usize,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// Cooperative stop signal, checked between pages.
    pub stop: StopHandle,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            target: TargetFormat::default(),
            bitonal_encoder: "minidjvu".to_string(),
            color_encoder: "csepdjvu".to_string(),
            cjb2_options: "-lossless".to_string(),
            minidjvu_options: "--match -p 0 -l".to_string(),
            c44_options: String::new(),
            cpaldjvu_options: "-colors 4".to_string(),
            csepdjvu_options: String::new(),
            jbig2_options: String::new(),
            ocr: false,
            title: None,
            author: None,
            subject: None,
            command_length_limit: DEFAULT_COMMAND_LENGTH_LIMIT,
            concurrency: 4,
            progress_callback: None,
            stop: StopHandle::default(),
        }
    }
}

impl fmt::Debug for BindConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindConfig")
            .field("target", &self.target)
            .field("bitonal_encoder", &self.bitonal_encoder)
            .field("color_encoder", &self.color_encoder)
            .field("ocr", &self.ocr)
            .field("title", &self.title)
            .field("author", &self.author)
            .field("subject", &self.subject)
            .field("command_length_limit", &self.command_length_limit)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BindProgressCallback>"),
            )
            .finish()
    }
}

impl BindConfig {
    /// Create a new builder for `BindConfig`.
    pub fn builder() -> BindConfigBuilder {
        BindConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BindConfig`].
pub struct BindConfigBuilder {
    config: BindConfig,
}

impl BindConfigBuilder {
    pub fn target(mut self, target: TargetFormat) -> Self {
        self.config.target = target;
        self
    }

    pub fn bitonal_encoder(mut self, name: impl Into<String>) -> Self {
        self.config.bitonal_encoder = name.into();
        self
    }

    pub fn color_encoder(mut self, name: impl Into<String>) -> Self {
        self.config.color_encoder = name.into();
        self
    }

    pub fn cjb2_options(mut self, opts: impl Into<String>) -> Self {
        self.config.cjb2_options = opts.into();
        self
    }

    pub fn minidjvu_options(mut self, opts: impl Into<String>) -> Self {
        self.config.minidjvu_options = opts.into();
        self
    }

    pub fn c44_options(mut self, opts: impl Into<String>) -> Self {
        self.config.c44_options = opts.into();
        self
    }

    pub fn cpaldjvu_options(mut self, opts: impl Into<String>) -> Self {
        self.config.cpaldjvu_options = opts.into();
        self
    }

    pub fn csepdjvu_options(mut self, opts: impl Into<String>) -> Self {
        self.config.csepdjvu_options = opts.into();
        self
    }

    pub fn jbig2_options(mut self, opts: impl Into<String>) -> Self {
        self.config.jbig2_options = opts.into();
        self
    }

    pub fn ocr(mut self, v: bool) -> Self {
        self.config.ocr = v;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.config.author = Some(author.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.config.subject = Some(subject.into());
        self
    }

    pub fn command_length_limit(mut self, limit: usize) -> Self {
        self.config.command_length_limit = limit;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn stop_handle(mut self, stop: StopHandle) -> Self {
        self.config.stop = stop;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BindConfig, BindError> {
        let c = &self.config;
        if c.command_length_limit < 256 {
            return Err(BindError::InvalidConfig(format!(
                "Command length limit must be at least 256 bytes, got {}",
                c.command_length_limit
            )));
        }
        if c.concurrency == 0 {
            return Err(BindError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The container format a book is bound into.
///
/// | Format | Assembly model |
/// |--------|----------------|
/// | DjVu   | pages encoded one by one and merged into a growing container |
/// | PDF    | JBIG2/JPEG 2000 layers collected into an in-memory object graph, written once |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    #[default]
    Djvu,
    Pdf,
}

impl TargetFormat {
    /// Guess the format from an output file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "djvu" | "djv" => Some(TargetFormat::Djvu),
            "pdf" => Some(TargetFormat::Pdf),
            _ => None,
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetFormat::Djvu => f.write_str("DjVu"),
            TargetFormat::Pdf => f.write_str("PDF"),
        }
    }
}
