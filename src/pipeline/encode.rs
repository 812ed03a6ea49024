//! Layer encoders: one page image (or a batch of them) → a DjVu artifact.
//!
//! Encoders are external programs. Each is wrapped in a small struct that
//! builds its command line from the configured option string and checks that
//! the artifact actually exists afterwards, since several of these tools exit
//! successfully without writing anything on malformed input.
//!
//! | Name       | Class   | Shape  | Notes |
//! |------------|---------|--------|-------|
//! | `cjb2`     | bitonal | single | |
//! | `minidjvu` | bitonal | batch  | shared symbol dictionary across pages |
//! | `c44`      | color   | single | wavelet; also used for covers |
//! | `cpaldjvu` | color   | single | few-colour palette |
//! | `csepdjvu` | color   | single | text/graphics separation, text via `cjb2` |

use super::tools::{ensure_output, ToolCommand};
use crate::config::BindConfig;
use crate::error::BindError;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Recognised bitonal encoder names.
pub const BITONAL_ENCODERS: &[&str] = &["cjb2", "minidjvu"];
/// Recognised color encoder names.
pub const COLOR_ENCODERS: &[&str] = &["csepdjvu", "c44", "cpaldjvu"];

/// Encodes one page image into a single-page artifact.
///
/// Implementations block; callers run them on the blocking pool.
pub trait LayerEncoder: Send + Sync {
    fn name(&self) -> &str;

    /// External programs this encoder needs on `PATH`.
    fn requires(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Write the encoded artifact for `source` to `output`.
    ///
    /// # Errors
    /// [`BindError::EncodeFailure`] when `output` is absent afterwards,
    /// [`BindError::ToolFailed`] when the tool cannot run or exits non-zero.
    fn encode(&self, source: &Path, output: &Path, dpi: u32) -> Result<(), BindError>;
}

/// Encodes many page images into one multi-page artifact, in order.
pub trait BatchLayerEncoder: Send + Sync {
    fn name(&self) -> &str;

    fn requires(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Command-line length of a call before any source path is added.
    fn fixed_arg_len(&self, output: &Path, dpi: u32) -> usize;

    /// Write one artifact holding a page per source, in `sources` order.
    fn encode_batch(&self, sources: &[PathBuf], output: &Path, dpi: u32) -> Result<(), BindError>;
}

/// The bitonal encoder in use, which decides how the bitonal sweep runs.
#[derive(Clone)]
pub enum BitonalPort {
    /// One call and one insert per page.
    Single(Arc<dyn LayerEncoder>),
    /// All pages in as few calls as the command-length limit allows.
    Batch(Arc<dyn BatchLayerEncoder>),
}

impl BitonalPort {
    pub fn name(&self) -> &str {
        match self {
            BitonalPort::Single(e) => e.name(),
            BitonalPort::Batch(e) => e.name(),
        }
    }

    pub fn requires(&self) -> Vec<&'static str> {
        match self {
            BitonalPort::Single(e) => e.requires(),
            BitonalPort::Batch(e) => e.requires(),
        }
    }
}

impl std::fmt::Debug for BitonalPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BitonalPort::Single(e) => write!(f, "Single({})", e.name()),
            BitonalPort::Batch(e) => write!(f, "Batch({})", e.name()),
        }
    }
}

/// Resolve the configured bitonal encoder; `None` when the name is unknown.
pub fn bitonal_encoder(config: &BindConfig) -> Option<BitonalPort> {
    match config.bitonal_encoder.as_str() {
        "cjb2" => Some(BitonalPort::Single(Arc::new(Cjb2::new(&config.cjb2_options)))),
        "minidjvu" => Some(BitonalPort::Batch(Arc::new(Minidjvu::new(
            &config.minidjvu_options,
        )))),
        _ => None,
    }
}

/// Resolve the configured color encoder; `None` when the name is unknown.
pub fn color_encoder(config: &BindConfig) -> Option<Arc<dyn LayerEncoder>> {
    match config.color_encoder.as_str() {
        "csepdjvu" => Some(Arc::new(Csepdjvu::new(
            &config.csepdjvu_options,
            Cjb2::new(&config.cjb2_options),
        ))),
        "c44" => Some(Arc::new(C44::new(&config.c44_options))),
        "cpaldjvu" => Some(Arc::new(Cpaldjvu::new(&config.cpaldjvu_options))),
        _ => None,
    }
}

/// Covers are photographs and always go through `c44`.
pub fn cover_encoder(config: &BindConfig) -> Arc<dyn LayerEncoder> {
    Arc::new(C44::new(&config.c44_options))
}

// ── cjb2 ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Cjb2 {
    options: String,
}

impl Cjb2 {
    pub fn new(options: &str) -> Self {
        Self {
            options: options.to_string(),
        }
    }
}

impl LayerEncoder for Cjb2 {
    fn name(&self) -> &str {
        "cjb2"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec!["cjb2"]
    }

    fn encode(&self, source: &Path, output: &Path, dpi: u32) -> Result<(), BindError> {
        ToolCommand::new("cjb2")
            .arg("-dpi")
            .arg(dpi.to_string())
            .options(&self.options)
            .arg(source)
            .arg(output)
            .run()?;
        ensure_output("cjb2", output)
    }
}

// ── minidjvu ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Minidjvu {
    options: String,
}

impl Minidjvu {
    pub fn new(options: &str) -> Self {
        Self {
            options: options.to_string(),
        }
    }

    fn command(&self, dpi: u32) -> ToolCommand {
        ToolCommand::new("minidjvu")
            .arg("-d")
            .arg(dpi.to_string())
            .options(&self.options)
    }
}

impl BatchLayerEncoder for Minidjvu {
    fn name(&self) -> &str {
        "minidjvu"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec!["minidjvu"]
    }

    fn fixed_arg_len(&self, output: &Path, dpi: u32) -> usize {
        self.command(dpi).arg(output).command_len()
    }

    fn encode_batch(&self, sources: &[PathBuf], output: &Path, dpi: u32) -> Result<(), BindError> {
        debug!("minidjvu: {} pages → {}", sources.len(), output.display());
        self.command(dpi).args(sources).arg(output).run()?;
        ensure_output("minidjvu", output)
    }
}

// ── c44 ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct C44 {
    options: String,
}

impl C44 {
    pub fn new(options: &str) -> Self {
        Self {
            options: options.to_string(),
        }
    }
}

impl LayerEncoder for C44 {
    fn name(&self) -> &str {
        "c44"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec!["c44"]
    }

    fn encode(&self, source: &Path, output: &Path, dpi: u32) -> Result<(), BindError> {
        let scratch = scratch_dir(output)?;
        let input = accepted_input(source, &["pgm", "ppm", "jpg", "jpeg"], scratch.path())?;
        ToolCommand::new("c44")
            .arg("-dpi")
            .arg(dpi.to_string())
            .options(&self.options)
            .arg(input.as_ref())
            .arg(output)
            .run()?;
        ensure_output("c44", output)
    }
}

// ── cpaldjvu ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Cpaldjvu {
    options: String,
}

impl Cpaldjvu {
    pub fn new(options: &str) -> Self {
        Self {
            options: options.to_string(),
        }
    }
}

impl LayerEncoder for Cpaldjvu {
    fn name(&self) -> &str {
        "cpaldjvu"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec!["cpaldjvu"]
    }

    fn encode(&self, source: &Path, output: &Path, dpi: u32) -> Result<(), BindError> {
        let scratch = scratch_dir(output)?;
        let input = accepted_input(source, &["ppm"], scratch.path())?;
        ToolCommand::new("cpaldjvu")
            .arg("-dpi")
            .arg(dpi.to_string())
            .options(&self.options)
            .arg(input.as_ref())
            .arg(output)
            .run()?;
        ensure_output("cpaldjvu", output)
    }
}

// ── csepdjvu ─────────────────────────────────────────────────────────────

/// Separated encoding for mixed pages.
///
/// Pure black pixels are treated as text and everything else as graphics.
/// The text layer is encoded with `cjb2` and decoded back to RLE, which
/// `csepdjvu` reads followed by the graphics as PPM from one stream.
#[derive(Debug, Clone)]
pub struct Csepdjvu {
    options: String,
    text_encoder: Cjb2,
}

impl Csepdjvu {
    pub fn new(options: &str, text_encoder: Cjb2) -> Self {
        Self {
            options: options.to_string(),
            text_encoder,
        }
    }
}

impl LayerEncoder for Csepdjvu {
    fn name(&self) -> &str {
        "csepdjvu"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec!["convert", "cjb2", "ddjvu", "csepdjvu"]
    }

    fn encode(&self, source: &Path, output: &Path, dpi: u32) -> Result<(), BindError> {
        let scratch = scratch_dir(output)?;
        let dir = scratch.path();
        let graphics_tif = dir.join("graphics.tif");
        let graphics_ppm = dir.join("graphics.ppm");
        let text_tif = dir.join("text.tif");
        let text_djvu = dir.join("text.djvu");
        let text_rle = dir.join("text.rle");
        let separated = dir.join("page.sep");

        ToolCommand::new("convert")
            .arg("-opaque")
            .arg("black")
            .arg(source)
            .arg(&graphics_tif)
            .run()?;
        ToolCommand::new("convert")
            .arg("+opaque")
            .arg("black")
            .arg(source)
            .arg(&text_tif)
            .run()?;

        self.text_encoder.encode(&text_tif, &text_djvu, dpi)?;
        ToolCommand::new("ddjvu")
            .arg("-format=rle")
            .arg("-v")
            .arg(&text_djvu)
            .arg(&text_rle)
            .run()?;
        ToolCommand::new("convert")
            .arg(&graphics_tif)
            .arg(&graphics_ppm)
            .run()?;
        concatenate(&[text_rle.as_path(), graphics_ppm.as_path()], &separated)?;

        ToolCommand::new("csepdjvu")
            .arg("-d")
            .arg(dpi.to_string())
            .options(&self.options)
            .arg(&separated)
            .arg(output)
            .run()?;
        ensure_output("csepdjvu", output)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

/// Per-call scratch directory next to `output`, removed on drop.
fn scratch_dir(output: &Path) -> Result<tempfile::TempDir, BindError> {
    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    tempfile::Builder::new()
        .prefix(".enc-")
        .tempdir_in(parent)
        .map_err(|e| BindError::io(parent, e))
}

/// `true` when `path`'s extension is one of `accepted` (case-insensitive).
pub fn has_extension(path: &Path, accepted: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| accepted.iter().any(|a| a.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// `source` itself when the encoder accepts it, else a PPM conversion in `scratch`.
fn accepted_input<'a>(
    source: &'a Path,
    accepted: &[&str],
    scratch: &Path,
) -> Result<Cow<'a, Path>, BindError> {
    if has_extension(source, accepted) {
        return Ok(Cow::Borrowed(source));
    }
    let converted = scratch.join("input.ppm");
    ToolCommand::new("convert").arg(source).arg(&converted).run()?;
    Ok(Cow::Owned(converted))
}

/// Write the bytes of each part, in order, into `output`.
pub fn concatenate(parts: &[&Path], output: &Path) -> Result<(), BindError> {
    let mut out = std::fs::File::create(output).map_err(|e| BindError::io(output, e))?;
    for part in parts {
        let mut input = std::fs::File::open(part).map_err(|e| BindError::io(*part, e))?;
        std::io::copy(&mut input, &mut out).map_err(|e| BindError::io(output, e))?;
    }
    Ok(())
}
