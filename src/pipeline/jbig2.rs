//! PDF target: JBIG2 text layers and JPEG 2000 graphics, laid out in-process.
//!
//! Unlike DjVu nothing is merged incrementally. Every page is reduced to a
//! text layer (and, for mixed pages, a graphical layer), all text layers go
//! through one symbol-coding pass so they share glyph dictionaries, and the
//! collected bytes are handed to [`crate::pdf::build_document`].
//!
//! ```text
//! page ──separate──▶ text.tif ──┐
//!      └───────────▶ graphics.jp2│
//!                                ▼
//!            jbig2 -b base -p -s text...  ──▶ base.sym, base.0000, ...
//! ```

use super::encode::has_extension;
use super::plan::{PlannedPage, PositionPlan, Slot};
use super::tools::{ensure_output, split_batches, ToolCommand};
use super::{blocking, RunState};
use crate::config::BindConfig;
use crate::error::BindError;
use crate::model::{Book, PageClass};
use crate::pdf::{build_document, DocumentInfo, PdfBookInput, PdfPageInput};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Output of one symbol-coding call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolBatch {
    /// Shared symbol dictionary.
    pub dictionary: PathBuf,
    /// One page stream per source, in source order.
    pub pages: Vec<PathBuf>,
}

/// Codes many bitonal images against one shared symbol dictionary.
pub trait SymbolCoder: Send + Sync {
    fn name(&self) -> &str;

    fn requires(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Command-line length of a call before any source path is added.
    fn fixed_arg_len(&self, base: &Path) -> usize;

    /// Code `sources`, writing outputs named after `base`.
    fn encode_symbols(&self, sources: &[PathBuf], base: &Path) -> Result<SymbolBatch, BindError>;
}

/// Splits a mixed page into a bitonal text layer and a JPEG 2000 graphical layer.
pub trait LayerSeparator: Send + Sync {
    fn name(&self) -> &str;

    fn requires(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn separate(&self, source: &Path, text: &Path, graphics: &Path) -> Result<(), BindError>;
}

/// `jbig2 -b <base> -p -s` from jbig2enc.
#[derive(Debug, Clone)]
pub struct Jbig2 {
    options: String,
}

impl Jbig2 {
    pub fn new(options: &str) -> Self {
        Self {
            options: options.to_string(),
        }
    }

    fn command(&self, base: &Path) -> ToolCommand {
        ToolCommand::new("jbig2")
            .arg("-b")
            .arg(base)
            .arg("-p")
            .arg("-s")
            .options(&self.options)
    }
}

impl SymbolCoder for Jbig2 {
    fn name(&self) -> &str {
        "jbig2"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec!["jbig2"]
    }

    fn fixed_arg_len(&self, base: &Path) -> usize {
        self.command(base).command_len()
    }

    fn encode_symbols(&self, sources: &[PathBuf], base: &Path) -> Result<SymbolBatch, BindError> {
        self.command(base).args(sources).run()?;
        let batch = symbol_outputs(base, sources.len());
        ensure_output("jbig2", &batch.dictionary)?;
        for page in &batch.pages {
            ensure_output("jbig2", page)?;
        }
        Ok(batch)
    }
}

/// Output names jbig2enc uses for `base` and `count` pages.
pub fn symbol_outputs(base: &Path, count: usize) -> SymbolBatch {
    let with_suffix = |suffix: &str| {
        let mut name = base.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    };
    SymbolBatch {
        dictionary: with_suffix(".sym"),
        pages: (0..count).map(|i| with_suffix(&format!(".{i:04}"))).collect(),
    }
}

/// ImageMagick separation: pure black is text, the rest is graphics.
#[derive(Debug, Clone, Default)]
pub struct OpaqueSeparator;

impl LayerSeparator for OpaqueSeparator {
    fn name(&self) -> &str {
        "convert"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec!["convert"]
    }

    fn separate(&self, source: &Path, text: &Path, graphics: &Path) -> Result<(), BindError> {
        let graphics_tif = graphics.with_extension("tif");
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
            .arg(text)
            .run()?;
        ToolCommand::new("convert").arg(&graphics_tif).arg(graphics).run()?;
        if let Err(e) = std::fs::remove_file(&graphics_tif) {
            debug!("Could not remove '{}': {}", graphics_tif.display(), e);
        }
        ensure_output("convert", text)?;
        ensure_output("convert", graphics)
    }
}

/// External collaborators of the PDF target.
#[derive(Clone)]
pub struct PdfToolchain {
    pub symbols: Arc<dyn SymbolCoder>,
    pub separator: Arc<dyn LayerSeparator>,
}

impl PdfToolchain {
    pub fn from_config(config: &BindConfig) -> Self {
        Self {
            symbols: Arc::new(Jbig2::new(&config.jbig2_options)),
            separator: Arc::new(OpaqueSeparator),
        }
    }

    pub fn required_tools(&self, plan: &PositionPlan) -> Vec<&'static str> {
        let mut tools = self.symbols.requires();
        if plan.body(PageClass::Color).next().is_some() {
            tools.extend(self.separator.requires());
        }
        tools
    }
}

/// Inputs of one PDF run.
pub(crate) struct PdfJob<'a> {
    pub book: &'a Book,
    pub plan: &'a PositionPlan,
    pub config: &'a BindConfig,
    pub tools: &'a PdfToolchain,
    pub info: DocumentInfo,
    pub work_dir: &'a Path,
    pub output: &'a Path,
}

/// A page reduced to its layers.
struct Layers {
    planned: PlannedPage,
    width: u32,
    height: u32,
    dpi: u32,
    text: PathBuf,
    graphics: Option<PathBuf>,
}

/// Build and write the PDF; returns the number of pages placed.
pub(crate) async fn render(job: PdfJob<'_>) -> Result<usize, BindError> {
    let state = RunState::new(job.config, job.plan.len());
    if job.plan.is_empty() {
        return Err(BindError::EmptyBook);
    }

    // ── Layers ───────────────────────────────────────────────────────────
    let mut prepared = stream::iter(job.plan.pages().iter().cloned().map(|planned| {
        let state = state.clone();
        let separator = Arc::clone(&job.tools.separator);
        let page = match planned.slot {
            Slot::Body { index, .. } => job.book.pages.get(index).cloned(),
            _ => None,
        };
        let work_dir = job.work_dir.to_path_buf();
        async move {
            let Some(page) = page else {
                return Err(BindError::Internal(format!(
                    "position {} has no body page",
                    planned.position
                )));
            };
            if state.is_stopped() {
                return Ok(None);
            }
            state.page_start(planned.position);
            blocking(move || prepare_layers(planned, &page, separator.as_ref(), &work_dir))
                .await
                .map(Some)
        }
    }))
    .buffered(job.config.concurrency.max(1));

    let mut layers = Vec::with_capacity(job.plan.len());
    while let Some(result) = prepared.next().await {
        state.check_stop(0)?;
        match result? {
            Some(l) => layers.push(l),
            None => {
                return Err(BindError::Cancelled {
                    placed: 0,
                    total: job.plan.len(),
                })
            }
        }
    }

    // ── Symbol coding ────────────────────────────────────────────────────
    let texts: Vec<PathBuf> = layers.iter().map(|l| l.text.clone()).collect();
    let base_name = |i: usize| job.work_dir.join(format!("jbig2-{i:04}"));
    let fixed = job.tools.symbols.fixed_arg_len(&base_name(0));
    let chunks = split_batches(fixed, &texts, job.config.command_length_limit);
    info!(
        "Coding {} text layers in {} {} call(s)",
        texts.len(),
        chunks.len(),
        job.tools.symbols.name()
    );

    let mut symbol_dictionaries = Vec::with_capacity(chunks.len());
    let mut pages = Vec::with_capacity(layers.len());
    let mut done = 0;
    for (i, chunk) in chunks.into_iter().enumerate() {
        state.check_stop(done)?;
        let chunk: Vec<PathBuf> = chunk.into_iter().cloned().collect();
        let count = chunk.len();
        let coder = Arc::clone(&job.tools.symbols);
        let base = base_name(i);
        let batch = blocking(move || coder.encode_symbols(&chunk, &base)).await?;

        symbol_dictionaries.push(read(&batch.dictionary).await?);
        for (page_stream, l) in batch.pages.iter().zip(&layers[done..done + count]) {
            let graphical = match &l.graphics {
                Some(path) => Some(read(path).await?),
                None => None,
            };
            pages.push(PdfPageInput {
                width: l.width,
                height: l.height,
                dpi: l.dpi,
                textual: read(page_stream).await?,
                symbol_dictionary: Some(i),
                graphical,
            });
            state.page_complete(l.planned.position);
        }
        done += count;
    }

    // ── Object graph ─────────────────────────────────────────────────────
    let document = build_document(&PdfBookInput {
        info: job.info,
        symbol_dictionaries,
        pages,
    });
    let serialized = document.serialize();
    debug!(
        "PDF object graph: {} objects, xref at byte {}",
        document.objects().len(),
        serialized.xref_offset
    );
    tokio::fs::write(job.output, &serialized.bytes)
        .await
        .map_err(|e| BindError::io(job.output, e))?;

    Ok(done)
}

/// Find or produce a page's text layer, plus its graphical layer for mixed pages.
fn prepare_layers(
    planned: PlannedPage,
    page: &crate::model::Page,
    separator: &dyn LayerSeparator,
    work_dir: &Path,
) -> Result<Layers, BindError> {
    let (width, height) =
        image::image_dimensions(&page.source_path).map_err(|e| BindError::InvalidImage {
            path: page.source_path.clone(),
            detail: e.to_string(),
        })?;

    let (text, graphics) = if page.bitonal {
        let text = page
            .text_layer_path
            .clone()
            .unwrap_or_else(|| page.source_path.clone());
        (text, None)
    } else {
        match (&page.text_layer_path, &page.graphical_layer_path) {
            (Some(text), Some(graphics)) if has_extension(graphics, &["jp2", "j2k", "jpx"]) => {
                (text.clone(), Some(graphics.clone()))
            }
            _ => {
                let stem = format!("layer-{:05}", planned.position);
                let text = work_dir.join(format!("{stem}.text.tif"));
                let graphics = work_dir.join(format!("{stem}.graphics.jp2"));
                separator.separate(&page.source_path, &text, &graphics)?;
                (text, Some(graphics))
            }
        }
    };

    Ok(Layers {
        planned,
        width,
        height,
        dpi: page.dpi,
        text,
        graphics,
    })
}

async fn read(path: &Path) -> Result<Vec<u8>, BindError> {
    tokio::fs::read(path).await.map_err(|e| BindError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Page;
    use crate::pipeline::plan::ClassSelection;

    #[test]
    fn symbol_outputs_follow_jbig2enc_naming() {
        let batch = symbol_outputs(Path::new("/work/jbig2-0001"), 3);
        assert_eq!(batch.dictionary, PathBuf::from("/work/jbig2-0001.sym"));
        assert_eq!(
            batch.pages,
            vec![
                PathBuf::from("/work/jbig2-0001.0000"),
                PathBuf::from("/work/jbig2-0001.0001"),
                PathBuf::from("/work/jbig2-0001.0002"),
            ]
        );
    }

    #[test]
    fn jbig2_fixed_len_includes_flags() {
        let coder = Jbig2::new("");
        let base = Path::new("/w/jbig2-0000");
        // "jbig2" + "-b" + base + "-p" + "-s", each arg quoted and spaced
        assert_eq!(
            coder.fixed_arg_len(base),
            5 + (2 + 3) + (base.as_os_str().len() + 3) + (2 + 3) + (2 + 3)
        );
    }

    #[test]
    fn mixed_pages_need_separator() {
        let mut book = Book::new(300);
        book.push(Page::new(0, "a.tif", true, 300));
        let tools = PdfToolchain::from_config(&BindConfig::default());
        let plan = PositionPlan::compute(&book, ClassSelection::ALL, false);
        assert_eq!(tools.required_tools(&plan), vec!["jbig2"]);

        book.push(Page::new(0, "b.tif", false, 300));
        let plan = PositionPlan::compute(&book, ClassSelection::ALL, false);
        assert_eq!(tools.required_tools(&plan), vec!["jbig2", "convert"]);
    }

    #[test]
    fn bitonal_page_uses_its_own_image_as_text_layer() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("001.png");
        image::GrayImage::from_pixel(40, 20, image::Luma([255]))
            .save(&source)
            .unwrap();
        let page = Page::new(0, &source, true, 300);
        let planned = PlannedPage {
            position: 1,
            slot: Slot::Body {
                index: 0,
                class: PageClass::Bitonal,
            },
            title: None,
        };
        let layers = prepare_layers(planned, &page, &OpaqueSeparator, dir.path()).unwrap();
        assert_eq!((layers.width, layers.height), (40, 20));
        assert_eq!(layers.text, source);
        assert!(layers.graphics.is_none());
    }
}
