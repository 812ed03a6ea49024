//! Binding entry points.
//!
//! [`bind`] runs the real external tools for the configured target.
//! [`bind_with`] takes the [`Toolchain`] explicitly, which is how tests and
//! embedders substitute their own encoders and container tools. Both build
//! the book in a scratch directory next to the output and rename it into
//! place only on success, so a failed or cancelled run never leaves a
//! partial file at the output path.

use crate::config::{BindConfig, TargetFormat};
use crate::error::{BindError, Degradation};
use crate::model::{Book, PageClass};
use crate::output::{BindOutput, BindStats};
use crate::pdf::DocumentInfo;
use crate::pipeline::djvu::{self, DjvuJob};
use crate::pipeline::jbig2::{self, PdfJob};
use crate::pipeline::metadata::DocumentMetadata;
use crate::pipeline::plan::{ClassSelection, PositionPlan};
use crate::pipeline::{tools, Toolchain};
use chrono::Utc;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Bind `book` into `output` with the real tools for `config.target`.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(BindOutput)` on success, even if a page class was skipped
/// (check `output.warnings`).
///
/// # Errors
/// Returns `Err(BindError)` only for fatal errors:
/// - a page, cover or supplement file does not exist
/// - a required tool is not on `PATH` (checked before any page is encoded)
/// - an encoder produced nothing, or a merge lost pages
/// - the post-assembly script was rejected
/// - the run was cancelled through the stop handle
///
/// # Example
/// ```rust,no_run
/// use bindery::{bind, BindConfig, Book};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let book = Book::from_images(&["scans/001.tif", "scans/002.tif"], 600)?;
/// let config = BindConfig::builder().title("Field Notes").build()?;
/// let output = bind(&book, "field-notes.djvu", &config).await?;
/// eprintln!("{} pages written", output.stats.placed_pages);
/// # Ok(())
/// # }
/// ```
pub async fn bind(
    book: &Book,
    output: impl AsRef<Path>,
    config: &BindConfig,
) -> Result<BindOutput, BindError> {
    bind_with(book, output, config, Toolchain::from_config(config)).await
}

/// Bind `book` with an explicit toolchain.
///
/// The toolchain decides the target format; `config.target` is not
/// consulted.
pub async fn bind_with(
    book: &Book,
    output: impl AsRef<Path>,
    config: &BindConfig,
    toolchain: Toolchain,
) -> Result<BindOutput, BindError> {
    let total_start = Instant::now();
    let output = output.as_ref();
    let target = toolchain.target();
    info!(
        "Binding {} pages into '{}' ({})",
        book.pages.len(),
        output.display(),
        target
    );

    // ── Step 1: Validate inputs ──────────────────────────────────────────
    book.validate()?;

    // ── Step 2: Plan positions ───────────────────────────────────────────
    let selection = toolchain.selection();
    let warnings = degradations(book, config, target, selection);
    for warning in &warnings {
        warn!("{}", warning);
        if let (
            Some(cb),
            Degradation::UnsupportedEncoderChoice {
                class,
                encoder,
                pages,
            },
        ) = (&config.progress_callback, warning)
        {
            cb.on_class_skipped(*class, encoder, *pages);
        }
    }

    let plan = PositionPlan::compute(book, selection, target == TargetFormat::Djvu);
    if plan.is_empty() {
        return Err(BindError::EmptyBook);
    }
    debug!("Planned {} pages", plan.len());

    // ── Step 3: Check external tools ─────────────────────────────────────
    tools::require(toolchain.required_tools(&plan))?;

    if let Some(cb) = &config.progress_callback {
        cb.on_bind_start(plan.len());
    }

    // ── Step 4: Build in scratch space ───────────────────────────────────
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| BindError::OutputWriteFailed {
            path: output.to_path_buf(),
            source: e,
        })?;
    let work = tempfile::Builder::new()
        .prefix(".bindery-")
        .tempdir_in(parent)
        .map_err(|e| BindError::io(parent, e))?;
    let staged = work.path().join(match target {
        TargetFormat::Djvu => "book.djvu",
        TargetFormat::Pdf => "book.pdf",
    });

    let created = Utc::now();
    let placed = match &toolchain {
        Toolchain::Djvu(djvu_tools) => {
            let metadata = DocumentMetadata {
                title: config.title.clone(),
                author: config.author.clone(),
                subject: config.subject.clone(),
                created,
            };
            djvu::assemble(DjvuJob {
                book,
                plan: &plan,
                config,
                tools: djvu_tools,
                metadata: &metadata,
                work_dir: work.path(),
                container: &staged,
            })
            .await?
        }
        Toolchain::Pdf(pdf_tools) => {
            jbig2::render(PdfJob {
                book,
                plan: &plan,
                config,
                tools: pdf_tools,
                info: DocumentInfo {
                    title: config.title.clone(),
                    author: config.author.clone(),
                    subject: config.subject.clone(),
                    created,
                },
                work_dir: work.path(),
                output: &staged,
            })
            .await?
        }
    };

    // ── Step 5: Move into place ──────────────────────────────────────────
    tokio::fs::rename(&staged, output)
        .await
        .map_err(|e| BindError::OutputWriteFailed {
            path: output.to_path_buf(),
            source: e,
        })?;
    let output_bytes = tokio::fs::metadata(output)
        .await
        .map(|m| m.len())
        .unwrap_or(0);

    let stats = BindStats {
        body_pages: book.pages.len(),
        bitonal_pages: plan.body(PageClass::Bitonal).count(),
        color_pages: plan.body(PageClass::Color).count(),
        cover_pages: plan.len() - plan.body_len(),
        skipped_pages: book.pages.len() - plan.body_len(),
        placed_pages: placed,
        output_bytes,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Bound {} pages ({} bytes) in {}ms",
        stats.placed_pages, stats.output_bytes, stats.total_duration_ms
    );

    if let Some(cb) = &config.progress_callback {
        cb.on_bind_complete(placed);
    }

    Ok(BindOutput {
        output: output.to_path_buf(),
        format: target,
        plan,
        warnings,
        stats,
    })
}

/// Synchronous wrapper around [`bind`].
///
/// Creates a temporary tokio runtime internally.
pub fn bind_sync(
    book: &Book,
    output: impl AsRef<Path>,
    config: &BindConfig,
) -> Result<BindOutput, BindError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| BindError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(bind(book, output, config))
}

/// Compute the final page numbering without running any tool.
///
/// Uses the same encoder-name rules as [`bind`], so pages of a class with
/// an unknown encoder are left out here too.
pub fn inspect(book: &Book, config: &BindConfig) -> PositionPlan {
    PositionPlan::compute(
        book,
        ClassSelection::from_config(config),
        config.target == TargetFormat::Djvu,
    )
}

/// Non-fatal reductions the run will make, known before it starts.
pub fn degradations(
    book: &Book,
    config: &BindConfig,
    target: TargetFormat,
    selection: ClassSelection,
) -> Vec<Degradation> {
    let mut warnings = Vec::new();

    let classes = [
        (PageClass::Bitonal, &config.bitonal_encoder),
        (PageClass::Color, &config.color_encoder),
    ];
    for (class, encoder) in classes {
        let pages = book.count(class);
        if !selection.includes(class) && pages > 0 {
            warnings.push(Degradation::UnsupportedEncoderChoice {
                class,
                encoder: encoder.clone(),
                pages,
            });
        }
    }

    if target == TargetFormat::Pdf {
        let s = &book.supplements;
        let unsupported = [
            ("Covers", s.cover_front.is_some() || s.cover_back.is_some()),
            ("Metadata record", s.metadata.is_some()),
            ("Bookmarks", s.bookmarks.is_some()),
            ("Page titles", book.pages.iter().any(|p| p.display_title().is_some())),
            ("OCR text", config.ocr && book.pages.iter().any(|p| p.text.is_some())),
        ];
        for (feature, present) in unsupported {
            if present {
                warnings.push(Degradation::FeatureUnsupported {
                    feature: feature.to_string(),
                    target: target.to_string(),
                });
            }
        }
    }

    warnings
}
