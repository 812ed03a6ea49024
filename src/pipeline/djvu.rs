//! DjVu target: encode pages and merge them into one growing container.
//!
//! Order of work:
//!
//! 1. bitonal sweep, appended in book order (batched encoders first split by
//!    command length);
//! 2. color sweep, each page inserted at its planned position, ascending;
//! 3. front cover at 1, back cover appended;
//! 4. one post-assembly script.
//!
//! Encodes run ahead in parallel up to `concurrency`; inserts happen one at
//! a time in the planned order, so when the color page with insert position
//! `r` goes in, exactly `r - 1` pages precede it.

use super::assemble::{Assembler, ContainerTool, Djvm};
use super::encode::{self, BitonalPort, LayerEncoder};
use super::metadata::{DocumentMetadata, Djvused, MetadataInjector, PostScript, ScriptTool};
use super::plan::{ClassSelection, PlannedPage, PositionPlan, Slot};
use super::tools::split_batches;
use super::{blocking, RunState};
use crate::config::BindConfig;
use crate::error::BindError;
use crate::model::{Book, PageClass};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// External collaborators of the DjVu target.
#[derive(Clone)]
pub struct DjvuToolchain {
    /// `None` when the configured bitonal encoder is unknown.
    pub bitonal: Option<BitonalPort>,
    /// `None` when the configured color encoder is unknown.
    pub color: Option<Arc<dyn LayerEncoder>>,
    pub cover: Arc<dyn LayerEncoder>,
    pub container: Arc<dyn ContainerTool>,
    pub script: Arc<dyn ScriptTool>,
}

impl DjvuToolchain {
    pub fn from_config(config: &BindConfig) -> Self {
        Self {
            bitonal: encode::bitonal_encoder(config),
            color: encode::color_encoder(config),
            cover: encode::cover_encoder(config),
            container: Arc::new(Djvm),
            script: Arc::new(Djvused),
        }
    }

    pub fn selection(&self) -> ClassSelection {
        ClassSelection {
            bitonal: self.bitonal.is_some(),
            color: self.color.is_some(),
        }
    }

    pub fn required_tools(&self, plan: &PositionPlan) -> Vec<&'static str> {
        let mut tools = Vec::new();
        if let Some(bitonal) = &self.bitonal {
            if plan.body(PageClass::Bitonal).next().is_some() {
                tools.extend(bitonal.requires());
            }
        }
        if let Some(color) = &self.color {
            if plan.body(PageClass::Color).next().is_some() {
                tools.extend(color.requires());
            }
        }
        if plan.front_cover().is_some() || plan.back_cover().is_some() {
            tools.extend(self.cover.requires());
        }
        tools.extend(self.container.requires());
        tools.extend(self.script.requires());
        tools
    }
}

/// Inputs of one DjVu run.
pub(crate) struct DjvuJob<'a> {
    pub book: &'a Book,
    pub plan: &'a PositionPlan,
    pub config: &'a BindConfig,
    pub tools: &'a DjvuToolchain,
    pub metadata: &'a DocumentMetadata,
    /// Scratch directory for artifacts and script payloads.
    pub work_dir: &'a Path,
    /// Where the container is built.
    pub container: &'a Path,
}

/// One page waiting to be encoded.
struct PageJob {
    planned: PlannedPage,
    source: PathBuf,
    dpi: u32,
    artifact: PathBuf,
}

/// Build the container; returns the number of pages placed.
pub(crate) async fn assemble(job: DjvuJob<'_>) -> Result<usize, BindError> {
    let state = RunState::new(job.config, job.plan.len());
    let assembler = Assembler::new(Arc::clone(&job.tools.container), job.container);
    let mut placed = 0;

    // ── Bitonal sweep ────────────────────────────────────────────────────
    match &job.tools.bitonal {
        Some(BitonalPort::Batch(encoder)) => {
            placed += batch_sweep(&job, encoder, &assembler, &state, placed).await?;
        }
        Some(BitonalPort::Single(encoder)) => {
            let jobs = page_jobs(&job, PageClass::Bitonal);
            placed += single_sweep(&job, encoder, jobs, false, &assembler, &state, placed).await?;
        }
        None => {}
    }

    // ── Color sweep ──────────────────────────────────────────────────────
    if let Some(encoder) = &job.tools.color {
        let jobs = page_jobs(&job, PageClass::Color);
        placed += single_sweep(&job, encoder, jobs, true, &assembler, &state, placed).await?;
    }
    info!("Placed {} body pages", placed);

    // ── Covers ───────────────────────────────────────────────────────────
    let covers = [
        (job.plan.front_cover(), &job.book.supplements.cover_front, 1, "front"),
        (job.plan.back_cover(), &job.book.supplements.cover_back, -1, "back"),
    ];
    for (planned, source, at, name) in covers {
        let (Some(position), Some(source)) = (planned, source) else {
            continue;
        };
        state.check_stop(placed)?;
        state.page_start(position);
        let encoder = Arc::clone(&job.tools.cover);
        let source = source.clone();
        let artifact = job.work_dir.join(format!("cover-{name}.djvu"));
        let dpi = job.book.dpi;
        let asm = assembler.clone();
        blocking(move || {
            encoder.encode(&source, &artifact, dpi)?;
            asm.insert(&artifact, Some(at))
        })
        .await?;
        placed += 1;
        state.page_complete(position);
        debug!("Placed {} cover at {}", name, position);
    }

    if placed == 0 {
        return Err(BindError::EmptyBook);
    }

    // ── Metadata, bookmarks, titles, OCR ─────────────────────────────────
    state.check_stop(placed)?;
    let script = PostScript::build(
        job.book,
        job.plan,
        job.metadata,
        job.config.ocr,
        job.work_dir,
    )?;
    let injector = MetadataInjector::new(Arc::clone(&job.tools.script));
    let container = job.container.to_path_buf();
    blocking(move || injector.apply(&script, &container)).await?;

    Ok(placed)
}

fn page_jobs(job: &DjvuJob<'_>, class: PageClass) -> Vec<PageJob> {
    job.plan
        .body(class)
        .filter_map(|planned| {
            let Slot::Body { index, .. } = planned.slot else {
                return None;
            };
            let page = job.book.pages.get(index)?;
            Some(PageJob {
                planned: planned.clone(),
                source: page.source_path.clone(),
                dpi: page.dpi,
                artifact: job.work_dir.join(format!("page-{:05}.djvu", index + 1)),
            })
        })
        .collect()
}

/// Encode pages in parallel, insert them one by one in plan order.
///
/// With `positioned` each page goes to its planned insert position,
/// otherwise it is appended.
async fn single_sweep(
    job: &DjvuJob<'_>,
    encoder: &Arc<dyn LayerEncoder>,
    jobs: Vec<PageJob>,
    positioned: bool,
    assembler: &Assembler,
    state: &RunState,
    placed_before: usize,
) -> Result<usize, BindError> {
    let mut placed = 0;
    let mut encoded = stream::iter(jobs.into_iter().map(|page| {
        let encoder = Arc::clone(encoder);
        let state = state.clone();
        async move {
            if state.is_stopped() {
                return Ok::<_, BindError>(None);
            }
            state.page_start(page.planned.position);
            let (source, artifact, dpi) = (page.source.clone(), page.artifact.clone(), page.dpi);
            blocking(move || encoder.encode(&source, &artifact, dpi)).await?;
            Ok(Some(page))
        }
    }))
    .buffered(job.config.concurrency.max(1));

    while let Some(result) = encoded.next().await {
        let page = result?;
        state.check_stop(placed_before + placed)?;
        let Some(page) = page else {
            return Err(BindError::Cancelled {
                placed: placed_before + placed,
                total: job.plan.len(),
            });
        };

        let at = positioned.then(|| job.plan.insert_position(&page.planned) as i64);
        let asm = assembler.clone();
        let artifact = page.artifact.clone();
        blocking(move || asm.insert(&artifact, at)).await?;

        placed += 1;
        state.page_complete(page.planned.position);
    }
    Ok(placed)
}

/// Encode all bitonal pages with a shared dictionary, in as few calls as
/// the command-length limit allows, appending each call's artifact.
async fn batch_sweep(
    job: &DjvuJob<'_>,
    encoder: &Arc<dyn encode::BatchLayerEncoder>,
    assembler: &Assembler,
    state: &RunState,
    placed_before: usize,
) -> Result<usize, BindError> {
    let jobs = page_jobs(job, PageClass::Bitonal);
    if jobs.is_empty() {
        return Ok(0);
    }
    let sources: Vec<PathBuf> = jobs.iter().map(|j| j.source.clone()).collect();
    let artifact_name = |i: usize| job.work_dir.join(format!("bitonal-{i:04}.djvu"));
    let fixed = encoder.fixed_arg_len(&artifact_name(0), job.book.dpi);
    let chunks = split_batches(fixed, &sources, job.config.command_length_limit);
    if chunks.len() > 1 {
        info!(
            "{} bitonal pages split into {} {} calls",
            sources.len(),
            chunks.len(),
            encoder.name()
        );
    }

    let mut placed = 0;
    for (i, chunk) in chunks.into_iter().enumerate() {
        state.check_stop(placed_before + placed)?;
        let pages = &jobs[placed..placed + chunk.len()];
        for page in pages {
            state.page_start(page.planned.position);
        }

        let chunk: Vec<PathBuf> = chunk.into_iter().cloned().collect();
        let artifact = artifact_name(i);
        let encoder = Arc::clone(encoder);
        let asm = assembler.clone();
        let dpi = job.book.dpi;
        blocking(move || {
            encoder.encode_batch(&chunk, &artifact, dpi)?;
            let produced = asm.artifact_pages(&artifact)?;
            if produced != chunk.len() {
                return Err(BindError::EncodeFailure {
                    tool: encoder.name().to_string(),
                    output: artifact,
                    detail: format!("{} page(s) for {} source image(s)", produced, chunk.len()),
                });
            }
            asm.insert(&artifact, None)
        })
        .await?;

        for page in pages {
            state.page_complete(page.planned.position);
        }
        placed += pages.len();
    }
    Ok(placed)
}
