//! CLI binary for bindery.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `BindConfig` and a `Book`, then prints results.

use anyhow::{Context, Result};
use bindery::pipeline::plan::Slot;
use bindery::{
    bind, inspect, BindConfig, BindProgressCallback, Book, PageClass, PositionPlan,
    ProgressCallback, StopHandle, TargetFormat,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// placed page. Encodes run ahead of placement, so start and completion
/// events for different pages interleave.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-page wall-clock start times, keyed by final position.
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// The bar starts as a spinner; its length is set in `on_bind_start`.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Checking tools…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Binding");
        self.bar.reset_eta();
    }

    fn elapsed_ms(&self, position: usize) -> u128 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(&position))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0)
    }
}

impl BindProgressCallback for CliProgressCallback {
    fn on_bind_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Binding {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, position: usize, _total: usize) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(position, Instant::now());
        }
        self.bar.set_message(format!("page {position}"));
    }

    fn on_page_complete(&self, position: usize, total: usize) {
        let elapsed_ms = self.elapsed_ms(position);
        self.bar.println(format!(
            "  {} Page {:>4}/{:<4}  {}",
            green("✓"),
            position,
            total,
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_class_skipped(&self, class: PageClass, encoder: &str, pages: usize) {
        self.bar.println(format!(
            "  {} {} {} pages skipped: unknown encoder '{}'",
            yellow("⚠"),
            pages,
            class,
            encoder
        ));
    }

    fn on_bind_complete(&self, placed_pages: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages bound",
            green("✔"),
            bold(&placed_pages.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Bind scans into a DjVu book (classes detected from pixels)
  bindery scans/*.tif -o book.djvu

  # Bind from a manifest with covers, titles and OCR text
  bindery --manifest book.json --ocr -o book.djvu

  # Per-page cjb2 instead of the shared-dictionary encoder
  bindery --bitonal-encoder cjb2 --cjb2-options "-lossy" scans/*.tif -o book.djvu

  # JBIG2 PDF
  bindery scans/*.png -o book.pdf

  # Show the final numbering without running any tool
  bindery --manifest book.json -o book.djvu --plan-only

MANIFEST (JSON):
  {
    "dpi": 600,
    "pages": [
      {"path": "001.tif", "bitonal": true, "title": "i"},
      {"path": "002.tif", "bitonal": false, "text": "(page 0 0 2550 3300 ...)"}
    ],
    "cover_front": "front.jpg",
    "cover_back": "back.jpg",
    "metadata": "meta.txt",
    "bookmarks": "outline.txt"
  }
  Relative paths resolve against the manifest's directory. Pages without
  "bitonal" are classified from their pixels.

ENCODERS:
  Class     Name       Tools
  ───────   ────────   ─────────────────────────────────────
  bitonal   minidjvu   minidjvu (shared dictionary, default)
  bitonal   cjb2       cjb2
  color     csepdjvu   csepdjvu, cjb2, ddjvu, convert (default)
  color     c44        c44
  color     cpaldjvu   cpaldjvu
  (all)                djvm, djvused
  PDF                  jbig2, convert

ENVIRONMENT VARIABLES:
  Every option can be set with BINDERY_<OPTION>, e.g. BINDERY_DPI=600.
  RUST_LOG overrides the log filter.
"#;

/// Bind scanned page images into a DjVu or JBIG2 PDF book.
#[derive(Parser, Debug)]
#[command(
    name = "bindery",
    version,
    about = "Bind scanned page images into a DjVu or JBIG2 PDF book",
    long_about = "Bind scanned page images into a single DjVu or JBIG2-compressed PDF book. \
Text pages and picture pages are encoded by different external encoders and merged \
back in their original order, with optional covers, metadata, outline, page titles \
and OCR text.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Page images in book order.
    #[arg(required_unless_present = "manifest", conflicts_with = "manifest")]
    images: Vec<PathBuf>,

    /// JSON book manifest instead of positional images.
    #[arg(short, long, env = "BINDERY_MANIFEST")]
    manifest: Option<PathBuf>,

    /// Output file.
    #[arg(short, long, env = "BINDERY_OUTPUT")]
    output: PathBuf,

    /// Output format. Default: from the output extension, else djvu.
    #[arg(short, long, env = "BINDERY_FORMAT", value_enum)]
    format: Option<FormatArg>,

    /// Scan resolution for positional images.
    #[arg(long, env = "BINDERY_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(25..=4800))]
    dpi: u32,

    /// Bitonal encoder: minidjvu or cjb2.
    #[arg(long, env = "BINDERY_BITONAL_ENCODER", default_value = "minidjvu")]
    bitonal_encoder: String,

    /// Color encoder: csepdjvu, c44 or cpaldjvu.
    #[arg(long, env = "BINDERY_COLOR_ENCODER", default_value = "csepdjvu")]
    color_encoder: String,

    /// Extra arguments for cjb2.
    #[arg(long, env = "BINDERY_CJB2_OPTIONS", allow_hyphen_values = true)]
    cjb2_options: Option<String>,

    /// Extra arguments for minidjvu.
    #[arg(long, env = "BINDERY_MINIDJVU_OPTIONS", allow_hyphen_values = true)]
    minidjvu_options: Option<String>,

    /// Extra arguments for c44.
    #[arg(long, env = "BINDERY_C44_OPTIONS", allow_hyphen_values = true)]
    c44_options: Option<String>,

    /// Extra arguments for cpaldjvu.
    #[arg(long, env = "BINDERY_CPALDJVU_OPTIONS", allow_hyphen_values = true)]
    cpaldjvu_options: Option<String>,

    /// Extra arguments for csepdjvu.
    #[arg(long, env = "BINDERY_CSEPDJVU_OPTIONS", allow_hyphen_values = true)]
    csepdjvu_options: Option<String>,

    /// Extra arguments for jbig2 (PDF output).
    #[arg(long, env = "BINDERY_JBIG2_OPTIONS", allow_hyphen_values = true)]
    jbig2_options: Option<String>,

    /// Front cover image (overrides the manifest).
    #[arg(long, env = "BINDERY_COVER_FRONT")]
    cover_front: Option<PathBuf>,

    /// Back cover image (overrides the manifest).
    #[arg(long, env = "BINDERY_COVER_BACK")]
    cover_back: Option<PathBuf>,

    /// Metadata record file, `key "value"` per line.
    #[arg(long, env = "BINDERY_METADATA_FILE")]
    metadata_file: Option<PathBuf>,

    /// Outline (bookmarks) file in djvused syntax.
    #[arg(long, env = "BINDERY_BOOKMARKS")]
    bookmarks: Option<PathBuf>,

    /// Document title.
    #[arg(long, env = "BINDERY_TITLE")]
    title: Option<String>,

    /// Document author.
    #[arg(long, env = "BINDERY_AUTHOR")]
    author: Option<String>,

    /// Document subject.
    #[arg(long, env = "BINDERY_SUBJECT")]
    subject: Option<String>,

    /// Embed each page's OCR text.
    #[arg(long, env = "BINDERY_OCR")]
    ocr: bool,

    /// Pages encoded at the same time.
    #[arg(short, long, env = "BINDERY_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Longest command line handed to a batched encoder, in bytes.
    #[arg(long, env = "BINDERY_COMMAND_LENGTH_LIMIT",
          default_value_t = bindery::config::DEFAULT_COMMAND_LENGTH_LIMIT)]
    command_length_limit: usize,

    /// Print the final page numbering and exit.
    #[arg(long)]
    plan_only: bool,

    /// Print the result (or plan) as JSON on stdout.
    #[arg(long, env = "BINDERY_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "BINDERY_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BINDERY_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "BINDERY_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FormatArg {
    Djvu,
    Pdf,
}

impl From<FormatArg> for TargetFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Djvu => TargetFormat::Djvu,
            FormatArg::Pdf => TargetFormat::Pdf,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the feedback; library INFO logs would tear it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.plan_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Load the book ────────────────────────────────────────────────────
    let book = load_book(&cli).await?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn BindProgressCallback>)
    } else {
        None
    };
    let stop = StopHandle::new();
    let config = build_config(&cli, progress_cb, stop.clone())?;

    // ── Plan-only mode ───────────────────────────────────────────────────
    if cli.plan_only {
        let plan = inspect(&book, &config);
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&plan).context("Failed to serialise plan")?
            );
        } else {
            print_plan(&book, &plan);
        }
        return Ok(());
    }

    // Stop between pages on Ctrl-C; the running encoder finishes first.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{} stopping after the current page…", yellow("⚠"));
            stop.stop();
        }
    });

    // ── Run ──────────────────────────────────────────────────────────────
    let output = bind(&book, &cli.output, &config)
        .await
        .context("Binding failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
        return Ok(());
    }

    if !cli.quiet {
        for warning in &output.warnings {
            eprintln!("{} {}", yellow("⚠"), warning);
        }
        let stats = &output.stats;
        eprintln!(
            "{}  {} pages ({} bitonal, {} color, {} covers)  {}  {}ms  →  {}",
            if output.is_complete() {
                green("✔")
            } else {
                yellow("⚠")
            },
            stats.placed_pages,
            stats.bitonal_pages,
            stats.color_pages,
            stats.cover_pages,
            dim(&format_bytes(stats.output_bytes)),
            stats.total_duration_ms,
            bold(&output.output.display().to_string()),
        );
    }

    Ok(())
}

/// Build the book from the manifest or the positional images, then apply
/// the supplement flags.
async fn load_book(cli: &Cli) -> Result<Book> {
    let mut book = if let Some(ref manifest) = cli.manifest {
        let manifest = manifest.clone();
        tokio::task::spawn_blocking(move || Book::from_manifest(&manifest))
            .await
            .context("Manifest loader panicked")?
            .with_context(|| format!("Failed to load manifest {:?}", cli.manifest))?
    } else {
        let images = cli.images.clone();
        let dpi = cli.dpi;
        tokio::task::spawn_blocking(move || Book::from_images(&images, dpi))
            .await
            .context("Page classifier panicked")?
            .context("Failed to classify page images")?
    };

    let supplements = &mut book.supplements;
    if cli.cover_front.is_some() {
        supplements.cover_front = cli.cover_front.clone();
    }
    if cli.cover_back.is_some() {
        supplements.cover_back = cli.cover_back.clone();
    }
    if cli.metadata_file.is_some() {
        supplements.metadata = cli.metadata_file.clone();
    }
    if cli.bookmarks.is_some() {
        supplements.bookmarks = cli.bookmarks.clone();
    }
    Ok(book)
}

/// Map CLI args to `BindConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>, stop: StopHandle) -> Result<BindConfig> {
    let target = cli
        .format
        .clone()
        .map(TargetFormat::from)
        .or_else(|| TargetFormat::from_path(&cli.output))
        .unwrap_or_default();

    let mut builder = BindConfig::builder()
        .target(target)
        .bitonal_encoder(&cli.bitonal_encoder)
        .color_encoder(&cli.color_encoder)
        .ocr(cli.ocr)
        .concurrency(cli.concurrency)
        .command_length_limit(cli.command_length_limit)
        .stop_handle(stop);

    if let Some(ref opts) = cli.cjb2_options {
        builder = builder.cjb2_options(opts);
    }
    if let Some(ref opts) = cli.minidjvu_options {
        builder = builder.minidjvu_options(opts);
    }
    if let Some(ref opts) = cli.c44_options {
        builder = builder.c44_options(opts);
    }
    if let Some(ref opts) = cli.cpaldjvu_options {
        builder = builder.cpaldjvu_options(opts);
    }
    if let Some(ref opts) = cli.csepdjvu_options {
        builder = builder.csepdjvu_options(opts);
    }
    if let Some(ref opts) = cli.jbig2_options {
        builder = builder.jbig2_options(opts);
    }

    if let Some(ref title) = cli.title {
        builder = builder.title(title);
    }
    if let Some(ref author) = cli.author {
        builder = builder.author(author);
    }
    if let Some(ref subject) = cli.subject {
        builder = builder.subject(subject);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Human-readable plan listing.
fn print_plan(book: &Book, plan: &PositionPlan) {
    for planned in plan.pages() {
        let (kind, source): (&str, Option<&Path>) = match planned.slot {
            Slot::FrontCover => ("cover", book.supplements.cover_front.as_deref()),
            Slot::BackCover => ("cover", book.supplements.cover_back.as_deref()),
            Slot::Body { index, class } => (
                match class {
                    PageClass::Bitonal => "bitonal",
                    PageClass::Color => "color",
                },
                book.pages.get(index).map(|p| p.source_path.as_path()),
            ),
        };
        println!(
            "{:>5}  {:<8}  {:<24}  {}",
            planned.position,
            kind,
            planned.title.as_deref().unwrap_or(""),
            source.map(|p| p.display().to_string()).unwrap_or_default(),
        );
    }
    let skipped = book.pages.len() - plan.body_len();
    if skipped > 0 {
        eprintln!("{} {} pages have no usable encoder and are left out", yellow("⚠"), skipped);
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
