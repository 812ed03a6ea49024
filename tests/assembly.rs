//! End-to-end binding against file-backed fakes of every external tool.
//!
//! Page artifacts and containers are plain text files holding one page
//! label per line, so the final order of a bound book can be read back and
//! compared directly.

use bindery::error::{BindError, Degradation};
use bindery::pipeline::assemble::ContainerTool;
use bindery::pipeline::encode::{BatchLayerEncoder, BitonalPort, LayerEncoder};
use bindery::pipeline::jbig2::{LayerSeparator, SymbolBatch, SymbolCoder};
use bindery::pipeline::metadata::ScriptTool;
use bindery::pipeline::{DjvuToolchain, PdfToolchain};
use bindery::{
    bind_with, BindConfig, BindProgressCallback, Book, Page, PageClass, StopHandle, TargetFormat,
    Toolchain,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Fakes ────────────────────────────────────────────────────────────────

fn fake_failure(tool: &str, e: impl std::fmt::Display) -> BindError {
    BindError::ToolFailed {
        tool: tool.to_string(),
        detail: e.to_string(),
    }
}

fn label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Writes a one-line artifact holding the source's file stem.
struct LabelEncoder;

impl LayerEncoder for LabelEncoder {
    fn name(&self) -> &str {
        "label"
    }

    fn encode(&self, source: &Path, output: &Path, _dpi: u32) -> Result<(), BindError> {
        fs::write(output, format!("{}\n", label(source))).map_err(|e| fake_failure("label", e))
    }
}

/// Writes one line per source and remembers each call's size.
#[derive(Default)]
struct BatchLabelEncoder {
    calls: Mutex<Vec<usize>>,
}

impl BatchLayerEncoder for BatchLabelEncoder {
    fn name(&self) -> &str {
        "batch-label"
    }

    fn fixed_arg_len(&self, output: &Path, _dpi: u32) -> usize {
        20 + output.as_os_str().len()
    }

    fn encode_batch(&self, sources: &[PathBuf], output: &Path, _dpi: u32) -> Result<(), BindError> {
        self.calls.lock().unwrap().push(sources.len());
        let body: String = sources.iter().map(|s| format!("{}\n", label(s))).collect();
        fs::write(output, body).map_err(|e| fake_failure("batch-label", e))
    }
}

/// A container is a text file with one page per line.
struct LineContainer;

impl ContainerTool for LineContainer {
    fn name(&self) -> &str {
        "lines"
    }

    fn merge(&self, artifact: &Path, container: &Path, position: Option<usize>) -> Result<(), BindError> {
        let mut pages = read_lines(container);
        let added = read_lines(artifact);
        let at = position.map_or(pages.len(), |p| p - 1);
        pages.splice(at..at, added);
        fs::write(container, pages.join("\n") + "\n").map_err(|e| fake_failure("lines", e))
    }

    fn page_count(&self, path: &Path) -> Result<usize, BindError> {
        Ok(read_lines(path).len())
    }
}

/// Accepts every merge but never changes the container.
struct LossyContainer;

impl ContainerTool for LossyContainer {
    fn name(&self) -> &str {
        "lossy"
    }

    fn merge(&self, _artifact: &Path, _container: &Path, _position: Option<usize>) -> Result<(), BindError> {
        Ok(())
    }

    fn page_count(&self, path: &Path) -> Result<usize, BindError> {
        Ok(read_lines(path).len())
    }
}

/// Merges like [`LineContainer`] but never starts a container.
struct NeverCreated;

impl ContainerTool for NeverCreated {
    fn name(&self) -> &str {
        "never-created"
    }

    fn merge(&self, artifact: &Path, container: &Path, position: Option<usize>) -> Result<(), BindError> {
        LineContainer.merge(artifact, container, position)
    }

    fn create(&self, _artifact: &Path, _container: &Path) -> Result<(), BindError> {
        Ok(())
    }

    fn page_count(&self, path: &Path) -> Result<usize, BindError> {
        Ok(read_lines(path).len())
    }
}

/// Drops the last source of every batch.
struct ShortBatchEncoder;

impl BatchLayerEncoder for ShortBatchEncoder {
    fn name(&self) -> &str {
        "short-batch"
    }

    fn fixed_arg_len(&self, output: &Path, _dpi: u32) -> usize {
        20 + output.as_os_str().len()
    }

    fn encode_batch(&self, sources: &[PathBuf], output: &Path, _dpi: u32) -> Result<(), BindError> {
        let kept = &sources[..sources.len().saturating_sub(1)];
        let body: String = kept.iter().map(|s| format!("{}\n", label(s))).collect();
        fs::write(output, body).map_err(|e| fake_failure("short-batch", e))
    }
}

/// Remembers every script applied.
#[derive(Default)]
struct RecordingScript {
    scripts: Mutex<Vec<String>>,
}

impl ScriptTool for RecordingScript {
    fn name(&self) -> &str {
        "recording"
    }

    fn apply_script(&self, script: &str, _container: &Path) -> Result<(), BindError> {
        self.scripts.lock().unwrap().push(script.to_string());
        Ok(())
    }
}

struct Fakes {
    batch: Arc<BatchLabelEncoder>,
    script: Arc<RecordingScript>,
}

impl Fakes {
    fn new() -> Self {
        Self {
            batch: Arc::new(BatchLabelEncoder::default()),
            script: Arc::new(RecordingScript::default()),
        }
    }

    fn toolchain(&self) -> DjvuToolchain {
        DjvuToolchain {
            bitonal: Some(BitonalPort::Batch(self.batch.clone())),
            color: Some(Arc::new(LabelEncoder)),
            cover: Arc::new(LabelEncoder),
            container: Arc::new(LineContainer),
            script: self.script.clone(),
        }
    }

    fn scripts(&self) -> Vec<String> {
        self.script.scripts.lock().unwrap().clone()
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"scan").unwrap();
    path
}

/// `layout` is one char per page: `b` bitonal, `c` color. Pages are named
/// `p01`, `p02`, ... in book order.
fn book(dir: &Path, layout: &str) -> Book {
    let mut book = Book::new(300);
    for (i, kind) in layout.chars().enumerate() {
        let path = touch(dir, &format!("p{:02}.tif", i + 1));
        book.push(Page::new(0, path, kind == 'b', 300));
    }
    book
}

fn with_covers(mut book: Book, dir: &Path) -> Book {
    book.supplements.cover_front = Some(touch(dir, "front.jpg"));
    book.supplements.cover_back = Some(touch(dir, "back.jpg"));
    book
}

fn labels(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("p{i:02}")).collect()
}

fn leftover_scratch(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with(".bindery-"))
        })
        .collect()
}

// ── DjVu target ──────────────────────────────────────────────────────────

#[tokio::test]
async fn mixed_book_keeps_source_order() {
    let dir = tempfile::tempdir().unwrap();
    let book = book(dir.path(), "bcbbccbcb");
    let fakes = Fakes::new();
    let output = dir.path().join("out/book.djvu");

    let result = bind_with(
        &book,
        &output,
        &BindConfig::default(),
        Toolchain::Djvu(fakes.toolchain()),
    )
    .await
    .unwrap();

    assert_eq!(read_lines(&output), labels(9));
    assert_eq!(result.stats.placed_pages, 9);
    assert_eq!(result.stats.bitonal_pages, 5);
    assert_eq!(result.stats.color_pages, 4);
    assert!(result.warnings.is_empty());
    assert!(result.is_complete());
    assert_eq!(result.format, TargetFormat::Djvu);
}

#[tokio::test]
async fn covers_wrap_the_body() {
    let dir = tempfile::tempdir().unwrap();
    let book = with_covers(book(dir.path(), "cbbc"), dir.path());
    let fakes = Fakes::new();
    let output = dir.path().join("book.djvu");

    let result = bind_with(&book, &output, &BindConfig::default(), Toolchain::Djvu(fakes.toolchain()))
        .await
        .unwrap();

    let mut expected = vec!["front".to_string()];
    expected.extend(labels(4));
    expected.push("back".to_string());
    assert_eq!(read_lines(&output), expected);
    assert_eq!(result.stats.cover_pages, 2);
    assert_eq!(result.plan.front_cover(), Some(1));
    assert_eq!(result.plan.back_cover(), Some(6));
}

#[tokio::test]
async fn covers_alone_make_a_book() {
    let dir = tempfile::tempdir().unwrap();
    let book = with_covers(Book::new(300), dir.path());
    let fakes = Fakes::new();
    let output = dir.path().join("book.djvu");

    bind_with(&book, &output, &BindConfig::default(), Toolchain::Djvu(fakes.toolchain()))
        .await
        .unwrap();

    assert_eq!(read_lines(&output), vec!["front", "back"]);
}

#[tokio::test]
async fn empty_book_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let fakes = Fakes::new();
    let output = dir.path().join("book.djvu");

    let err = bind_with(&Book::new(300), &output, &BindConfig::default(), Toolchain::Djvu(fakes.toolchain()))
        .await
        .unwrap_err();

    assert!(matches!(err, BindError::EmptyBook));
    assert!(!output.exists());
}

#[tokio::test]
async fn split_batches_match_single_call_order() {
    let dir = tempfile::tempdir().unwrap();
    let book = book(dir.path(), &"b".repeat(30));

    let one_call = Fakes::new();
    let whole = dir.path().join("whole.djvu");
    bind_with(&book, &whole, &BindConfig::default(), Toolchain::Djvu(one_call.toolchain()))
        .await
        .unwrap();

    let split = Fakes::new();
    let chunked = dir.path().join("chunked.djvu");
    let config = BindConfig::builder().command_length_limit(256).build().unwrap();
    bind_with(&book, &chunked, &config, Toolchain::Djvu(split.toolchain()))
        .await
        .unwrap();

    assert_eq!(*one_call.batch.calls.lock().unwrap(), vec![30]);
    let calls = split.batch.calls.lock().unwrap().clone();
    assert!(calls.len() > 1, "expected several calls, got {calls:?}");
    assert_eq!(calls.iter().sum::<usize>(), 30);
    assert_eq!(read_lines(&chunked), read_lines(&whole));
    assert_eq!(read_lines(&chunked), labels(30));
}

#[tokio::test]
async fn per_page_bitonal_encoder_appends_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let book = book(dir.path(), "bbcbc");
    let fakes = Fakes::new();
    let mut tools = fakes.toolchain();
    tools.bitonal = Some(BitonalPort::Single(Arc::new(LabelEncoder)));
    let output = dir.path().join("book.djvu");
    let config = BindConfig::builder().concurrency(3).build().unwrap();

    bind_with(&book, &output, &config, Toolchain::Djvu(tools)).await.unwrap();

    assert_eq!(read_lines(&output), labels(5));
}

#[tokio::test]
async fn unknown_encoder_skips_its_class() {
    let dir = tempfile::tempdir().unwrap();
    let book = book(dir.path(), "bcbcb");
    let fakes = Fakes::new();
    let mut tools = fakes.toolchain();
    tools.color = None;
    let config = BindConfig::builder().color_encoder("c45").build().unwrap();
    let output = dir.path().join("book.djvu");

    let result = bind_with(&book, &output, &config, Toolchain::Djvu(tools))
        .await
        .unwrap();

    assert_eq!(read_lines(&output), vec!["p01", "p03", "p05"]);
    assert_eq!(
        result.warnings,
        vec![Degradation::UnsupportedEncoderChoice {
            class: PageClass::Color,
            encoder: "c45".into(),
            pages: 2,
        }]
    );
    assert_eq!(result.stats.skipped_pages, 2);
    assert!(!result.is_complete());
}

#[tokio::test]
async fn title_script_uses_final_positions() {
    let dir = tempfile::tempdir().unwrap();
    let mut book = with_covers(book(dir.path(), "bcb"), dir.path());
    book.pages[1].title = Some("Chapter 1".into());
    let fakes = Fakes::new();
    let output = dir.path().join("book.djvu");

    bind_with(&book, &output, &BindConfig::default(), Toolchain::Djvu(fakes.toolchain()))
        .await
        .unwrap();

    let scripts = fakes.scripts();
    assert_eq!(scripts.len(), 1);
    let titles: Vec<&str> = scripts[0]
        .lines()
        .filter(|l| l.contains("set-page-title"))
        .collect();
    assert_eq!(
        titles,
        vec![
            r#"select 1; set-page-title "cover""#,
            r#"select 3; set-page-title "Chapter 1""#,
            r#"select 5; set-page-title "back cover""#,
        ]
    );
    assert!(scripts[0].ends_with("save\n"));
}

#[tokio::test]
async fn script_carries_metadata_outline_and_ocr() {
    let dir = tempfile::tempdir().unwrap();
    let mut book = book(dir.path(), "cb");
    book.pages[1].text = Some("(page 0 0 100 100 \"hello\")".into());
    let outline = dir.path().join("outline.txt");
    fs::write(&outline, "(bookmarks (\"One\" \"#1\"))").unwrap();
    book.supplements.bookmarks = Some(outline.clone());
    let fakes = Fakes::new();
    let output = dir.path().join("book.djvu");
    let config = BindConfig::builder().title("Notes").ocr(true).build().unwrap();

    bind_with(&book, &output, &config, Toolchain::Djvu(fakes.toolchain()))
        .await
        .unwrap();

    let script = &fakes.scripts()[0];
    let lines: Vec<&str> = script.lines().collect();
    assert!(lines[0].starts_with("set-meta "), "got: {script}");
    assert_eq!(lines[1], format!("set-outline \"{}\"", outline.display()));
    assert!(lines[2].starts_with("select 2; remove-txt; set-txt "), "got: {script}");
}

struct StopAfterFirst {
    stop: StopHandle,
    completed: AtomicUsize,
}

impl BindProgressCallback for StopAfterFirst {
    fn on_page_complete(&self, _position: usize, _total: usize) {
        if self.completed.fetch_add(1, Ordering::SeqCst) == 0 {
            self.stop.stop();
        }
    }
}

#[tokio::test]
async fn stop_handle_cancels_between_pages() {
    let dir = tempfile::tempdir().unwrap();
    let book = book(dir.path(), "cccc");
    let fakes = Fakes::new();
    let stop = StopHandle::new();
    let config = BindConfig::builder()
        .concurrency(1)
        .stop_handle(stop.clone())
        .progress_callback(Arc::new(StopAfterFirst {
            stop,
            completed: AtomicUsize::new(0),
        }))
        .build()
        .unwrap();
    let output = dir.path().join("book.djvu");

    let err = bind_with(&book, &output, &config, Toolchain::Djvu(fakes.toolchain()))
        .await
        .unwrap_err();

    assert!(
        matches!(err, BindError::Cancelled { placed: 1, total: 4 }),
        "got: {err:?}"
    );
    assert!(!output.exists());
    assert!(fakes.scripts().is_empty());
    assert!(leftover_scratch(dir.path()).is_empty());
}

#[tokio::test]
async fn lost_pages_fail_the_run_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let book = book(dir.path(), "bcb");
    let fakes = Fakes::new();
    let mut tools = fakes.toolchain();
    tools.container = Arc::new(LossyContainer);
    let output = dir.path().join("book.djvu");

    let err = bind_with(&book, &output, &BindConfig::default(), Toolchain::Djvu(tools))
        .await
        .unwrap_err();

    assert!(matches!(err, BindError::MergeFailure { .. }), "got: {err:?}");
    assert!(!output.exists());
    assert!(leftover_scratch(dir.path()).is_empty());
}

#[tokio::test]
async fn first_merge_without_container_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let book = book(dir.path(), "bcb");
    let fakes = Fakes::new();
    let mut tools = fakes.toolchain();
    tools.container = Arc::new(NeverCreated);
    let output = dir.path().join("book.djvu");

    let err = bind_with(&book, &output, &BindConfig::default(), Toolchain::Djvu(tools))
        .await
        .unwrap_err();

    assert!(
        matches!(err, BindError::MergeFailure { expected: 2, actual: 0, .. }),
        "got: {err:?}"
    );
    assert!(!output.exists());
    assert!(leftover_scratch(dir.path()).is_empty());
}

#[tokio::test]
async fn short_batch_artifact_fails_before_insert() {
    let dir = tempfile::tempdir().unwrap();
    let book = book(dir.path(), "bbcb");
    let fakes = Fakes::new();
    let mut tools = fakes.toolchain();
    tools.bitonal = Some(BitonalPort::Batch(Arc::new(ShortBatchEncoder)));
    let output = dir.path().join("book.djvu");

    let err = bind_with(&book, &output, &BindConfig::default(), Toolchain::Djvu(tools))
        .await
        .unwrap_err();

    match err {
        BindError::EncodeFailure { tool, detail, .. } => {
            assert_eq!(tool, "short-batch");
            assert!(detail.contains("2 page(s) for 3"), "got: {detail}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!output.exists());
    assert!(fakes.scripts().is_empty());
}

#[tokio::test]
async fn page_order_field_does_not_pick_pages() {
    let dir = tempfile::tempdir().unwrap();
    let fakes = Fakes::new();

    // 1-based orders, as a hand-written manifest might carry.
    let mut one_based = Book::new(300);
    for (i, kind) in "bcb".chars().enumerate() {
        let path = touch(dir.path(), &format!("p{:02}.tif", i + 1));
        one_based.pages.push(Page::new(i + 1, path, kind == 'b', 300));
    }
    let output = dir.path().join("one-based.djvu");
    let result = bind_with(&one_based, &output, &BindConfig::default(), Toolchain::Djvu(fakes.toolchain()))
        .await
        .unwrap();
    assert_eq!(read_lines(&output), labels(3));
    assert_eq!(result.stats.placed_pages, 3);

    // Every page left at order 0.
    let mut repeated = Book::new(300);
    for (i, kind) in "bcbc".chars().enumerate() {
        let path = touch(dir.path(), &format!("p{:02}.tif", i + 1));
        repeated.pages.push(Page::new(0, path, kind == 'b', 300));
    }
    let output = dir.path().join("repeated.djvu");
    bind_with(&repeated, &output, &BindConfig::default(), Toolchain::Djvu(fakes.toolchain()))
        .await
        .unwrap();
    assert_eq!(read_lines(&output), labels(4));
}

#[tokio::test]
async fn zero_concurrency_still_binds() {
    let dir = tempfile::tempdir().unwrap();
    let book = book(dir.path(), "bccb");
    let fakes = Fakes::new();
    let output = dir.path().join("book.djvu");
    let config = BindConfig {
        concurrency: 0,
        ..BindConfig::default()
    };

    let run = bind_with(&book, &output, &config, Toolchain::Djvu(fakes.toolchain()));
    tokio::time::timeout(Duration::from_secs(30), run)
        .await
        .expect("bind stalled")
        .unwrap();

    assert_eq!(read_lines(&output), labels(4));
}

/// Claims a tool no system has.
struct NeedsMissingTool;

impl LayerEncoder for NeedsMissingTool {
    fn name(&self) -> &str {
        "needs-missing"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec!["bindery-test-no-such-tool"]
    }

    fn encode(&self, _source: &Path, _output: &Path, _dpi: u32) -> Result<(), BindError> {
        panic!("encoder must not run when its tool is missing");
    }
}

#[tokio::test]
async fn missing_tool_is_reported_before_encoding() {
    let dir = tempfile::tempdir().unwrap();
    let book = book(dir.path(), "bc");
    let fakes = Fakes::new();
    let mut tools = fakes.toolchain();
    tools.color = Some(Arc::new(NeedsMissingTool));
    let output = dir.path().join("book.djvu");

    let err = bind_with(&book, &output, &BindConfig::default(), Toolchain::Djvu(tools))
        .await
        .unwrap_err();

    match err {
        BindError::MissingDependency { tool } => assert_eq!(tool, "bindery-test-no-such-tool"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(fakes.batch.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_source_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut book = book(dir.path(), "bb");
    book.pages[1].source_path = dir.path().join("gone.tif");
    let fakes = Fakes::new();

    let err = bind_with(
        &book,
        dir.path().join("book.djvu"),
        &BindConfig::default(),
        Toolchain::Djvu(fakes.toolchain()),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, BindError::SourceNotFound { .. }));
}

// ── PDF target ───────────────────────────────────────────────────────────

/// Writes a dictionary and one page stream per source, jbig2enc style.
#[derive(Default)]
struct FakeSymbols {
    calls: AtomicUsize,
}

impl SymbolCoder for FakeSymbols {
    fn name(&self) -> &str {
        "fake-jbig2"
    }

    fn fixed_arg_len(&self, base: &Path) -> usize {
        16 + base.as_os_str().len()
    }

    fn encode_symbols(&self, sources: &[PathBuf], base: &Path) -> Result<SymbolBatch, BindError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let dictionary = base.with_extension("sym");
        fs::write(&dictionary, b"SYMBOLS").map_err(|e| fake_failure("fake-jbig2", e))?;
        let mut pages = Vec::new();
        for (i, source) in sources.iter().enumerate() {
            let page = base.with_extension(format!("{i:04}"));
            fs::write(&page, format!("JB2:{}", label(source))).map_err(|e| fake_failure("fake-jbig2", e))?;
            pages.push(page);
        }
        Ok(SymbolBatch { dictionary, pages })
    }
}

/// Copies the source as the text layer and writes a stand-in codestream.
struct FakeSeparator;

impl LayerSeparator for FakeSeparator {
    fn name(&self) -> &str {
        "fake-separator"
    }

    fn separate(&self, source: &Path, text: &Path, graphics: &Path) -> Result<(), BindError> {
        fs::copy(source, text).map_err(|e| fake_failure("fake-separator", e))?;
        fs::write(graphics, b"JP2-CODESTREAM").map_err(|e| fake_failure("fake-separator", e))
    }
}

fn png(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    image::GrayImage::from_pixel(600, 300, image::Luma([255]))
        .save(&path)
        .unwrap();
    path
}

fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

#[tokio::test]
async fn pdf_collects_layers_into_one_document() {
    let dir = tempfile::tempdir().unwrap();
    let mut book = Book::new(300);
    book.push(Page::new(0, png(dir.path(), "p01.png"), true, 300));
    book.push(Page::new(0, png(dir.path(), "p02.png"), false, 300).with_title("Plate"));
    book.push(Page::new(0, png(dir.path(), "p03.png"), true, 300));
    let symbols = Arc::new(FakeSymbols::default());
    let tools = PdfToolchain {
        symbols: symbols.clone(),
        separator: Arc::new(FakeSeparator),
    };
    let output = dir.path().join("book.pdf");
    let config = BindConfig::builder().title("Scans").build().unwrap();

    let result = bind_with(&book, &output, &config, Toolchain::Pdf(tools))
        .await
        .unwrap();

    let bytes = fs::read(&output).unwrap();
    assert!(bytes.starts_with(b"%PDF-1.5"));
    assert!(bytes.ends_with(b"%%EOF\n"));
    assert_eq!(count(&bytes, b"JB2:"), 3);
    assert_eq!(count(&bytes, b"JP2-CODESTREAM"), 1);
    assert_eq!(count(&bytes, b"SYMBOLS"), 1);
    assert_eq!(symbols.calls.load(Ordering::SeqCst), 1);

    assert_eq!(result.format, TargetFormat::Pdf);
    assert_eq!(result.stats.placed_pages, 3);
    assert_eq!(result.stats.output_bytes, bytes.len() as u64);
    assert!(result.warnings.iter().any(|w| matches!(
        w,
        Degradation::FeatureUnsupported { feature, .. } if feature == "Page titles"
    )));
}

#[tokio::test]
async fn pdf_splits_symbol_coding_by_command_length() {
    let dir = tempfile::tempdir().unwrap();
    let mut book = Book::new(300);
    for i in 1..=12 {
        book.push(Page::new(0, png(dir.path(), &format!("page-with-a-long-name-{i:02}.png")), true, 300));
    }
    let symbols = Arc::new(FakeSymbols::default());
    let tools = PdfToolchain {
        symbols: symbols.clone(),
        separator: Arc::new(FakeSeparator),
    };
    let output = dir.path().join("book.pdf");
    let config = BindConfig::builder().command_length_limit(256).build().unwrap();

    bind_with(&book, &output, &config, Toolchain::Pdf(tools))
        .await
        .unwrap();

    let calls = symbols.calls.load(Ordering::SeqCst);
    assert!(calls > 1, "expected several jbig2 calls, got {calls}");
    let bytes = fs::read(&output).unwrap();
    assert_eq!(count(&bytes, b"SYMBOLS"), calls);
    // Page streams stay in book order across chunks.
    let positions: Vec<usize> = (1..=12)
        .map(|i| {
            let needle = format!("JB2:page-with-a-long-name-{i:02}");
            bytes
                .windows(needle.len())
                .position(|w| w == needle.as_bytes())
                .unwrap()
        })
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}
