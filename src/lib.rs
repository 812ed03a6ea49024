//! # bindery
//!
//! Bind scanned page images into a single DjVu or JBIG2-compressed PDF book.
//!
//! ## Why this crate?
//!
//! Scanned books are mostly text with a few plates. Encoding every page the
//! same way wastes space: text pages compress best with a symbol-dictionary
//! coder shared across the whole book, while photographs need a wavelet or
//! separated-layer encoder. This crate splits the book into **bitonal** and
//! **color** pages, drives the right external encoder for each class, and
//! assembles the results so every page still lands at its original position.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Book (pages + covers + metadata)
//!  │
//!  ├─ 1. Plan      final 1-based position of every page and cover
//!  ├─ 2. Check     every tool the plan needs is on PATH
//!  ├─ 3. Encode    minidjvu / cjb2 / csepdjvu / c44 / cpaldjvu  (or jbig2)
//!  ├─ 4. Assemble  djvm -i, strictly in planned order           (or PDF graph)
//!  ├─ 5. Annotate  one djvused script: metadata, outline, titles, OCR
//!  └─ 6. Output    renamed into place only on success
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bindery::{bind, BindConfig, Book};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let book = Book::from_images(&["001.tif", "002.tif", "003.png"], 600)?;
//!     let config = BindConfig::builder().title("Field Notes").build()?;
//!     let output = bind(&book, "field-notes.djvu", &config).await?;
//!     for warning in &output.warnings {
//!         eprintln!("warning: {warning}");
//!     }
//!     eprintln!("{} pages, {} bytes", output.stats.placed_pages, output.stats.output_bytes);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `bindery` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! bindery = { version = "0.3", default-features = false }
//! ```
//!
//! ## External Tools
//!
//! | Target | Class   | Tools |
//! |--------|---------|-------|
//! | DjVu   | bitonal | `minidjvu` (shared dictionary) or `cjb2` |
//! | DjVu   | color   | `csepdjvu` (+ `cjb2`, `ddjvu`, `convert`), `c44` or `cpaldjvu` |
//! | DjVu   | all     | `djvm`, `djvused` |
//! | PDF    | all     | `jbig2`, `convert` (only for color pages) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod bind;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod pdf;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use bind::{bind, bind_sync, bind_with, inspect};
pub use config::{BindConfig, BindConfigBuilder, TargetFormat};
pub use error::{BindError, Degradation};
pub use model::{Book, Page, PageClass, Supplements};
pub use output::{BindOutput, BindStats};
pub use pipeline::plan::PositionPlan;
pub use pipeline::Toolchain;
pub use progress::{BindProgressCallback, NoopProgressCallback, ProgressCallback, StopHandle};
