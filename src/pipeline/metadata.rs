//! Post-assembly script: document metadata, bookmarks, page titles, OCR text.
//!
//! Everything that addresses pages by number runs once, after the last
//! insert, against the numbering in the [`PositionPlan`]. The script is
//! written in `djvused` syntax:
//!
//! ```text
//! set-meta "/tmp/.../meta.txt"
//! set-outline "bookmarks.txt"
//! select 1; set-page-title "cover"
//! select 3; remove-txt; set-txt "/tmp/.../ocr-0003.txt"
//! save
//! ```

use super::plan::{quote, PositionPlan, Slot};
use super::tools::ToolCommand;
use crate::error::BindError;
use crate::model::Book;
use chrono::{DateTime, SecondsFormat, Utc};
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Applies a script to a finished container.
pub trait ScriptTool: Send + Sync {
    fn name(&self) -> &str;

    fn requires(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// # Errors
    /// [`BindError::ScriptFailure`] when the container rejects the script.
    fn apply_script(&self, script: &str, container: &Path) -> Result<(), BindError>;
}

/// Runs scripts with `djvused -f`.
#[derive(Debug, Clone, Default)]
pub struct Djvused;

impl ScriptTool for Djvused {
    fn name(&self) -> &str {
        "djvused"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec!["djvused"]
    }

    fn apply_script(&self, script: &str, container: &Path) -> Result<(), BindError> {
        let failed = |detail: String| BindError::ScriptFailure {
            container: container.to_path_buf(),
            detail,
        };
        let dir = container.parent().unwrap_or_else(|| Path::new("."));
        let mut file = tempfile::Builder::new()
            .prefix(".script-")
            .suffix(".dsed")
            .tempfile_in(dir)
            .map_err(|e| failed(e.to_string()))?;
        file.write_all(script.as_bytes())
            .map_err(|e| failed(e.to_string()))?;

        ToolCommand::new("djvused")
            .arg("-f")
            .arg(file.path())
            .arg(container)
            .run()
            .map_err(|e| failed(e.to_string()))
    }
}

/// Document-level metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub created: DateTime<Utc>,
}

impl DocumentMetadata {
    fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = Vec::new();
        if let Some(title) = &self.title {
            entries.push(("Title", title.clone()));
        }
        if let Some(author) = &self.author {
            entries.push(("Author", author.clone()));
        }
        if let Some(subject) = &self.subject {
            entries.push(("Subject", subject.clone()));
        }
        entries
    }
}

/// Merge configured metadata into an external `key "value"` record.
///
/// Configured title, author and subject replace the record's lines for the
/// same key. `CreationDate` is added unless the record already has one.
pub fn metadata_record(external: Option<&str>, meta: &DocumentMetadata) -> String {
    let ours = meta.entries();
    let key_of = |line: &str| line.split_whitespace().next().map(str::to_string);

    let mut lines: Vec<String> = external
        .unwrap_or("")
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter(|l| {
            key_of(*l).map_or(true, |k| !ours.iter().any(|(ok, _)| ok.eq_ignore_ascii_case(&k)))
        })
        .map(str::to_string)
        .collect();

    for (key, value) in &ours {
        lines.push(format!("{key} {}", quote(value)));
    }
    if !lines
        .iter()
        .any(|l| key_of(l.as_str()).is_some_and(|k| k.eq_ignore_ascii_case("CreationDate")))
    {
        lines.push(format!(
            "CreationDate {}",
            quote(&meta.created.to_rfc3339_opts(SecondsFormat::Secs, true))
        ));
    }

    let mut record = lines.join("\n");
    record.push('\n');
    record
}

/// The complete post-assembly script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostScript {
    directives: Vec<String>,
}

impl PostScript {
    /// Build the script, writing the metadata record and OCR payloads into
    /// `work_dir`.
    pub fn build(
        book: &Book,
        plan: &PositionPlan,
        meta: &DocumentMetadata,
        ocr: bool,
        work_dir: &Path,
    ) -> Result<Self, BindError> {
        let mut directives = Vec::new();

        let external = match &book.supplements.metadata {
            Some(path) => Some(std::fs::read_to_string(path).map_err(|e| BindError::io(path, e))?),
            None => None,
        };
        let meta_path = work_dir.join("meta.txt");
        write(&meta_path, &metadata_record(external.as_deref(), meta))?;
        directives.push(format!("set-meta {}", quote_path(&meta_path)));

        if let Some(bookmarks) = &book.supplements.bookmarks {
            directives.push(format!("set-outline {}", quote_path(bookmarks)));
        }

        directives.extend(plan.title_directives());

        if ocr {
            for planned in plan.pages() {
                let Slot::Body { index, .. } = planned.slot else {
                    continue;
                };
                let Some(text) = book.pages.get(index).and_then(|p| p.text.as_deref()) else {
                    continue;
                };
                let text_path = work_dir.join(format!("ocr-{:04}.txt", planned.position));
                write(&text_path, text)?;
                directives.push(format!(
                    "select {}; remove-txt; set-txt {}",
                    planned.position,
                    quote_path(&text_path)
                ));
            }
        }

        Ok(Self { directives })
    }

    pub fn directives(&self) -> &[String] {
        &self.directives
    }

    /// Script text, one directive per line, ending with `save`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for directive in &self.directives {
            out.push_str(directive);
            out.push('\n');
        }
        out.push_str("save\n");
        out
    }
}

/// Applies the post-assembly script through a [`ScriptTool`].
#[derive(Clone)]
pub struct MetadataInjector {
    tool: Arc<dyn ScriptTool>,
}

impl MetadataInjector {
    pub fn new(tool: Arc<dyn ScriptTool>) -> Self {
        Self { tool }
    }

    pub fn apply(&self, script: &PostScript, container: &Path) -> Result<(), BindError> {
        debug!(
            "Applying {} script directives to '{}'",
            script.directives().len(),
            container.display()
        );
        self.tool.apply_script(&script.render(), container)
    }
}

fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy())
}

fn write(path: &Path, contents: &str) -> Result<(), BindError> {
    std::fs::write(path, contents).map_err(|e| BindError::io(path, e))
}
