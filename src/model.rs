//! Page model: the book being bound, its pages, and its supplements.
//!
//! A [`Book`] is an ordered list of [`Page`]s. Page order is the final body
//! order of the bound document; covers are placed around it afterwards.
//! Pages are built before binding starts and are treated as read-only by the
//! pipeline, which keeps the layer paths it derives in its own bookkeeping.

use crate::error::BindError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default scan resolution used when neither the page nor the book sets one.
pub const DEFAULT_DPI: u32 = 300;

/// The two encoder classes a page can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageClass {
    /// Pure black/white text, encoded by a symbol/dictionary coder.
    Bitonal,
    /// Continuous-tone or mixed content.
    Color,
}

impl fmt::Display for PageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageClass::Bitonal => f.write_str("bitonal"),
            PageClass::Color => f.write_str("color"),
        }
    }
}

/// One scanned page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Position in the source book, 0-based. Only used in messages;
    /// binding always follows the order of [`Book::pages`].
    pub order: usize,
    /// The scanned image.
    pub source_path: PathBuf,
    /// `true` for text-only pages, `false` for mixed content.
    pub bitonal: bool,
    /// Scan resolution in dots per inch.
    pub dpi: u32,
    /// Page title shown by viewers (e.g. "Chapter 1").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Pre-separated text layer, if the scanner already produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_layer_path: Option<PathBuf>,
    /// Pre-separated graphical layer, if the scanner already produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphical_layer_path: Option<PathBuf>,
    /// Pre-computed OCR payload, already in the target's hidden-text syntax.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Page {
    /// Create a page with an explicit class.
    pub fn new(order: usize, source_path: impl Into<PathBuf>, bitonal: bool, dpi: u32) -> Self {
        Self {
            order,
            source_path: source_path.into(),
            bitonal,
            dpi,
            title: None,
            text_layer_path: None,
            graphical_layer_path: None,
            text: None,
        }
    }

    /// Create a page, detecting its class from the pixel content.
    pub fn detect(order: usize, source_path: impl Into<PathBuf>, dpi: u32) -> Result<Self, BindError> {
        let source_path = source_path.into();
        let bitonal = is_bitonal_image(&source_path)?;
        debug!(
            "Page {} ({}) detected as {}",
            order + 1,
            source_path.display(),
            if bitonal { "bitonal" } else { "color" }
        );
        Ok(Self::new(order, source_path, bitonal, dpi))
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// The encoder class this page belongs to.
    pub fn class(&self) -> PageClass {
        if self.bitonal {
            PageClass::Bitonal
        } else {
            PageClass::Color
        }
    }

    /// Title, if set and not blank.
    pub fn display_title(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Optional extras bound around and onto the body pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Supplements {
    /// Image placed before the first body page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_front: Option<PathBuf>,
    /// Image placed after the last body page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_back: Option<PathBuf>,
    /// Externally formatted metadata record (`key "value"` lines).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PathBuf>,
    /// Externally formatted outline (bookmarks) blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmarks: Option<PathBuf>,
}

/// An ordered set of pages plus supplements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub pages: Vec<Page>,
    /// Default resolution, used for covers and the batched bitonal encode.
    pub dpi: u32,
    #[serde(default)]
    pub supplements: Supplements,
}

impl Default for Book {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            dpi: DEFAULT_DPI,
            supplements: Supplements::default(),
        }
    }
}

impl Book {
    pub fn new(dpi: u32) -> Self {
        Self {
            dpi,
            ..Self::default()
        }
    }

    /// Append a page, assigning it the next order number.
    pub fn push(&mut self, mut page: Page) -> &mut Self {
        page.order = self.pages.len();
        self.pages.push(page);
        self
    }

    /// Build a book from image paths, detecting each page's class.
    pub fn from_images<P: AsRef<Path>>(paths: &[P], dpi: u32) -> Result<Self, BindError> {
        let mut book = Book::new(dpi);
        for (order, path) in paths.iter().enumerate() {
            book.pages.push(Page::detect(order, path.as_ref(), dpi)?);
        }
        Ok(book)
    }

    /// Load a JSON book manifest. Relative paths resolve against the
    /// manifest's directory; pages without `bitonal` are detected.
    pub fn from_manifest(path: &Path) -> Result<Self, BindError> {
        let raw = std::fs::read_to_string(path).map_err(|e| BindError::io(path, e))?;
        let manifest: Manifest =
            serde_json::from_str(&raw).map_err(|e| BindError::InvalidManifest {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        manifest.into_book(base)
    }

    /// Count of pages in `class`.
    pub fn count(&self, class: PageClass) -> usize {
        self.pages.iter().filter(|p| p.class() == class).count()
    }

    /// Check that every referenced file exists.
    pub fn validate(&self) -> Result<(), BindError> {
        let supplements = [
            &self.supplements.cover_front,
            &self.supplements.cover_back,
            &self.supplements.metadata,
            &self.supplements.bookmarks,
        ];
        let paths = self
            .pages
            .iter()
            .map(|p| &p.source_path)
            .chain(supplements.into_iter().flatten());
        for path in paths {
            if !path.is_file() {
                return Err(BindError::SourceNotFound { path: path.clone() });
            }
        }
        Ok(())
    }
}

/// Returns `true` when every pixel is pure black or pure white.
pub fn is_bitonal_image(path: &Path) -> Result<bool, BindError> {
    let img = image::open(path).map_err(|e| BindError::InvalidImage {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    Ok(img.to_luma8().pixels().all(|p| p.0[0] == 0 || p.0[0] == 255))
}

// ── Manifest ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    dpi: Option<u32>,
    pages: Vec<ManifestPage>,
    #[serde(default)]
    cover_front: Option<PathBuf>,
    #[serde(default)]
    cover_back: Option<PathBuf>,
    #[serde(default)]
    metadata: Option<PathBuf>,
    #[serde(default)]
    bookmarks: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ManifestPage {
    path: PathBuf,
    #[serde(default)]
    bitonal: Option<bool>,
    #[serde(default)]
    dpi: Option<u32>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl Manifest {
    fn into_book(self, base: &Path) -> Result<Book, BindError> {
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };
        let dpi = self.dpi.unwrap_or(DEFAULT_DPI);
        let mut book = Book::new(dpi);

        for (order, entry) in self.pages.into_iter().enumerate() {
            let path = resolve(entry.path);
            let page_dpi = entry.dpi.unwrap_or(dpi);
            let mut page = match entry.bitonal {
                Some(bitonal) => Page::new(order, path, bitonal, page_dpi),
                None => Page::detect(order, path, page_dpi)?,
            };
            page.title = entry.title;
            page.text = entry.text;
            book.pages.push(page);
        }

        book.supplements = Supplements {
            cover_front: self.cover_front.map(resolve),
            cover_back: self.cover_back.map(resolve),
            metadata: self.metadata.map(resolve),
            bookmarks: self.bookmarks.map(resolve),
        };
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn push_assigns_order() {
        let mut book = Book::new(600);
        book.push(Page::new(99, "a.tif", true, 600))
            .push(Page::new(99, "b.tif", false, 600));
        assert_eq!(book.pages[0].order, 0);
        assert_eq!(book.pages[1].order, 1);
        assert_eq!(book.count(PageClass::Bitonal), 1);
        assert_eq!(book.count(PageClass::Color), 1);
    }

    #[test]
    fn blank_title_is_no_title() {
        let page = Page::new(0, "a.tif", true, 300).with_title("   ");
        assert_eq!(page.display_title(), None);
        let page = Page::new(0, "a.tif", true, 300).with_title("Preface");
        assert_eq!(page.display_title(), Some("Preface"));
    }

    #[test]
    fn detects_bitonal_and_gray_pixels() {
        let dir = tempfile::tempdir().unwrap();

        let mut text = GrayImage::from_pixel(8, 8, Luma([255]));
        text.put_pixel(2, 2, Luma([0]));
        let text_path = dir.path().join("text.png");
        text.save(&text_path).unwrap();

        let mut photo = GrayImage::from_pixel(8, 8, Luma([255]));
        photo.put_pixel(3, 3, Luma([128]));
        let photo_path = dir.path().join("photo.png");
        photo.save(&photo_path).unwrap();

        assert!(is_bitonal_image(&text_path).unwrap());
        assert!(!is_bitonal_image(&photo_path).unwrap());
    }

    #[test]
    fn manifest_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("book.json");
        std::fs::write(
            &manifest,
            r#"{
                "dpi": 400,
                "pages": [
                    {"path": "001.tif", "bitonal": true},
                    {"path": "002.tif", "bitonal": false, "title": "Plate I", "dpi": 300}
                ],
                "cover_front": "front.jpg"
            }"#,
        )
        .unwrap();

        let book = Book::from_manifest(&manifest).unwrap();
        assert_eq!(book.dpi, 400);
        assert_eq!(book.pages.len(), 2);
        assert_eq!(book.pages[0].source_path, dir.path().join("001.tif"));
        assert_eq!(book.pages[0].dpi, 400);
        assert_eq!(book.pages[1].dpi, 300);
        assert_eq!(book.pages[1].order, 1);
        assert_eq!(book.pages[1].display_title(), Some("Plate I"));
        assert_eq!(
            book.supplements.cover_front,
            Some(dir.path().join("front.jpg"))
        );
    }

    #[test]
    fn malformed_manifest_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("book.json");
        std::fs::write(&manifest, "{ not json").unwrap();
        assert!(matches!(
            Book::from_manifest(&manifest),
            Err(BindError::InvalidManifest { .. })
        ));
    }

    #[test]
    fn validate_reports_missing_page() {
        let mut book = Book::new(300);
        book.push(Page::new(0, "/definitely/not/here.tif", true, 300));
        assert!(matches!(
            book.validate(),
            Err(BindError::SourceNotFound { .. })
        ));
    }
}
