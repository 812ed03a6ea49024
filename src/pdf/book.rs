//! Lay out encoded page layers as a JBIG2 PDF object graph.
//!
//! Object creation order after the four structural objects:
//!
//! 1. creator-info plus the "Foreground"/"Background" optional content
//!    groups, only when at least one page has a graphical layer;
//! 2. one stream per JBIG2 symbol dictionary;
//! 3. per bitonal page: text image, content stream, resources, page;
//! 4. per mixed page: graphical image, text mask, content stream,
//!    resources, page.

use super::document::{Document, DocumentBuilder, CATALOG_ID, INFO_ID, PAGES_ID};
use super::object::{format_real, Obj, ObjId, ObjKind, Value};
use chrono::{DateTime, Utc};

/// Producer/creator string written into the info dictionary.
pub const PRODUCER: &str = "bindery";

/// Document-level metadata for the info dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub created: DateTime<Utc>,
}

/// One page's encoded layers.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfPageInput {
    /// Raster width in pixels.
    pub width: u32,
    /// Raster height in pixels.
    pub height: u32,
    pub dpi: u32,
    /// JBIG2 page stream (embedded-stream form, no file header).
    pub textual: Vec<u8>,
    /// Index into [`PdfBookInput::symbol_dictionaries`] this page refers to.
    pub symbol_dictionary: Option<usize>,
    /// JPEG 2000 codestream of the graphical layer, for mixed pages.
    pub graphical: Option<Vec<u8>>,
}

impl PdfPageInput {
    /// Page size in points: `pixels * 72 / dpi`.
    pub fn size_points(&self) -> (f64, f64) {
        let dpi = f64::from(self.dpi.max(1));
        (
            f64::from(self.width) * 72.0 / dpi,
            f64::from(self.height) * 72.0 / dpi,
        )
    }
}

/// Everything needed to build the document.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfBookInput {
    pub info: DocumentInfo,
    pub symbol_dictionaries: Vec<Vec<u8>>,
    pub pages: Vec<PdfPageInput>,
}

struct Layers {
    foreground: ObjId,
    background: ObjId,
}

/// Build the object graph for a book.
pub fn build_document(input: &PdfBookInput) -> Document {
    let mut builder = DocumentBuilder::new();
    fill_info(&mut builder, &input.info);

    let layers = input
        .pages
        .iter()
        .any(|p| p.graphical.is_some())
        .then(|| add_layers(&mut builder));

    let dictionaries: Vec<ObjId> = input
        .symbol_dictionaries
        .iter()
        .map(|bytes| builder.add(Obj::new(ObjKind::SymbolDictionary).with_stream(bytes.clone())))
        .collect();

    for page in &input.pages {
        let globals = page.symbol_dictionary.and_then(|i| dictionaries.get(i).copied());
        match (&page.graphical, &layers) {
            (Some(graphical), Some(layers)) => {
                add_mixed_page(&mut builder, page, graphical, globals, layers)
            }
            _ => add_bitonal_page(&mut builder, page, globals),
        }
    }

    builder.finish()
}

fn fill_info(builder: &mut DocumentBuilder, info: &DocumentInfo) {
    let Some(obj) = builder.get_mut(INFO_ID) else {
        return;
    };
    if let Some(title) = &info.title {
        obj.set("Title", Value::text(title.as_str()));
    }
    if let Some(author) = &info.author {
        obj.set("Author", Value::text(author.as_str()));
    }
    if let Some(subject) = &info.subject {
        obj.set("Subject", Value::text(subject.as_str()));
    }
    obj.set("Creator", Value::text(PRODUCER));
    obj.set("Producer", Value::text(PRODUCER));
    obj.set("CreationDate", Value::text(pdf_date(&info.created)));
}

/// Format a timestamp as a PDF date string.
pub fn pdf_date(at: &DateTime<Utc>) -> String {
    at.format("D:%Y%m%d%H%M%SZ").to_string()
}

fn add_layers(builder: &mut DocumentBuilder) -> Layers {
    let artwork = builder.add(
        Obj::new(ObjKind::Artwork)
            .with("Creator", Value::text(PRODUCER))
            .with("Subtype", Value::name("Artwork"))
            .with("Feature", Value::name("Layers")),
    );
    let usage = || Value::dict([("CreatorInfo", artwork.reference())]);
    let foreground = builder.add(
        Obj::new(ObjKind::Ocg)
            .with("Type", Value::name("OCG"))
            .with("Name", Value::text("Foreground"))
            .with("Usage", usage()),
    );
    let background = builder.add(
        Obj::new(ObjKind::Ocg)
            .with("Type", Value::name("OCG"))
            .with("Name", Value::text("Background"))
            .with("Usage", usage()),
    );

    let groups = Value::refs(&[foreground, background]);
    if let Some(catalog) = builder.get_mut(CATALOG_ID) {
        catalog.set(
            "OCProperties",
            Value::dict([
                ("OCGs", groups.clone()),
                ("D", Value::dict([("Order", groups)])),
            ]),
        );
    }

    Layers {
        foreground,
        background,
    }
}

fn text_image(page: &PdfPageInput, globals: Option<ObjId>, mask: bool) -> Obj {
    let mut obj = Obj::new(ObjKind::Image)
        .with("Type", Value::name("XObject"))
        .with("Subtype", Value::name("Image"))
        .with("Width", page.width)
        .with("Height", page.height)
        .with("BitsPerComponent", 1u32)
        .with("Filter", Value::name("JBIG2Decode"));
    if mask {
        obj.set("ImageMask", true);
    } else {
        obj.set("ColorSpace", Value::name("DeviceGray"));
    }
    if let Some(globals) = globals {
        obj.set(
            "DecodeParms",
            Value::dict([("JBIG2Globals", globals.reference())]),
        );
    }
    obj.with_stream(page.textual.clone())
}

/// Content stream that scales the unit square to the full page once per image.
fn placement(page: &PdfPageInput, images: &[&str]) -> Vec<u8> {
    let (w, h) = page.size_points();
    let (w, h) = (format_real(w), format_real(h));
    images
        .iter()
        .map(|name| format!("q {w} 0 0 {h} 0 0 cm /{name} Do Q"))
        .collect::<Vec<_>>()
        .join("\n")
        .into_bytes()
}

fn page_object(page: &PdfPageInput, contents: ObjId, resources: ObjId) -> Obj {
    let (w, h) = page.size_points();
    Obj::new(ObjKind::Page)
        .with("Type", Value::name("Page"))
        .with("Parent", PAGES_ID)
        .with(
            "MediaBox",
            Value::Array(vec![0u32.into(), 0u32.into(), w.into(), h.into()]),
        )
        .with("Contents", contents)
        .with("Resources", resources)
}

fn add_bitonal_page(builder: &mut DocumentBuilder, page: &PdfPageInput, globals: Option<ObjId>) {
    let image = builder.add(text_image(page, globals, false));
    let contents = builder.add(Obj::new(ObjKind::Content).with_stream(placement(page, &["Im1"])));
    let resources = builder.add(
        Obj::new(ObjKind::Resources)
            .with(
                "ProcSet",
                Value::Array(vec![Value::name("PDF"), Value::name("ImageB")]),
            )
            .with("XObject", Value::dict([("Im1", image.reference())])),
    );
    builder.add_page(page_object(page, contents, resources));
}

fn add_mixed_page(
    builder: &mut DocumentBuilder,
    page: &PdfPageInput,
    graphical: &[u8],
    globals: Option<ObjId>,
    layers: &Layers,
) {
    let background = builder.add(
        Obj::new(ObjKind::Image)
            .with("Type", Value::name("XObject"))
            .with("Subtype", Value::name("Image"))
            .with("Width", page.width)
            .with("Height", page.height)
            .with("Interpolate", true)
            .with("Filter", Value::name("JPXDecode"))
            .with("OC", layers.background)
            .with_stream(graphical.to_vec()),
    );
    let mut mask = text_image(page, globals, true);
    mask.set("OC", layers.foreground);
    let foreground = builder.add(mask);

    let contents =
        builder.add(Obj::new(ObjKind::Content).with_stream(placement(page, &["Im0", "Im1"])));
    let resources = builder.add(
        Obj::new(ObjKind::Resources)
            .with(
                "ProcSet",
                Value::Array(vec![
                    Value::name("PDF"),
                    Value::name("ImageB"),
                    Value::name("ImageC"),
                ]),
            )
            .with(
                "XObject",
                Value::dict([
                    ("Im0", background.reference()),
                    ("Im1", foreground.reference()),
                ]),
            ),
    );
    builder.add_page(page_object(page, contents, resources));
}
