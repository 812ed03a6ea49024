//! In-process PDF object-graph writer.
//!
//! The PDF target is not merged page by page like DjVu. Its encoded layers
//! are collected first, then [`book::build_document`] lays them out as an
//! object graph and [`document::Document::serialize`] writes it in one pass,
//! recording each object's byte offset as it goes.
//!
//! ```text
//! PdfBookInput ──▶ build_document ──▶ Document ──▶ serialize ──▶ bytes + xref
//! ```

pub mod book;
pub mod document;
pub mod object;

pub use book::{build_document, DocumentInfo, PdfBookInput, PdfPageInput};
pub use document::{Document, DocumentBuilder, SerializedDocument};
pub use object::{Obj, ObjId, ObjKind, Value};
