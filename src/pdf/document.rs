//! Object arena and byte-exact serialization.
//!
//! A [`DocumentBuilder`] owns the id counter for exactly one document: ids
//! start at 1 and follow creation order, which is also serialization order.
//! The four structural objects are created by [`DocumentBuilder::new`] so they
//! always get the ids in [`CATALOG_ID`], [`INFO_ID`], [`OUTLINES_ID`] and
//! [`PAGES_ID`]. [`DocumentBuilder::finish`] completes the pages tree and
//! yields an immutable [`Document`], which can be serialized any number of
//! times with identical results.
//!
//! Every offset in the cross-reference table is the length of the output
//! buffer at the moment the object header is appended.

use super::object::{Obj, ObjId, ObjKind, Value};
use crate::error::BindError;
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;

pub const CATALOG_ID: ObjId = ObjId(1);
pub const INFO_ID: ObjId = ObjId(2);
pub const OUTLINES_ID: ObjId = ObjId(3);
pub const PAGES_ID: ObjId = ObjId(4);

/// File header. The second line marks the file as binary for transfer tools.
pub const HEADER: &[u8] = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n";

/// Free-list head entry of the cross-reference table.
const XREF_FREE_HEAD: &str = "0000000000 65535 f \n";

/// A document under construction.
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    objects: Vec<Obj>,
    pages: Vec<ObjId>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    /// Start a document with its catalog, info, outlines and pages-tree objects.
    ///
    /// The info dictionary starts empty; set its entries with
    /// [`DocumentBuilder::get_mut`] on [`INFO_ID`].
    pub fn new() -> Self {
        let mut builder = Self {
            objects: Vec::new(),
            pages: Vec::new(),
        };
        builder.add(
            Obj::new(ObjKind::Catalog)
                .with("Type", Value::name("Catalog"))
                .with("Outlines", OUTLINES_ID)
                .with("Pages", PAGES_ID),
        );
        builder.add(Obj::new(ObjKind::Info));
        builder.add(
            Obj::new(ObjKind::Outlines)
                .with("Type", Value::name("Outlines"))
                .with("Count", 0u32),
        );
        builder.add(Obj::new(ObjKind::PagesTree).with("Type", Value::name("Pages")));
        builder
    }

    /// Add an object, returning its id.
    pub fn add(&mut self, obj: Obj) -> ObjId {
        self.objects.push(obj);
        ObjId(self.objects.len() as u32)
    }

    /// Add a page object and record it as a kid of the pages tree.
    pub fn add_page(&mut self, page: Obj) -> ObjId {
        let id = self.add(page);
        self.pages.push(id);
        id
    }

    /// The id the next [`DocumentBuilder::add`] will return.
    pub fn next_id(&self) -> ObjId {
        ObjId(self.objects.len() as u32 + 1)
    }

    pub fn get_mut(&mut self, id: ObjId) -> Option<&mut Obj> {
        let index = (id.0 as usize).checked_sub(1)?;
        self.objects.get_mut(index)
    }

    /// Complete the pages tree with every page added so far.
    pub fn finish(mut self) -> Document {
        let count = self.pages.len();
        let kids = Value::refs(&self.pages);
        if let Some(tree) = self.get_mut(PAGES_ID) {
            tree.set("Count", count);
            tree.set("Kids", kids);
        }
        Document {
            objects: self.objects,
            pages: self.pages,
        }
    }
}

/// A complete object graph, ready to serialize.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    objects: Vec<Obj>,
    pages: Vec<ObjId>,
}

impl Document {
    /// Objects in creation order; the object at index `i` has id `i + 1`.
    pub fn objects(&self) -> &[Obj] {
        &self.objects
    }

    pub fn get(&self, id: ObjId) -> Option<&Obj> {
        let index = (id.0 as usize).checked_sub(1)?;
        self.objects.get(index)
    }

    pub fn page_ids(&self) -> &[ObjId] {
        &self.pages
    }

    /// Render header, objects, cross-reference table and trailer.
    pub fn serialize(&self) -> SerializedDocument {
        let mut out: Vec<u8> = Vec::with_capacity(self.stream_bytes() + 4096);
        out.extend_from_slice(HEADER);

        let mut offsets = Vec::with_capacity(self.objects.len());
        for (index, obj) in self.objects.iter().enumerate() {
            offsets.push(out.len());
            let mut head = format!("{} 0 obj\n", index + 1);
            head.push_str(&obj.render_dictionary());
            out.extend_from_slice(head.as_bytes());
            if let Some(stream) = obj.stream() {
                out.extend_from_slice(b"stream\n");
                out.extend_from_slice(stream);
                out.extend_from_slice(b"\nendstream\n");
            }
            out.extend_from_slice(b"endobj\n");
        }

        let xref_offset = out.len();
        let size = self.objects.len() + 1;
        let mut table = format!("xref\n0 {size}\n{XREF_FREE_HEAD}");
        for offset in &offsets {
            let _ = write!(table, "{offset:010} 00000 n \n");
        }
        let _ = write!(
            table,
            "trailer\n<< /Size {size} /Root {CATALOG_ID} /Info {INFO_ID} >>\nstartxref\n{xref_offset}\n%%EOF\n"
        );
        out.extend_from_slice(table.as_bytes());

        debug!(
            "Serialized {} objects ({} pages) into {} bytes",
            self.objects.len(),
            self.pages.len(),
            out.len()
        );

        SerializedDocument {
            bytes: out,
            offsets,
            xref_offset,
        }
    }

    fn stream_bytes(&self) -> usize {
        self.objects.iter().filter_map(Obj::length).sum()
    }
}

/// Serialized bytes plus the bookkeeping used to produce them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedDocument {
    pub bytes: Vec<u8>,
    /// Byte offset of each object's header; index `i` is object `i + 1`.
    pub offsets: Vec<usize>,
    /// Byte offset of the `xref` keyword.
    pub xref_offset: usize,
}

impl SerializedDocument {
    pub fn write_to(&self, path: &Path) -> Result<(), BindError> {
        std::fs::write(path, &self.bytes).map_err(|e| BindError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_page_document() -> Document {
        let mut builder = DocumentBuilder::new();
        for _ in 0..2 {
            let content = builder.add(Obj::new(ObjKind::Content).with_stream(b"q Q".to_vec()));
            builder.add_page(
                Obj::new(ObjKind::Page)
                    .with("Type", Value::name("Page"))
                    .with("Parent", PAGES_ID)
                    .with("Contents", content),
            );
        }
        builder.finish()
    }

    #[test]
    fn structural_objects_have_fixed_ids() {
        let doc = DocumentBuilder::new().finish();
        assert_eq!(doc.get(CATALOG_ID).unwrap().kind(), ObjKind::Catalog);
        assert_eq!(doc.get(INFO_ID).unwrap().kind(), ObjKind::Info);
        assert_eq!(doc.get(OUTLINES_ID).unwrap().kind(), ObjKind::Outlines);
        assert_eq!(doc.get(PAGES_ID).unwrap().kind(), ObjKind::PagesTree);
    }

    #[test]
    fn ids_restart_per_document() {
        let mut first = DocumentBuilder::new();
        first.add(Obj::new(ObjKind::Content));
        let second = DocumentBuilder::new();
        assert_eq!(second.next_id(), ObjId(5));
    }

    #[test]
    fn finish_fills_pages_tree() {
        let doc = two_page_document();
        let tree = doc.get(PAGES_ID).unwrap();
        assert_eq!(tree.get("Count"), Some(&Value::Integer(2)));
        assert_eq!(tree.get("Kids"), Some(&Value::refs(&[ObjId(6), ObjId(8)])));
    }

    #[test]
    fn offsets_point_at_object_headers() {
        let serialized = two_page_document().serialize();
        assert_eq!(serialized.offsets[0], HEADER.len());
        for (i, &offset) in serialized.offsets.iter().enumerate() {
            let token = format!("{} 0 obj", i + 1);
            assert_eq!(
                &serialized.bytes[offset..offset + token.len()],
                token.as_bytes()
            );
        }
        assert!(serialized.bytes[serialized.xref_offset..].starts_with(b"xref\n0 9\n"));
    }

    #[test]
    fn xref_lines_are_twenty_bytes() {
        let serialized = two_page_document().serialize();
        let tail = &serialized.bytes[serialized.xref_offset..];
        let text = String::from_utf8_lossy(tail);
        let entries: Vec<&str> = text.lines().skip(2).take(9).collect();
        assert_eq!(entries[0], "0000000000 65535 f ");
        for (entry, offset) in entries[1..].iter().zip(&serialized.offsets) {
            assert_eq!(entry.len() + 1, 20);
            assert_eq!(*entry, format!("{offset:010} 00000 n "));
        }
    }

    #[test]
    fn trailer_names_root_and_info() {
        let serialized = two_page_document().serialize();
        let text = String::from_utf8_lossy(&serialized.bytes);
        assert!(text.contains("trailer\n<< /Size 9 /Root 1 0 R /Info 2 0 R >>"));
        assert!(text.ends_with(&format!(
            "startxref\n{}\n%%EOF\n",
            serialized.xref_offset
        )));
    }

    #[test]
    fn serialization_is_deterministic() {
        let doc = two_page_document();
        assert_eq!(doc.serialize(), doc.serialize());
    }
}
