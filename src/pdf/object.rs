//! Objects, values, and dictionary rendering.
//!
//! Dictionary keys are emitted in an order declared per [`ObjKind`], not in
//! insertion order. Keys a kind does not declare follow the declared ones in
//! byte order, so rendering is deterministic whatever order callers set
//! attributes in.

use std::fmt::{self, Write as _};

/// Identifier of an indirect object, unique within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId(pub u32);

impl ObjId {
    /// An indirect reference to this object.
    pub fn reference(self) -> Value {
        Value::Ref(self)
    }
}

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} 0 R", self.0)
    }
}

/// What an object is for. Determines its dictionary key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjKind {
    Catalog,
    Info,
    Outlines,
    PagesTree,
    /// Creator-info dictionary shared by the optional content groups.
    Artwork,
    /// Optional content group (one layer).
    Ocg,
    /// Shared JBIG2 symbol dictionary stream.
    SymbolDictionary,
    /// Image XObject stream.
    Image,
    /// Page content stream.
    Content,
    Resources,
    Page,
}

impl ObjKind {
    /// Declared emission order for this kind's dictionary keys.
    ///
    /// `Length` is last for every stream-bearing kind.
    pub fn key_order(self) -> &'static [&'static str] {
        match self {
            ObjKind::Catalog => &["Type", "Pages", "Outlines", "OCProperties"],
            ObjKind::Info => &[
                "Title",
                "Author",
                "Subject",
                "Creator",
                "Producer",
                "CreationDate",
            ],
            ObjKind::Outlines => &["Type", "Count"],
            ObjKind::PagesTree => &["Type", "Count", "Kids"],
            ObjKind::Artwork => &["Creator", "Subtype", "Feature"],
            ObjKind::Ocg => &["Type", "Name", "Usage"],
            ObjKind::SymbolDictionary => &["Length"],
            ObjKind::Image => &[
                "Type",
                "Subtype",
                "Width",
                "Height",
                "ColorSpace",
                "BitsPerComponent",
                "ImageMask",
                "Interpolate",
                "Filter",
                "DecodeParms",
                "OC",
                "Length",
            ],
            ObjKind::Content => &["Length"],
            ObjKind::Resources => &["ProcSet", "XObject"],
            ObjKind::Page => &["Type", "Parent", "MediaBox", "Contents", "Resources"],
        }
    }

    fn rank(self, key: &str) -> usize {
        let order = self.key_order();
        order.iter().position(|k| *k == key).unwrap_or(order.len())
    }
}

/// A direct value inside a dictionary or array.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Name(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
    /// Text string; rendered literal when ASCII, UTF-16BE hex otherwise.
    Text(String),
    Ref(ObjId),
    Array(Vec<Value>),
    /// Inline dictionary, rendered in the order given.
    Dict(Vec<(String, Value)>),
}

impl Value {
    pub fn name(name: impl Into<String>) -> Self {
        Value::Name(name.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Value::Text(text.into())
    }

    pub fn refs(ids: &[ObjId]) -> Self {
        Value::Array(ids.iter().map(|id| Value::Ref(*id)).collect())
    }

    pub fn dict<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    fn render(&self, out: &mut String) {
        match self {
            Value::Name(n) => render_name(n, out),
            Value::Integer(i) => {
                let _ = write!(out, "{i}");
            }
            Value::Real(r) => out.push_str(&format_real(*r)),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Text(t) => render_text(t, out),
            Value::Ref(id) => {
                let _ = write!(out, "{id}");
            }
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    item.render(out);
                }
                out.push(']');
            }
            Value::Dict(entries) => {
                out.push_str("<<");
                for (key, value) in entries {
                    out.push(' ');
                    render_name(key, out);
                    out.push(' ');
                    value.render(out);
                }
                out.push_str(" >>");
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<ObjId> for Value {
    fn from(v: ObjId) -> Self {
        Value::Ref(v)
    }
}

/// An indirect object before it has been given an id.
///
/// `Length` is never stored: it is derived from the stream bytes at render
/// time, so it cannot disagree with them.
#[derive(Debug, Clone, PartialEq)]
pub struct Obj {
    kind: ObjKind,
    entries: Vec<(String, Value)>,
    stream: Option<Vec<u8>>,
}

impl Obj {
    pub fn new(kind: ObjKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            stream: None,
        }
    }

    /// Set an attribute, replacing any previous value for `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        debug_assert_ne!(key, "Length", "Length is derived from the stream");
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn with_stream(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.stream = Some(bytes.into());
        self
    }

    pub fn kind(&self) -> ObjKind {
        self.kind
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn stream(&self) -> Option<&[u8]> {
        self.stream.as_deref()
    }

    /// Byte count of the stream, which is what `Length` renders as.
    pub fn length(&self) -> Option<usize> {
        self.stream.as_ref().map(Vec::len)
    }

    /// Render the dictionary in declared key order, `Length` included.
    pub(crate) fn render_dictionary(&self) -> String {
        let mut entries: Vec<(&str, Value)> = self
            .entries
            .iter()
            .filter(|(k, _)| k != "Length")
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        if let Some(len) = self.length() {
            entries.push(("Length", Value::from(len)));
        }
        entries.sort_by(|(a, _), (b, _)| {
            self.kind
                .rank(a)
                .cmp(&self.kind.rank(b))
                .then_with(|| a.cmp(b))
        });

        let mut out = String::from("<<\n");
        for (key, value) in entries {
            render_name(key, &mut out);
            out.push(' ');
            value.render(&mut out);
            out.push('\n');
        }
        out.push_str(">>\n");
        out
    }
}

// ── Lexical helpers ──────────────────────────────────────────────────────

fn render_name(name: &str, out: &mut String) {
    out.push('/');
    for b in name.bytes() {
        let regular = b.is_ascii_graphic() && !b"()<>[]{}/%#".contains(&b);
        if regular {
            out.push(b as char);
        } else {
            let _ = write!(out, "#{b:02X}");
        }
    }
}

fn render_text(text: &str, out: &mut String) {
    if text.is_ascii() {
        out.push('(');
        for c in text.chars() {
            match c {
                '\\' | '(' | ')' => {
                    out.push('\\');
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                _ => out.push(c),
            }
        }
        out.push(')');
    } else {
        out.push_str("<FEFF");
        for unit in text.encode_utf16() {
            let _ = write!(out, "{unit:04X}");
        }
        out.push('>');
    }
}

/// Format a real number with at most four decimals and no trailing zeros.
pub fn format_real(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        return format!("{}", v as i64);
    }
    let s = format!("{v:.4}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
