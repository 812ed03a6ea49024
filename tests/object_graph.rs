//! Byte-level checks of the serialized PDF object graph.

use bindery::pdf::{build_document, DocumentInfo, PdfBookInput, PdfPageInput};
use chrono::{TimeZone, Utc};

fn input() -> PdfBookInput {
    PdfBookInput {
        info: DocumentInfo {
            title: Some("Field (Notes)".into()),
            author: Some("Ada".into()),
            subject: None,
            created: Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap(),
        },
        symbol_dictionaries: vec![b"dictionary\nwith\nnewlines".to_vec()],
        pages: vec![
            PdfPageInput {
                width: 2550,
                height: 3300,
                dpi: 300,
                textual: vec![0, 1, 2, 255, b'\n', b'e', b'n', b'd'],
                symbol_dictionary: Some(0),
                graphical: None,
            },
            PdfPageInput {
                width: 1275,
                height: 1650,
                dpi: 150,
                textual: b"text mask".to_vec(),
                symbol_dictionary: Some(0),
                graphical: Some(vec![0xFF, 0x4F, 0xFF, 0x51, 0x00]),
            },
        ],
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

#[test]
fn xref_offsets_point_at_object_headers() {
    let doc = build_document(&input());
    let out = doc.serialize();

    assert_eq!(out.offsets.len(), doc.objects().len());
    for (i, &offset) in out.offsets.iter().enumerate() {
        let header = format!("{} 0 obj\n", i + 1);
        assert!(
            out.bytes[offset..].starts_with(header.as_bytes()),
            "object {} not at offset {}",
            i + 1,
            offset
        );
    }
    assert!(out.bytes[out.xref_offset..].starts_with(b"xref\n"));

    let tail = String::from_utf8_lossy(&out.bytes[out.xref_offset..]).into_owned();
    for (i, offset) in out.offsets.iter().enumerate() {
        let entry = format!("{offset:010} 00000 n \n");
        assert!(tail.contains(&entry), "missing xref entry for object {}", i + 1);
    }
    let startxref = tail
        .split("startxref\n")
        .nth(1)
        .and_then(|s| s.lines().next())
        .and_then(|s| s.parse::<usize>().ok());
    assert_eq!(startxref, Some(out.xref_offset));
    assert!(tail.ends_with("%%EOF\n"));
}

#[test]
fn length_matches_stream_bytes() {
    let doc = build_document(&input());
    let out = doc.serialize();

    let mut streams = 0;
    for (obj, &offset) in doc.objects().iter().zip(&out.offsets) {
        let Some(stream) = obj.stream() else {
            continue;
        };
        streams += 1;
        let declared = format!("/Length {}\n", stream.len());
        let body_start = find(&out.bytes, b"stream\n", offset).unwrap() + b"stream\n".len();
        assert!(
            find(&out.bytes[..body_start], declared.as_bytes(), offset).is_some(),
            "object at {offset} does not declare {declared:?}"
        );
        assert_eq!(&out.bytes[body_start..body_start + stream.len()], stream);
        assert!(out.bytes[body_start + stream.len()..].starts_with(b"\nendstream\n"));
    }
    // dictionary + 2 text images + 2 content streams + 1 graphical image
    assert_eq!(streams, 6);
}

#[test]
fn serialization_is_deterministic() {
    let first = build_document(&input()).serialize();
    let second = build_document(&input()).serialize();
    assert_eq!(first, second);
}

#[test]
fn info_dictionary_carries_producer_and_date() {
    let out = build_document(&input()).serialize();
    let text = String::from_utf8_lossy(&out.bytes);
    assert!(text.contains("/Title (Field \\(Notes\\))"));
    assert!(text.contains("/Producer (bindery)"));
    assert!(text.contains("/CreationDate (D:20240309140500Z)"));
    assert!(!text.contains("/Subject"));
}
