use chrono::{DateTime, NaiveDate, Utc};
use lopdf::{Dictionary, Object, StringFormat};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Invoice header fields the descriptive PDF metadata is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInfo {
    pub seller: String,
    pub number: String,
    pub date: NaiveDate,
    /// UNTDID 1001 document type code, `381` for credit notes.
    pub doc_type: String,
}

impl HeaderInfo {
    /// `Refund` for credit notes (`381`), `Invoice` otherwise.
    pub fn kind(&self) -> &'static str {
        document_kind(&self.doc_type)
    }
}

pub fn document_kind(doc_type: &str) -> &'static str {
    if doc_type.trim() == "381" {
        "Refund"
    } else {
        "Invoice"
    }
}

/// Descriptive metadata written to both the info dictionary and the XMP packet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PdfMetadata {
    pub author: String,
    pub keywords: String,
    pub title: String,
    pub subject: String,
}

impl PdfMetadata {
    pub fn from_header(header: &HeaderInfo) -> Self {
        let kind = header.kind();
        let meta = Self {
            author: header.seller.clone(),
            keywords: format!("{kind}, Factur-X"),
            title: format!("{}: {kind} {}", header.seller, header.number),
            subject: format!(
                "Factur-X {kind} {} dated {} issued by {}",
                header.number,
                header.date.format("%Y-%m-%d"),
                header.seller
            ),
        };
        debug!(?meta, "PDF metadata derived from invoice header");
        meta
    }

    /// Caller-supplied metadata. Missing keys and non-string values become `""`.
    pub fn from_override(values: &Map<String, Value>) -> Self {
        let text = |key: &str| match values.get(key) {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };
        Self {
            author: text("author"),
            keywords: text("keywords"),
            title: text("title"),
            subject: text("subject"),
        }
    }
}

/// PDF date string, e.g. `D:20240501120000+00'00'`.
pub fn pdf_timestamp(at: DateTime<Utc>) -> String {
    at.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}

/// XMP date, e.g. `2024-05-01T12:00:00+00:00`.
pub fn xmp_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S+00:00").to_string()
}

/// PDF text string: a literal for ASCII, UTF-16BE with BOM otherwise.
pub(crate) fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::string_literal(value);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Inverse of [`text_string`]; PDFDocEncoding is approximated by Latin-1.
pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

pub(crate) fn info_dictionary(
    meta: &PdfMetadata,
    creator: &str,
    producer: &str,
    at: DateTime<Utc>,
) -> Dictionary {
    let date = pdf_timestamp(at);
    let mut info = Dictionary::new();
    info.set("Author", text_string(&meta.author));
    info.set("CreationDate", Object::string_literal(date.clone()));
    info.set("Creator", text_string(creator));
    info.set("Keywords", text_string(&meta.keywords));
    info.set("ModDate", Object::string_literal(date));
    info.set("Producer", text_string(producer));
    info.set("Subject", text_string(&meta.subject));
    info.set("Title", text_string(&meta.title));
    info
}
