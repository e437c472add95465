use lopdf::{Dictionary, Document, Object};
use tracing::{debug, info};

use super::info::decode_text_string;
use crate::core::FacturXError;
use crate::flavor::FlavorRegistry;

/// Name trees deeper than this are not followed.
const MAX_NAME_TREE_DEPTH: usize = 32;

/// An embedded file pulled out of a PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Parse PDF bytes.
pub fn load_pdf(pdf_bytes: &[u8]) -> Result<Document, FacturXError> {
    Document::load_mem(pdf_bytes)
        .map_err(|e| FacturXError::UnrecognizedContainer(format!("failed to load PDF: {e}")))
}

/// Extract the invoice XML from a PDF, `None` when no known attachment exists.
pub fn extract_invoice_xml(pdf_bytes: &[u8]) -> Result<Option<EmbeddedFile>, FacturXError> {
    find_invoice_xml(&load_pdf(pdf_bytes)?)
}

/// Look for an attachment named like any registered flavor's invoice file.
pub fn find_invoice_xml(doc: &Document) -> Result<Option<EmbeddedFile>, FacturXError> {
    let registry = FlavorRegistry::global()?;
    for (name, filespec) in embedded_files(doc) {
        let Some(filespec) = resolve_dict(doc, &filespec) else {
            continue;
        };
        let filename = filespec_name(filespec).unwrap_or_else(|| name.clone());
        let known = registry
            .attachment_filenames()
            .any(|known| known.eq_ignore_ascii_case(&name) || known.eq_ignore_ascii_case(&filename));
        if !known {
            debug!(%name, "skipping unrelated attachment");
            continue;
        }
        if let Some(data) = filespec_data(doc, filespec) {
            info!(%filename, bytes = data.len(), "invoice XML found in PDF");
            return Ok(Some(EmbeddedFile { filename, data }));
        }
    }
    info!("no invoice XML attachment found");
    Ok(None)
}

/// All `(name, file specification)` pairs of the `EmbeddedFiles` name tree.
pub fn embedded_files(doc: &Document) -> Vec<(String, Object)> {
    let mut out = Vec::new();
    let Ok(catalog) = doc.catalog() else {
        return out;
    };
    let tree = catalog
        .get(b"Names")
        .ok()
        .and_then(|names| resolve_dict(doc, names))
        .and_then(|names| names.get(b"EmbeddedFiles").ok())
        .and_then(|tree| resolve_dict(doc, tree));
    if let Some(tree) = tree {
        walk_name_tree(doc, tree, 0, &mut out);
    }
    out
}

fn walk_name_tree(doc: &Document, node: &Dictionary, depth: usize, out: &mut Vec<(String, Object)>) {
    if depth > MAX_NAME_TREE_DEPTH {
        return;
    }
    if let Ok(names) = node.get(b"Names").and_then(|n| resolve(doc, n).as_array()) {
        // [key1 value1 key2 value2 ...]
        for pair in names.chunks_exact(2) {
            if let Object::String(key, _) = resolve(doc, &pair[0]) {
                out.push((decode_text_string(key), pair[1].clone()));
            }
        }
    }
    if let Ok(kids) = node.get(b"Kids").and_then(|k| resolve(doc, k).as_array()) {
        for kid in kids {
            if let Some(kid) = resolve_dict(doc, kid) {
                walk_name_tree(doc, kid, depth + 1, out);
            }
        }
    }
}

/// `UF` is preferred over `F` when both are present.
fn filespec_name(filespec: &Dictionary) -> Option<String> {
    [b"UF".as_slice(), b"F".as_slice()]
        .into_iter()
        .find_map(|key| match filespec.get(key) {
            Ok(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
            _ => None,
        })
}

fn filespec_data(doc: &Document, filespec: &Dictionary) -> Option<Vec<u8>> {
    let ef = resolve_dict(doc, filespec.get(b"EF").ok()?)?;
    let stream_obj = ef.get(b"UF").or_else(|_| ef.get(b"F")).ok()?;
    let stream = resolve(doc, stream_obj).as_stream().ok()?;
    // decompressed_content() fails without a Filter; the raw content is the payload then.
    Some(
        stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone()),
    )
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, obj).as_dict().ok()
}
