use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::{DateTime, Utc};
use lopdf::{Document, Object, Stream, dictionary};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::attachment::{Attachment, AttachmentSpec};
use super::extract::load_pdf;
use super::graph::ObjectGraph;
use super::info::{PdfMetadata, info_dictionary, text_string};
use super::xmp::XmpPacket;
use crate::core::FacturXError;
use crate::flavor::{Flavor, Resources};

/// Catalog entries carried over from the source document unchanged.
const CARRIED_CATALOG_KEYS: [&[u8]; 3] = [b"Lang", b"MarkInfo", b"ViewerPreferences"];

/// Settings for writing an invoice PDF.
#[derive(Debug, Clone)]
pub struct ComposeOptions {
    metadata_override: Option<Map<String, Value>>,
    attachments: Vec<Attachment>,
    producer: String,
    creator_tool: String,
    timestamp: Option<DateTime<Utc>>,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        let tool = format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        Self {
            metadata_override: None,
            attachments: Vec::new(),
            producer: tool.clone(),
            creator_tool: tool,
            timestamp: None,
        }
    }
}

impl ComposeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use these values instead of deriving title, author, subject and
    /// keywords from the invoice header.
    pub fn metadata_override(mut self, values: Map<String, Value>) -> Self {
        self.metadata_override = Some(values);
        self
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn attachments(mut self, attachments: impl IntoIterator<Item = Attachment>) -> Self {
        self.attachments.extend(attachments);
        self
    }

    pub fn producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }

    pub fn creator_tool(mut self, creator_tool: impl Into<String>) -> Self {
        self.creator_tool = creator_tool.into();
        self
    }

    /// Fix the creation / modification time, e.g. for reproducible output.
    pub fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }

    pub(crate) fn override_values(&self) -> Option<&Map<String, Value>> {
        self.metadata_override.as_ref()
    }
}

/// Everything the composer writes besides the pages of the base PDF.
pub(crate) struct Composition<'a> {
    pub flavor: &'a Flavor,
    pub xml: Vec<u8>,
    pub metadata: &'a PdfMetadata,
    pub options: &'a ComposeOptions,
    pub resources: &'a Resources,
}

/// Build a new PDF from the pages of `base_pdf` with the invoice XML attached.
pub(crate) fn compose(base_pdf: &[u8], job: Composition<'_>) -> Result<Vec<u8>, FacturXError> {
    let source = load_pdf(base_pdf)?;
    let at = job.options.timestamp.unwrap_or_else(Utc::now);
    let mut target = Document::with_version(source.version.clone());

    let pages_id = target.new_object_id();
    let source_catalog = source.catalog().map_err(|e| {
        FacturXError::UnrecognizedContainer(format!("failed to read catalog: {e}"))
    })?;

    let mut graph = ObjectGraph::new(&source, &mut target);
    let page_ids = graph.import_pages(pages_id)?;

    let output_intents: Vec<Object> = match source_catalog.get(b"OutputIntents") {
        Ok(intents) => match graph.import(intents) {
            Object::Array(items) => items,
            other => {
                warn!(?other, "ignoring malformed OutputIntents");
                Vec::new()
            }
        },
        Err(_) => Vec::new(),
    };
    let carried: Vec<(&[u8], Object)> = CARRIED_CATALOG_KEYS
        .iter()
        .filter_map(|&key| source_catalog.get(key).ok().map(|v| (key, graph.import(v))))
        .collect();
    let trailer_id = source.trailer.get(b"ID").ok().map(|id| graph.import(id));
    drop(graph);

    target.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|&id| Object::Reference(id)).collect::<Vec<_>>(),
            "Count" => Object::Integer(page_ids.len() as i64),
        }),
    );

    // Embedded files, keyed and sorted by filename as the name tree requires.
    let mut files = BTreeMap::new();
    let invoice = AttachmentSpec::invoice(job.flavor, job.xml, at);
    files.insert(invoice.filename.clone(), invoice.write(&mut target));
    for attachment in &job.options.attachments {
        let spec = AttachmentSpec::supplementary(attachment, at);
        match files.entry(spec.filename.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(spec.write(&mut target));
            }
            Entry::Occupied(_) => {
                warn!(filename = %spec.filename, "duplicate attachment name, skipped");
            }
        }
    }
    debug!(files = ?files.keys().collect::<Vec<_>>(), "embedded files name tree");

    let mut names = Vec::with_capacity(files.len() * 2);
    let mut associated = Vec::with_capacity(files.len());
    for (filename, filespec_id) in &files {
        names.push(text_string(filename));
        names.push(Object::Reference(*filespec_id));
        associated.push(Object::Reference(*filespec_id));
    }
    let af_id = target.add_object(Object::Array(associated));

    let packet = XmpPacket {
        flavor: job.flavor,
        metadata: job.metadata,
        producer: &job.options.producer,
        creator_tool: &job.options.creator_tool,
        timestamp: at,
    }
    .to_bytes(job.resources)?;
    // PDF/A requires the metadata stream to stay uncompressed.
    let metadata_id = target.add_object(
        Stream::new(dictionary! { "Type" => "Metadata", "Subtype" => "XML" }, packet)
            .with_compression(false),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
        "Names" => dictionary! {
            "EmbeddedFiles" => dictionary! { "Names" => names },
        },
        "AF" => Object::Reference(af_id),
        "Metadata" => Object::Reference(metadata_id),
        "PageMode" => "UseAttachments",
    };
    if !output_intents.is_empty() {
        debug!(count = output_intents.len(), "output intents carried over");
        catalog.set("OutputIntents", Object::Array(output_intents));
    }
    for (key, value) in carried {
        catalog.set(key.to_vec(), value);
    }
    let catalog_id = target.add_object(catalog);
    target.trailer.set("Root", Object::Reference(catalog_id));

    let info = info_dictionary(job.metadata, &job.options.creator_tool, &job.options.producer, at);
    let info_id = target.add_object(info);
    target.trailer.set("Info", Object::Reference(info_id));
    if let Some(id) = trailer_id {
        target.trailer.set("ID", id);
    }

    let mut output = Vec::new();
    target
        .save_to(&mut output)
        .map_err(|e| FacturXError::Io(std::io::Error::other(format!("failed to save PDF: {e}"))))?;
    info!(
        flavor = %job.flavor,
        pages = page_ids.len(),
        attachments = files.len(),
        bytes = output.len(),
        "invoice PDF composed"
    );
    Ok(output)
}
