//! PDF/A-3 container handling: locating an embedded invoice XML, and
//! composing a new PDF that carries the XML as an associated file together
//! with XMP metadata, output intents and document information.
//!
//! The composer never edits the source document in place. Pages, output
//! intents and a few catalog entries are deep-copied into a fresh object
//! arena, then the attachment objects are added and the whole graph is
//! written out in one pass.

mod attachment;
mod embed;
mod extract;
mod graph;
mod info;
mod xmp;

pub use attachment::{Attachment, guess_mime_type};
pub use embed::ComposeOptions;
pub use extract::{EmbeddedFile, embedded_files, extract_invoice_xml, find_invoice_xml, load_pdf};
pub use info::{HeaderInfo, PdfMetadata, document_kind, pdf_timestamp, xmp_timestamp};

pub(crate) use embed::{Composition, compose};
