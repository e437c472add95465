use std::path::Path;

use chrono::{DateTime, Utc};
use lopdf::{Document, Object, ObjectId, Stream, StringFormat, dictionary};

use super::info::{pdf_timestamp, text_string};
use crate::core::FacturXError;
use crate::flavor::Flavor;

/// A supplementary file embedded next to the invoice XML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub description: String,
    pub data: Vec<u8>,
    /// Guessed from the filename extension when unset.
    pub mime_type: Option<String>,
    /// Defaults to the composition timestamp.
    pub modified: Option<DateTime<Utc>>,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            description: String::new(),
            data: data.into(),
            mime_type: None,
            modified: None,
        }
    }

    /// Read a file from disk, keeping its name and modification time.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FacturXError> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                FacturXError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("'{}' has no file name", path.display()),
                ))
            })?;
        let modified = std::fs::metadata(path)?
            .modified()
            .ok()
            .map(DateTime::<Utc>::from);
        Ok(Self {
            modified,
            ..Self::new(filename, data)
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }
}

/// Associated-file relationship of an embedded file to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Relationship {
    /// Machine-readable representation of the visible content.
    Data,
    Unspecified,
}

impl Relationship {
    fn as_name(self) -> &'static [u8] {
        match self {
            Self::Data => b"Data",
            Self::Unspecified => b"Unspecified",
        }
    }
}

/// Everything needed to write one embedded file; built per save.
#[derive(Debug, Clone)]
pub(crate) struct AttachmentSpec {
    pub filename: String,
    pub description: String,
    pub subtype: String,
    pub data: Vec<u8>,
    pub checksum: [u8; 16],
    pub modified: DateTime<Utc>,
    pub relationship: Relationship,
}

impl AttachmentSpec {
    pub fn invoice(flavor: &Flavor, xml: Vec<u8>, at: DateTime<Utc>) -> Self {
        Self {
            filename: flavor.attachment_filename().to_string(),
            description: flavor.attachment_description().to_string(),
            subtype: "text/xml".to_string(),
            checksum: md5::compute(&xml).0,
            data: xml,
            modified: at,
            relationship: Relationship::Data,
        }
    }

    pub fn supplementary(attachment: &Attachment, at: DateTime<Utc>) -> Self {
        let subtype = attachment
            .mime_type
            .clone()
            .unwrap_or_else(|| guess_mime_type(&attachment.filename).to_string());
        Self {
            filename: attachment.filename.clone(),
            description: attachment.description.clone(),
            subtype,
            checksum: md5::compute(&attachment.data).0,
            data: attachment.data.clone(),
            modified: attachment.modified.unwrap_or(at),
            relationship: Relationship::Unspecified,
        }
    }

    /// Add the embedded-file stream and its file specification; returns the
    /// file specification id.
    pub fn write(&self, doc: &mut Document) -> ObjectId {
        let stream = Stream::new(
            dictionary! {
                "Type" => "EmbeddedFile",
                // Stored decoded; the writer escapes '/' as #2F.
                "Subtype" => Object::Name(self.subtype.as_bytes().to_vec()),
                "Params" => dictionary! {
                    "CheckSum" => Object::String(self.checksum.to_vec(), StringFormat::Hexadecimal),
                    "ModDate" => Object::string_literal(pdf_timestamp(self.modified)),
                    "Size" => Object::Integer(self.data.len() as i64),
                },
            },
            self.data.clone(),
        );
        let stream_id = doc.add_object(stream);

        doc.add_object(dictionary! {
            "Type" => "Filespec",
            "F" => text_string(&self.filename),
            "UF" => text_string(&self.filename),
            "Desc" => text_string(&self.description),
            "AFRelationship" => Object::Name(self.relationship.as_name().to_vec()),
            "EF" => dictionary! {
                "F" => Object::Reference(stream_id),
                "UF" => Object::Reference(stream_id),
            },
        })
    }
}

/// MIME type for a filename extension, `application/octet-stream` if unknown.
pub fn guess_mime_type(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "xml" => "text/xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "htm" | "html" => "text/html",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "zip" => "application/zip",
        "odt" => "application/vnd.oasis.opendocument.text",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}
