use thiserror::Error;

/// Errors raised while loading, editing, validating or writing an invoice.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FacturXError {
    /// The input is not a readable PDF container.
    #[error("unrecognized PDF container: {0}")]
    UnrecognizedContainer(String),

    /// The root namespace of the XML matches no registered flavor.
    #[error("could not detect invoice flavor from root namespace '{0}'")]
    UnknownFlavor(String),

    /// The guideline identifier names no known level of the detected flavor.
    #[error("invalid version URN: '{0}'")]
    InvalidVersionUrn(String),

    /// The XML does not conform to the schema of its flavor and level.
    #[error("the {flavor} ({level}) XML is not valid against its schema: {diagnostic}")]
    SchemaValidationFailed {
        flavor: String,
        level: String,
        diagnostic: String,
    },

    /// The field name is not part of the field table.
    #[error("unknown field '{0}'; work on the XML tree directly for unmapped data")]
    UnknownField(String),

    /// The field path matched no node in this document.
    #[error("field '{0}' has no matching node in this document")]
    FieldNotFound(String),

    /// The field path matched several nodes; writes refuse to guess.
    #[error("field '{field}' matches {matches} nodes; refusing to edit")]
    AmbiguousFieldPath { field: String, matches: usize },

    /// No template or schema resource exists for the requested flavor and level.
    #[error("no template resource for flavor '{flavor}' level '{level}'")]
    TemplateMissing { flavor: String, level: String },

    /// Descriptive PDF metadata could not be derived from the invoice header.
    #[error("cannot derive PDF metadata: {0}")]
    MetadataIncomplete(String),

    /// A field value has the wrong kind or an unparseable stored form.
    #[error("invalid value for field '{field}': {reason}")]
    InvalidFieldValue { field: String, reason: String },

    /// XML parsing, path evaluation or serialization error.
    #[error("XML error: {0}")]
    Xml(String),

    /// A shipped or user-supplied resource file is malformed.
    #[error("resource error: {0}")]
    Resource(String),

    /// JSON / YAML export error.
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
