//! The invoice aggregate, abstract field access and the error taxonomy.

mod access;
mod error;
mod invoice;

pub use access::{DATE_FORMAT_102, FieldSnapshot, FieldValue};
pub use error::FacturXError;
pub use invoice::{Invoice, OpenOptions, SnapshotFormat};
