//! # facturx
//!
//! Read, edit and write Factur-X and ZUGFeRD hybrid invoices: PDF/A-3
//! documents carrying a structured CII invoice XML as an embedded file.
//!
//! The XML tree is the source of truth. Semantic fields such as `seller` or
//! `issue_date` map to flavor-specific location paths; values are read from
//! and written to the tree in place, and each save serializes it afresh,
//! embeds it with its XMP metadata and updates the PDF document info.
//!
//! ## Quick Start
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use facturx::{ComposeOptions, FacturXError, Invoice, OpenOptions};
//!
//! fn main() -> Result<(), FacturXError> {
//!     // A PDF without embedded XML starts from a blank template.
//!     let options = OpenOptions::new().flavor("factur-x").level("en16931");
//!     let mut invoice = Invoice::open_with("invoice.pdf", &options)?;
//!
//!     invoice.set("seller", "Acme Corp")?;
//!     invoice.set("invoice_number", "INV-042")?;
//!     invoice.set("issue_date", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())?;
//!
//!     if invoice.is_valid() {
//!         invoice.write_pdf("invoice-facturx.pdf", &ComposeOptions::default())?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`core`] | The [`Invoice`] aggregate, field access, errors |
//! | [`flavor`] | Flavor registry, level detection, field table, resources |
//! | [`schema`] | Per-level structural validation of the invoice XML |
//! | [`pdf`] | Attachment extraction, PDF/A-3 composition, XMP, document info |
//! | [`xml`] | Namespace-aware XML tree and location paths |

pub mod core;
pub mod flavor;
pub mod pdf;
pub mod schema;
pub mod xml;

pub use crate::core::*;
pub use crate::flavor::{Flavor, Resources};
pub use crate::pdf::{Attachment, ComposeOptions, HeaderInfo, PdfMetadata};
