//! Declarative per-level schemas and the validator that checks invoice XML
//! against them.
//!
//! Schemas are YAML documents under `resources/schemas/<flavor>/<level>.yml`:
//! named element types with ordered child sequences (`min` / `max`
//! occurrences), simple content (`string`, `token`, `decimal`, `code` with
//! `values`) and attribute rules. A level may `extends` another level's
//! schema and redefine individual types.

mod model;
mod validate;

pub use model::{AttributeRule, QName, Schema, SimpleKind};
pub use validate::{validate, validate_flavor};
