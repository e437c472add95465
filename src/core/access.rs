use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{debug, warn};

use super::FacturXError;
use crate::flavor::{FieldTable, Flavor, is_date_field};
use crate::xml::{PathExpr, XmlDocument};

/// UN/CEFACT date format code 102: `YYYYMMDD`.
pub const DATE_FORMAT_102: &str = "%Y%m%d";

/// The value of an abstract invoice field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    /// Stored as format 102 in the XML.
    Date(NaiveDate),
}

impl FieldValue {
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(t) => f.write_str(t),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

/// Field name → stored text (`None` when the path matches nothing).
pub type FieldSnapshot = BTreeMap<String, Option<String>>;

/// Text of the first node matching `field`, `None` when nothing matches.
pub(crate) fn field_text(
    doc: &XmlDocument,
    flavor: &Flavor,
    field: &str,
) -> Result<Option<String>, FacturXError> {
    let Some(path) = FieldTable::global()?.path(field, flavor.name())? else {
        return Ok(None);
    };
    Ok(doc
        .select(path)?
        .first()
        .map(|e| e.text().unwrap_or_default()))
}

pub(crate) fn get_field(
    doc: &XmlDocument,
    flavor: &Flavor,
    field: &str,
) -> Result<Option<FieldValue>, FacturXError> {
    let Some(text) = field_text(doc, flavor, field)? else {
        return Ok(None);
    };
    if !is_date_field(field) {
        return Ok(Some(FieldValue::Text(text)));
    }
    let raw = text.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT_102)
        .map(|d| Some(FieldValue::Date(d)))
        .map_err(|e| FacturXError::InvalidFieldValue {
            field: field.to_string(),
            reason: format!("'{raw}' is not a format 102 date: {e}"),
        })
}

pub(crate) fn set_field(
    doc: &mut XmlDocument,
    flavor: &Flavor,
    field: &str,
    value: FieldValue,
) -> Result<(), FacturXError> {
    let path = FieldTable::global()?
        .path(field, flavor.name())?
        .ok_or_else(|| FacturXError::FieldNotFound(field.to_string()))?;
    let ids = PathExpr::parse(path)?.select(doc)?;
    let id = match ids.as_slice() {
        [] => return Err(FacturXError::FieldNotFound(field.to_string())),
        [id] => id,
        _ => {
            warn!(field, matches = ids.len(), "ambiguous field path, refusing to edit");
            return Err(FacturXError::AmbiguousFieldPath {
                field: field.to_string(),
                matches: ids.len(),
            });
        }
    };

    let (text, is_date) = match (is_date_field(field), value) {
        (true, FieldValue::Date(date)) => (format_102(field, date)?, true),
        (false, FieldValue::Text(text)) => (text, false),
        (true, FieldValue::Text(text)) => {
            return Err(FacturXError::InvalidFieldValue {
                field: field.to_string(),
                reason: format!("expected a date, got text '{text}'"),
            });
        }
        (false, FieldValue::Date(date)) => {
            return Err(FacturXError::InvalidFieldValue {
                field: field.to_string(),
                reason: format!("expected text, got date {date}"),
            });
        }
    };

    let element = doc
        .element_mut(id)
        .ok_or_else(|| FacturXError::FieldNotFound(field.to_string()))?;
    if is_date {
        element.set_attribute("format", "102");
    }
    debug!(field, value = %text, "field set");
    element.set_text(text);
    Ok(())
}

/// Format 102 has room for four-digit years only.
fn format_102(field: &str, date: NaiveDate) -> Result<String, FacturXError> {
    if !(0..=9999).contains(&date.year()) {
        return Err(FacturXError::InvalidFieldValue {
            field: field.to_string(),
            reason: format!("year {} is outside the format 102 range 0000-9999", date.year()),
        });
    }
    Ok(date.format(DATE_FORMAT_102).to_string())
}

/// Required fields that are absent or hold only whitespace.
pub(crate) fn missing_required(
    doc: &XmlDocument,
    flavor: &Flavor,
) -> Result<Vec<&'static str>, FacturXError> {
    let table = FieldTable::global()?;
    let mut missing = Vec::new();
    for field in table.required() {
        let present = field_text(doc, flavor, field)?.is_some_and(|t| !t.trim().is_empty());
        if !present {
            missing.push(field);
        }
    }
    Ok(missing)
}

pub(crate) fn snapshot(doc: &XmlDocument, flavor: &Flavor) -> Result<FieldSnapshot, FacturXError> {
    let table = FieldTable::global()?;
    table
        .names()
        .map(|field| Ok((field.to_string(), field_text(doc, flavor, field)?)))
        .collect()
}
