use std::collections::BTreeMap;

use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::core::FacturXError;

const FIELDS_YML: &str = include_str!("../../resources/fields.yml");

static FIELDS: OnceCell<FieldTable> = OnceCell::new();

/// Location and required-ness of one abstract invoice field.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDef {
    #[serde(default)]
    pub required: bool,
    /// Flavor name → location path.
    pub paths: BTreeMap<String, String>,
}

/// Abstract field names mapped to per-flavor XML paths.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct FieldTable {
    fields: BTreeMap<String, FieldDef>,
}

impl FieldTable {
    /// The process-wide table loaded from `resources/fields.yml`.
    pub fn global() -> Result<&'static FieldTable, FacturXError> {
        FIELDS.get_or_try_init(|| Self::from_yaml(FIELDS_YML))
    }

    pub fn from_yaml(source: &str) -> Result<Self, FacturXError> {
        serde_yaml::from_str(source)
            .map_err(|e| FacturXError::Resource(format!("fields.yml: {e}")))
    }

    pub fn get(&self, field: &str) -> Result<&FieldDef, FacturXError> {
        self.fields
            .get(field)
            .ok_or_else(|| FacturXError::UnknownField(field.to_string()))
    }

    /// Path of `field` for `flavor`; `None` when the flavor does not map the field.
    pub fn path(&self, field: &str, flavor: &str) -> Result<Option<&str>, FacturXError> {
        Ok(self.get(field)?.paths.get(flavor).map(String::as_str))
    }

    /// Field names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, def)| def.required)
            .map(|(name, _)| name.as_str())
    }
}

/// Fields whose name contains `date` carry format 102 (`YYYYMMDD`) values.
pub fn is_date_field(field: &str) -> bool {
    field.contains("date")
}
