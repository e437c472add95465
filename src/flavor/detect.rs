use std::fmt;

use tracing::info;

use super::fields::FieldTable;
use super::registry::{FlavorRegistry, FlavorSpec, LevelSpec, XmpSpec};
use crate::core::FacturXError;
use crate::xml::XmlDocument;

/// A flavor together with the conformance level in use.
#[derive(Debug, Clone, Copy)]
pub struct Flavor {
    spec: &'static FlavorSpec,
    level: &'static LevelSpec,
}

impl Flavor {
    /// Select an explicit (flavor, level) pair.
    pub fn new(flavor: &str, level: &str) -> Result<Self, FacturXError> {
        let missing = || FacturXError::TemplateMissing {
            flavor: flavor.to_string(),
            level: level.to_string(),
        };
        let spec = FlavorRegistry::global()?.flavor(flavor).ok_or_else(missing)?;
        let level = spec.level(level).ok_or_else(missing)?;
        Ok(Self { spec, level })
    }

    /// Resolve optional hints, falling back to the registry defaults.
    pub fn from_hints(flavor: Option<&str>, level: Option<&str>) -> Result<Self, FacturXError> {
        let registry = FlavorRegistry::global()?;
        let spec = match flavor {
            Some(name) => registry
                .flavor(name)
                .ok_or_else(|| FacturXError::TemplateMissing {
                    flavor: name.to_string(),
                    level: level.unwrap_or_default().to_string(),
                })?,
            None => registry.default_flavor(),
        };
        Self::new(&spec.name, level.unwrap_or(&spec.default_level))
    }

    /// Determine flavor from the root namespace and level from the `version` field.
    pub fn detect(doc: &XmlDocument) -> Result<Self, FacturXError> {
        let namespace = doc.root().namespace().unwrap_or_default();
        let spec = FlavorRegistry::global()?
            .for_namespace(namespace)
            .ok_or_else(|| FacturXError::UnknownFlavor(namespace.to_string()))?;
        info!(flavor = %spec.name, "invoice flavor detected");

        let version = match FieldTable::global()?.path("version", &spec.name)? {
            Some(path) => doc
                .select(path)?
                .first()
                .and_then(|e| e.text())
                .unwrap_or_default(),
            None => String::new(),
        };
        let level = level_from_urn(spec, version.trim())
            .ok_or_else(|| FacturXError::InvalidVersionUrn(version.clone()))?;
        info!(flavor = %spec.name, level = %level.name, "conformance level detected");
        Ok(Self { spec, level })
    }

    pub fn name(&self) -> &'static str {
        &self.spec.name
    }

    pub fn level(&self) -> &'static str {
        &self.level.name
    }

    pub fn attachment_filename(&self) -> &'static str {
        &self.spec.attachment_filename
    }

    pub fn attachment_description(&self) -> &'static str {
        &self.spec.attachment_description
    }

    /// XMP `ConformanceLevel` value, e.g. `EN 16931`.
    pub fn conformance(&self) -> &'static str {
        &self.level.conformance
    }

    pub fn schema_resource(&self) -> &'static str {
        &self.level.schema
    }

    pub fn template_resource(&self) -> &'static str {
        &self.level.template
    }

    pub fn xmp(&self) -> &'static XmpSpec {
        &self.spec.xmp
    }
}

impl PartialEq for Flavor {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name() && self.level() == other.level()
    }
}

impl Eq for Flavor {}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.level())
    }
}

/// Last colon-separated segment of the URN, else the second-to-last.
fn level_from_urn(spec: &'static FlavorSpec, urn: &str) -> Option<&'static LevelSpec> {
    let mut segments = urn.rsplit(':');
    let last = segments.next()?;
    spec.level(last)
        .or_else(|| segments.next().and_then(|s| spec.level(s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> &'static FlavorSpec {
        FlavorRegistry::global().unwrap().flavor(name).unwrap()
    }

    #[test]
    fn level_from_last_segment() {
        let fx = spec("factur-x");
        assert_eq!(level_from_urn(fx, "urn:factur-x.eu:1p0:minimum").unwrap().name, "minimum");
        assert_eq!(
            level_from_urn(fx, "urn:cen.eu:en16931:2017#compliant#urn:factur-x.eu:1p0:basic")
                .unwrap()
                .name,
            "basic"
        );
    }

    #[test]
    fn level_from_second_to_last_segment() {
        let fx = spec("factur-x");
        assert_eq!(level_from_urn(fx, "urn:cen.eu:en16931:2017").unwrap().name, "en16931");
    }

    #[test]
    fn unknown_level() {
        let fx = spec("factur-x");
        assert!(level_from_urn(fx, "urn:cen.eu:xrechnung:2.3").is_none());
        assert!(level_from_urn(fx, "").is_none());
        let zf = spec("zugferd");
        assert!(level_from_urn(zf, "urn:factur-x.eu:1p0:minimum").is_none());
    }

    #[test]
    fn explicit_pair() {
        let flavor = Flavor::new("zugferd", "comfort").unwrap();
        assert_eq!(flavor.attachment_filename(), "ZUGFeRD-invoice.xml");
        assert_eq!(flavor.conformance(), "COMFORT");
        assert_eq!(flavor.to_string(), "zugferd (comfort)");
        assert!(matches!(
            Flavor::new("zugferd", "minimum"),
            Err(FacturXError::TemplateMissing { .. })
        ));
    }

    #[test]
    fn hints_fall_back_to_defaults() {
        let flavor = Flavor::from_hints(None, None).unwrap();
        assert_eq!((flavor.name(), flavor.level()), ("factur-x", "minimum"));
        let flavor = Flavor::from_hints(Some("zugferd"), None).unwrap();
        assert_eq!((flavor.name(), flavor.level()), ("zugferd", "basic"));
    }

    #[test]
    fn detect_rejects_foreign_namespace() {
        let doc = XmlDocument::parse_str(r#"<Invoice xmlns="urn:oasis:names:specification:ubl:schema:xsd:Invoice-2"/>"#)
            .unwrap();
        assert!(matches!(
            Flavor::detect(&doc),
            Err(FacturXError::UnknownFlavor(ns)) if ns.starts_with("urn:oasis")
        ));
    }
}
