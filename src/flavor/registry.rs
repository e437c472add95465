use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::core::FacturXError;

const FLAVORS_YML: &str = include_str!("../../resources/flavors.yml");

static REGISTRY: OnceCell<FlavorRegistry> = OnceCell::new();

/// All known invoice XML standards, loaded once from `resources/flavors.yml`.
#[derive(Debug, Clone, Deserialize)]
pub struct FlavorRegistry {
    default_flavor: String,
    flavors: Vec<FlavorSpec>,
    #[serde(skip)]
    default_index: usize,
}

/// Static description of one invoice XML standard.
#[derive(Debug, Clone, Deserialize)]
pub struct FlavorSpec {
    pub name: String,
    /// Matched against the start of the root element's namespace URI.
    pub namespace_prefix: String,
    pub attachment_filename: String,
    pub attachment_description: String,
    pub default_level: String,
    pub xmp: XmpSpec,
    pub levels: Vec<LevelSpec>,
}

/// Flavor-specific part of the XMP metadata packet.
#[derive(Debug, Clone, Deserialize)]
pub struct XmpSpec {
    /// Resource holding the PDF/A extension schema description.
    pub template: String,
    pub namespace: String,
    pub prefix: String,
    pub document_type: String,
    pub version: String,
}

/// One conformance level of a flavor.
#[derive(Debug, Clone, Deserialize)]
pub struct LevelSpec {
    pub name: String,
    pub urn: String,
    /// Value written to the XMP `ConformanceLevel` property.
    pub conformance: String,
    pub schema: String,
    pub template: String,
}

impl FlavorRegistry {
    /// The process-wide registry.
    pub fn global() -> Result<&'static FlavorRegistry, FacturXError> {
        REGISTRY.get_or_try_init(|| Self::from_yaml(FLAVORS_YML))
    }

    pub fn from_yaml(source: &str) -> Result<Self, FacturXError> {
        let mut registry: FlavorRegistry = serde_yaml::from_str(source)
            .map_err(|e| FacturXError::Resource(format!("flavors.yml: {e}")))?;
        registry.default_index = registry.check()?;
        Ok(registry)
    }

    fn check(&self) -> Result<usize, FacturXError> {
        let default_index = self
            .flavors
            .iter()
            .position(|f| f.name == self.default_flavor)
            .ok_or_else(|| {
                FacturXError::Resource(format!(
                    "default flavor '{}' is not registered",
                    self.default_flavor
                ))
            })?;
        for flavor in &self.flavors {
            if flavor.level(&flavor.default_level).is_none() {
                return Err(FacturXError::Resource(format!(
                    "default level '{}' of flavor '{}' is not registered",
                    flavor.default_level, flavor.name
                )));
            }
        }
        Ok(default_index)
    }

    pub fn flavors(&self) -> &[FlavorSpec] {
        &self.flavors
    }

    pub fn flavor(&self, name: &str) -> Option<&FlavorSpec> {
        self.flavors.iter().find(|f| f.name == name)
    }

    pub fn default_flavor(&self) -> &FlavorSpec {
        &self.flavors[self.default_index]
    }

    /// The flavor whose namespace prefix starts `namespace`.
    pub fn for_namespace(&self, namespace: &str) -> Option<&FlavorSpec> {
        self.flavors
            .iter()
            .find(|f| namespace.starts_with(&f.namespace_prefix))
    }

    /// Canonical attachment filenames of every flavor.
    pub fn attachment_filenames(&self) -> impl Iterator<Item = &str> {
        self.flavors.iter().map(|f| f.attachment_filename.as_str())
    }
}

impl FlavorSpec {
    pub fn level(&self, name: &str) -> Option<&LevelSpec> {
        self.levels.iter().find(|l| l.name == name)
    }
}
