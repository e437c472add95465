use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::OnceCell;
use serde::Deserialize;
use tracing::debug;

use crate::core::FacturXError;
use crate::flavor::{FlavorRegistry, Resources};

static EMBEDDED: OnceCell<BTreeMap<&'static str, Schema>> = OnceCell::new();

/// Parent chains longer than this are treated as a cycle.
const MAX_EXTENDS_DEPTH: usize = 8;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaFile {
    #[serde(default)]
    extends: Option<String>,
    #[serde(default)]
    namespaces: BTreeMap<String, String>,
    #[serde(default)]
    root: Option<RootDecl>,
    #[serde(default)]
    types: BTreeMap<String, TypeDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RootDecl {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TypeDecl {
    #[serde(default)]
    sequence: Option<Vec<ParticleDecl>>,
    #[serde(default)]
    content: Option<SimpleKind>,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    attributes: Vec<AttributeRule>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParticleDecl {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default = "one")]
    min: u32,
    #[serde(default)]
    max: Option<MaxOccurs>,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum MaxOccurs {
    Count(u32),
    Keyword(String),
}

/// Lexical space of a simple-content element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimpleKind {
    String,
    Token,
    Decimal,
    Code,
}

impl fmt::Display for SimpleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "xs:string",
            Self::Token => "xs:token",
            Self::Decimal => "xs:decimal",
            Self::Code => "code",
        })
    }
}

/// A declared attribute, optionally restricted to an enumeration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeRule {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Namespace-qualified element name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub namespace: String,
    pub local: String,
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.local)
    }
}

#[derive(Debug, Clone)]
pub struct Particle {
    pub name: QName,
    pub type_name: String,
    pub min: u32,
    /// `None` means unbounded.
    pub max: Option<u32>,
}

#[derive(Debug, Clone)]
pub enum Content {
    /// Ordered child elements; no character data.
    Elements(Vec<Particle>),
    /// Character data only; `values` restricts `Code` content.
    Simple { kind: SimpleKind, values: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct ElementType {
    pub content: Content,
    pub attributes: Vec<AttributeRule>,
}

/// A compiled, self-contained schema for one (flavor, level).
#[derive(Debug, Clone)]
pub struct Schema {
    pub(crate) source: String,
    pub(crate) root: QName,
    pub(crate) root_type: String,
    pub(crate) types: BTreeMap<String, ElementType>,
}

impl Schema {
    /// Load `relative` from `resources`, following `extends` chains.
    ///
    /// Returns `Ok(None)` if the schema file itself does not exist; a missing
    /// parent is a resource error.
    pub fn load(resources: &Resources, relative: &str) -> Result<Option<Self>, FacturXError> {
        let Some(file) = read_file(resources, relative)? else {
            return Ok(None);
        };
        let merged = resolve_extends(resources, relative, file, 0)?;
        compile(relative, merged).map(Some)
    }

    /// Compiled schema of an embedded resource. Every registered level is
    /// compiled on first use and kept for the life of the process.
    pub fn embedded(relative: &str) -> Result<Option<&'static Schema>, FacturXError> {
        let schemas = EMBEDDED.get_or_try_init(|| {
            let mut schemas = BTreeMap::new();
            for flavor in FlavorRegistry::global()?.flavors() {
                for level in &flavor.levels {
                    if let Some(schema) = Self::load(&Resources::Embedded, &level.schema)? {
                        schemas.insert(level.schema.as_str(), schema);
                    }
                }
            }
            debug!(count = schemas.len(), "embedded schemas compiled");
            Ok::<_, FacturXError>(schemas)
        })?;
        Ok(schemas.get(relative))
    }

    /// Compile a standalone schema document (no `extends`).
    pub fn from_yaml(name: &str, source: &str) -> Result<Self, FacturXError> {
        let file = parse_file(name, source)?;
        if file.extends.is_some() {
            return Err(FacturXError::Resource(format!(
                "{name}: 'extends' needs a resource store, use Schema::load"
            )));
        }
        compile(name, file)
    }

    /// Resource path the schema was loaded from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &QName {
        &self.root
    }

    pub(crate) fn element_type(&self, name: &str) -> Option<&ElementType> {
        self.types.get(name)
    }
}

fn parse_file(name: &str, source: &str) -> Result<SchemaFile, FacturXError> {
    serde_yaml::from_str(source).map_err(|e| FacturXError::Resource(format!("{name}: {e}")))
}

fn read_file(resources: &Resources, relative: &str) -> Result<Option<SchemaFile>, FacturXError> {
    match resources.load(relative)? {
        Some(source) => parse_file(relative, &source).map(Some),
        None => Ok(None),
    }
}

fn resolve_extends(
    resources: &Resources,
    relative: &str,
    file: SchemaFile,
    depth: usize,
) -> Result<SchemaFile, FacturXError> {
    let Some(parent_path) = file.extends.clone() else {
        return Ok(file);
    };
    if depth >= MAX_EXTENDS_DEPTH {
        return Err(FacturXError::Resource(format!(
            "{relative}: 'extends' chain is too deep or cyclic"
        )));
    }
    let parent = read_file(resources, &parent_path)?.ok_or_else(|| {
        FacturXError::Resource(format!("{relative}: parent schema '{parent_path}' not found"))
    })?;
    let mut merged = resolve_extends(resources, &parent_path, parent, depth + 1)?;

    merged.namespaces.extend(file.namespaces);
    if file.root.is_some() {
        merged.root = file.root;
    }
    merged.types.extend(file.types);
    merged.extends = None;
    Ok(merged)
}

fn compile(source: &str, file: SchemaFile) -> Result<Schema, FacturXError> {
    let err = |msg: String| FacturXError::Resource(format!("{source}: {msg}"));
    let qname = |name: &str| -> Result<QName, FacturXError> {
        let (prefix, local) = name
            .split_once(':')
            .ok_or_else(|| err(format!("element '{name}' must be prefixed")))?;
        let namespace = file
            .namespaces
            .get(prefix)
            .ok_or_else(|| err(format!("undeclared prefix '{prefix}' in '{name}'")))?;
        Ok(QName {
            namespace: namespace.clone(),
            local: local.to_string(),
        })
    };

    let root_decl = file
        .root
        .clone()
        .ok_or_else(|| err("no root element declared".into()))?;
    let root = qname(&root_decl.name)?;

    let mut types = BTreeMap::new();
    for (type_name, decl) in &file.types {
        let content = match (&decl.sequence, decl.content) {
            (Some(_), Some(_)) => {
                return Err(err(format!(
                    "type '{type_name}' declares both a sequence and simple content"
                )));
            }
            (None, Some(kind)) => {
                if kind == SimpleKind::Code && decl.values.is_empty() {
                    return Err(err(format!("code type '{type_name}' lists no values")));
                }
                Content::Simple {
                    kind,
                    values: decl.values.clone(),
                }
            }
            (sequence, None) => {
                let mut particles = Vec::new();
                for p in sequence.iter().flatten() {
                    let max = match &p.max {
                        None => Some(p.min.max(1)),
                        Some(MaxOccurs::Count(n)) => Some(*n),
                        Some(MaxOccurs::Keyword(k)) if k == "unbounded" => None,
                        Some(MaxOccurs::Keyword(k)) => {
                            return Err(err(format!("invalid max '{k}' for '{}'", p.name)));
                        }
                    };
                    if max.is_some_and(|m| m < p.min || m == 0) {
                        return Err(err(format!("invalid occurrence range for '{}'", p.name)));
                    }
                    particles.push(Particle {
                        name: qname(&p.name)?,
                        type_name: p.type_name.clone(),
                        min: p.min,
                        max,
                    });
                }
                Content::Elements(particles)
            }
        };
        types.insert(
            type_name.clone(),
            ElementType {
                content,
                attributes: decl.attributes.clone(),
            },
        );
    }

    let referenced = std::iter::once(&root_decl.type_name).chain(types.values().flat_map(|t| {
        match &t.content {
            Content::Elements(ps) => ps.iter().map(|p| &p.type_name).collect::<Vec<_>>(),
            Content::Simple { .. } => Vec::new(),
        }
    }));
    for name in referenced {
        if !types.contains_key(name) {
            return Err(err(format!("type '{name}' is referenced but not declared")));
        }
    }

    Ok(Schema {
        source: source.to_string(),
        root,
        root_type: root_decl.type_name,
        types,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_schemas_are_compiled_once() {
        let first = Schema::embedded("schemas/factur-x/basic.yml").unwrap().unwrap();
        let again = Schema::embedded("schemas/factur-x/basic.yml").unwrap().unwrap();
        assert!(std::ptr::eq(first, again));
        assert_eq!(first.source(), "schemas/factur-x/basic.yml");
        assert!(Schema::embedded("schemas/factur-x/comfort.yml").unwrap().is_none());
    }

    #[test]
    fn every_shipped_schema_compiles() {
        let res = Resources::embedded();
        for path in [
            "schemas/factur-x/minimum.yml",
            "schemas/factur-x/basicwl.yml",
            "schemas/factur-x/basic.yml",
            "schemas/factur-x/en16931.yml",
            "schemas/factur-x/extended.yml",
            "schemas/zugferd/basic.yml",
            "schemas/zugferd/comfort.yml",
            "schemas/zugferd/extended.yml",
        ] {
            let schema = Schema::load(&res, path).unwrap().unwrap();
            assert_eq!(schema.source(), path);
        }
    }

    #[test]
    fn extends_overrides_types() {
        let res = Resources::embedded();
        let minimum = Schema::load(&res, "schemas/factur-x/minimum.yml").unwrap().unwrap();
        let basic = Schema::load(&res, "schemas/factur-x/basic.yml").unwrap().unwrap();
        assert!(minimum.element_type("LineItem").is_none());
        assert!(basic.element_type("LineItem").is_some());
        assert_eq!(basic.root().local, "CrossIndustryInvoice");
    }

    #[test]
    fn missing_schema_is_none() {
        let res = Resources::embedded();
        assert!(Schema::load(&res, "schemas/factur-x/nope.yml").unwrap().is_none());
    }

    #[test]
    fn undeclared_type_is_rejected() {
        let yaml = r#"
namespaces: { a: "urn:a" }
root: { name: a:Root, type: Root }
types:
  Root:
    sequence:
      - { name: a:Child, type: Missing }
"#;
        let err = Schema::from_yaml("inline", yaml).unwrap_err();
        assert!(err.to_string().contains("'Missing' is referenced"));
    }

    #[test]
    fn max_keyword() {
        let yaml = r#"
namespaces: { a: "urn:a" }
root: { name: a:Root, type: Root }
types:
  Root:
    sequence:
      - { name: a:Child, type: Leaf, min: 0, max: many }
  Leaf: { content: string }
"#;
        assert!(Schema::from_yaml("inline", yaml).is_err());
    }
}
