use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::{debug, error};

use super::model::{Content, ElementType, Particle, QName, Schema, SimpleKind};
use crate::core::FacturXError;
use crate::flavor::{Flavor, Resources};
use crate::xml::{Element, Node, XML_NS, XmlDocument};

const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Validate `doc` against the schema registered for `flavor`.
pub fn validate_flavor(
    doc: &XmlDocument,
    flavor: &Flavor,
    resources: &Resources,
) -> Result<(), FacturXError> {
    let loaded;
    let schema = match resources {
        Resources::Embedded => Schema::embedded(flavor.schema_resource())?,
        Resources::Directory(_) => {
            loaded = Schema::load(resources, flavor.schema_resource())?;
            loaded.as_ref()
        }
    };
    let schema = schema.ok_or_else(|| FacturXError::TemplateMissing {
        flavor: flavor.name().to_string(),
        level: flavor.level().to_string(),
    })?;
    match validate(doc, schema) {
        Ok(()) => {
            debug!(%flavor, schema = schema.source(), "XML is valid against its schema");
            Ok(())
        }
        Err(diagnostic) => {
            error!(%flavor, %diagnostic, "XML is invalid against its schema");
            Err(FacturXError::SchemaValidationFailed {
                flavor: flavor.name().to_string(),
                level: flavor.level().to_string(),
                diagnostic,
            })
        }
    }
}

/// Check `doc` against `schema`, returning the first violation found.
pub fn validate(doc: &XmlDocument, schema: &Schema) -> Result<(), String> {
    let root = doc.root();
    if !matches_name(root, &schema.root) {
        return Err(format!(
            "Element '{}': No matching global declaration available for the validation root.",
            root.expanded_name()
        ));
    }
    Validator { schema }.element(root, &schema.root_type)
}

struct Validator<'s> {
    schema: &'s Schema,
}

impl Validator<'_> {
    fn element(&self, element: &Element, type_name: &str) -> Result<(), String> {
        let ty = self
            .schema
            .element_type(type_name)
            .ok_or_else(|| format!("type '{type_name}' is not declared"))?;
        self.attributes(element, ty)?;
        match &ty.content {
            Content::Simple { kind, values } => simple_content(element, *kind, values),
            Content::Elements(particles) => self.sequence(element, particles),
        }
    }

    fn attributes(&self, element: &Element, ty: &ElementType) -> Result<(), String> {
        for attr in element.attributes() {
            if matches!(attr.namespace.as_deref(), Some(XML_NS | XSI_NS)) {
                continue;
            }
            let Some(rule) = ty.attributes.iter().find(|r| r.name == attr.name) else {
                return Err(format!(
                    "Element '{}', attribute '{}': The attribute '{}' is not allowed.",
                    element.expanded_name(),
                    attr.name,
                    attr.name
                ));
            };
            if !rule.values.is_empty() && !rule.values.iter().any(|v| *v == attr.value.trim()) {
                return Err(format!(
                    "Element '{}', attribute '{}': [facet 'enumeration'] The value '{}' is not an element of the set {{{}}}.",
                    element.expanded_name(),
                    attr.name,
                    attr.value,
                    quoted_set(&rule.values)
                ));
            }
        }
        for rule in ty.attributes.iter().filter(|r| r.required) {
            if element.attribute(&rule.name).is_none() {
                return Err(format!(
                    "Element '{}': The attribute '{}' is required but missing.",
                    element.expanded_name(),
                    rule.name
                ));
            }
        }
        Ok(())
    }

    fn sequence(&self, element: &Element, particles: &[Particle]) -> Result<(), String> {
        if let Some(text) = element.text() {
            if !text.trim().is_empty() {
                return Err(format!(
                    "Element '{}': Character content other than whitespace is not allowed because the content type is 'element-only'.",
                    element.expanded_name()
                ));
            }
        }

        let children: Vec<&Element> = element.child_elements().collect();
        let mut next = 0;
        for particle in particles {
            let mut count = 0u32;
            while next < children.len()
                && particle.max.is_none_or(|max| count < max)
                && matches_name(children[next], &particle.name)
            {
                self.element(children[next], &particle.type_name)?;
                count += 1;
                next += 1;
            }
            if count < particle.min {
                return Err(match children.get(next) {
                    Some(child) => format!(
                        "Element '{}': This element is not expected. Expected is ( {} ).",
                        child.expanded_name(),
                        particle.name
                    ),
                    None => format!(
                        "Element '{}': Missing child element(s). Expected is ( {} ).",
                        element.expanded_name(),
                        particle.name
                    ),
                });
            }
        }
        if let Some(extra) = children.get(next) {
            return Err(format!(
                "Element '{}': This element is not expected.",
                extra.expanded_name()
            ));
        }
        Ok(())
    }
}

fn simple_content(element: &Element, kind: SimpleKind, values: &[String]) -> Result<(), String> {
    if element
        .children()
        .iter()
        .any(|n| matches!(n, Node::Element(_)))
    {
        return Err(format!(
            "Element '{}': Element content is not allowed, because the content type is a simple type definition.",
            element.expanded_name()
        ));
    }
    let text = element.text().unwrap_or_default();
    let value = text.trim();
    match kind {
        SimpleKind::String | SimpleKind::Token => Ok(()),
        SimpleKind::Decimal => {
            let lexical_ok = !value.is_empty()
                && value
                    .chars()
                    .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'));
            if lexical_ok && Decimal::from_str(value).is_ok() {
                Ok(())
            } else {
                Err(format!(
                    "Element '{}': '{}' is not a valid value of the atomic type '{}'.",
                    element.expanded_name(),
                    value,
                    kind
                ))
            }
        }
        SimpleKind::Code => {
            if values.iter().any(|v| v == value) {
                Ok(())
            } else {
                Err(format!(
                    "Element '{}': [facet 'enumeration'] The value '{}' is not an element of the set {{{}}}.",
                    element.expanded_name(),
                    value,
                    quoted_set(values)
                ))
            }
        }
    }
}

fn matches_name(element: &Element, name: &QName) -> bool {
    element.local_name() == name.local && element.namespace() == Some(name.namespace.as_str())
}

fn quoted_set(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("'{v}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
