use std::collections::BTreeSet;
use std::fmt;

use super::tree::{Element, Node, XmlDocument, split_qname};
use crate::core::FacturXError;

/// Position of an element inside an [`XmlDocument`]: child indices from the root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(Vec<usize>);

impl NodeId {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    fn child(&self, index: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(index);
        Self(steps)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Name {
        prefix: Option<String>,
        local: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NameTest,
}

/// Absolute location path over element names.
///
/// Supported grammar: a sequence of `/name` (child) and `//name` (descendant)
/// steps, where `name` is `prefix:local`, `local` or `*`. Prefixes resolve
/// against the namespaces declared on the document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    source: String,
    steps: Vec<Step>,
}

impl PathExpr {
    pub fn parse(expr: &str) -> Result<Self, FacturXError> {
        let invalid = |why: &str| FacturXError::Xml(format!("invalid path '{expr}': {why}"));
        if !expr.starts_with('/') {
            return Err(invalid("only absolute paths are supported"));
        }

        let mut steps = Vec::new();
        let mut rest = expr;
        while !rest.is_empty() {
            let axis = if let Some(r) = rest.strip_prefix("//") {
                rest = r;
                Axis::Descendant
            } else if let Some(r) = rest.strip_prefix('/') {
                rest = r;
                Axis::Child
            } else {
                return Err(invalid("expected '/'"));
            };
            let end = rest.find('/').unwrap_or(rest.len());
            let name = &rest[..end];
            rest = &rest[end..];

            if name.is_empty() {
                return Err(invalid("empty step"));
            }
            if name.contains(['[', ']', '@', '(', ')']) {
                return Err(invalid("predicates, attributes and functions are not supported"));
            }
            let test = if name == "*" {
                NameTest::Any
            } else {
                let (prefix, local) = split_qname(name);
                NameTest::Name {
                    prefix: prefix.map(str::to_string),
                    local: local.to_string(),
                }
            };
            steps.push(Step { axis, test });
        }
        Ok(Self {
            source: expr.to_string(),
            steps,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// All matching elements, in document order.
    pub fn select(&self, doc: &XmlDocument) -> Result<Vec<NodeId>, FacturXError> {
        let namespaces = doc.root_namespaces();
        let mut tests = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            tests.push(self.resolve_test(&step.test, &namespaces)?);
        }

        // `None` stands for the document node above the root element.
        let mut context: Vec<Option<NodeId>> = vec![None];
        for (step, test) in self.steps.iter().zip(&tests) {
            let mut next = BTreeSet::new();
            for position in &context {
                match position {
                    None => {
                        let root = doc.root();
                        if test.matches(root) {
                            next.insert(NodeId::root());
                        }
                        if step.axis == Axis::Descendant {
                            collect_descendants(root, &NodeId::root(), test, &mut next);
                        }
                    }
                    Some(id) => {
                        let Some(element) = element_at(doc.root(), id) else {
                            continue;
                        };
                        match step.axis {
                            Axis::Child => {
                                for (index, child) in element.children().iter().enumerate() {
                                    if let Node::Element(child) = child {
                                        if test.matches(child) {
                                            next.insert(id.child(index));
                                        }
                                    }
                                }
                            }
                            Axis::Descendant => collect_descendants(element, id, test, &mut next),
                        }
                    }
                }
            }
            context = next.into_iter().map(Some).collect();
            if context.is_empty() {
                break;
            }
        }
        Ok(context.into_iter().flatten().collect())
    }

    fn resolve_test(
        &self,
        test: &NameTest,
        namespaces: &[(Option<String>, String)],
    ) -> Result<ResolvedTest, FacturXError> {
        match test {
            NameTest::Any => Ok(ResolvedTest::Any),
            NameTest::Name { prefix: None, local } => Ok(ResolvedTest::Name {
                namespace: None,
                local: local.clone(),
            }),
            NameTest::Name {
                prefix: Some(prefix),
                local,
            } => {
                let uri = namespaces
                    .iter()
                    .find(|(p, _)| p.as_deref() == Some(prefix.as_str()))
                    .map(|(_, uri)| uri.clone())
                    .ok_or_else(|| {
                        FacturXError::Xml(format!(
                            "undefined namespace prefix '{prefix}' in path '{}'",
                            self.source
                        ))
                    })?;
                Ok(ResolvedTest::Name {
                    namespace: Some(uri),
                    local: local.clone(),
                })
            }
        }
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

enum ResolvedTest {
    Any,
    Name {
        namespace: Option<String>,
        local: String,
    },
}

impl ResolvedTest {
    fn matches(&self, element: &Element) -> bool {
        match self {
            Self::Any => true,
            Self::Name { namespace, local } => {
                element.local_name() == local.as_str() && element.namespace() == namespace.as_deref()
            }
        }
    }
}

fn collect_descendants(
    element: &Element,
    id: &NodeId,
    test: &ResolvedTest,
    out: &mut BTreeSet<NodeId>,
) {
    for (index, child) in element.children().iter().enumerate() {
        if let Node::Element(child) = child {
            let child_id = id.child(index);
            if test.matches(child) {
                out.insert(child_id.clone());
            }
            collect_descendants(child, &child_id, test, out);
        }
    }
}

pub(crate) fn element_at<'a>(root: &'a Element, id: &NodeId) -> Option<&'a Element> {
    let mut current = root;
    for &index in &id.0 {
        current = match current.children().get(index) {
            Some(Node::Element(e)) => e,
            _ => return None,
        };
    }
    Some(current)
}

pub(crate) fn element_at_mut<'a>(root: &'a mut Element, id: &NodeId) -> Option<&'a mut Element> {
    let mut current = root;
    for &index in &id.0 {
        current = match current.children_mut().get_mut(index) {
            Some(Node::Element(e)) => e,
            _ => return None,
        };
    }
    Some(current)
}

impl XmlDocument {
    pub fn element(&self, id: &NodeId) -> Option<&Element> {
        element_at(self.root(), id)
    }

    pub fn element_mut(&mut self, id: &NodeId) -> Option<&mut Element> {
        element_at_mut(self.root_mut(), id)
    }

    /// Evaluate `path` and return the matching elements in document order.
    pub fn select(&self, path: &str) -> Result<Vec<&Element>, FacturXError> {
        let expr = PathExpr::parse(path)?;
        Ok(expr
            .select(self)?
            .iter()
            .filter_map(|id| self.element(id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<r:inv xmlns:r="urn:r" xmlns:p="urn:p">
  <r:head><p:ID>1</p:ID></r:head>
  <r:body>
    <p:party><p:Name>Seller</p:Name></p:party>
    <p:party><p:Name>Buyer</p:Name></p:party>
  </r:body>
</r:inv>"#;

    fn doc() -> XmlDocument {
        XmlDocument::parse_str(DOC).unwrap()
    }

    fn texts(doc: &XmlDocument, path: &str) -> Vec<String> {
        doc.select(path)
            .unwrap()
            .into_iter()
            .map(|e| e.text().unwrap_or_default())
            .collect()
    }

    #[test]
    fn absolute_child_path() {
        assert_eq!(texts(&doc(), "/r:inv/r:head/p:ID"), vec!["1"]);
        assert!(texts(&doc(), "/r:head/p:ID").is_empty());
    }

    #[test]
    fn descendant_path_in_document_order() {
        assert_eq!(texts(&doc(), "//p:party/p:Name"), vec!["Seller", "Buyer"]);
        assert_eq!(texts(&doc(), "//p:Name"), vec!["Seller", "Buyer"]);
        assert_eq!(texts(&doc(), "/r:inv//p:ID"), vec!["1"]);
    }

    #[test]
    fn wildcard_step() {
        assert_eq!(texts(&doc(), "/r:inv/*/p:ID"), vec!["1"]);
    }

    #[test]
    fn nested_descendants_are_not_duplicated() {
        assert_eq!(doc().select("//*//p:Name").unwrap().len(), 2);
    }

    #[test]
    fn unknown_prefix_is_an_error() {
        assert!(doc().select("//zz:Name").is_err());
    }

    #[test]
    fn unsupported_syntax() {
        assert!(PathExpr::parse("r:inv").is_err());
        assert!(PathExpr::parse("//p:party[1]").is_err());
        assert!(PathExpr::parse("//p:party/@id").is_err());
        assert!(PathExpr::parse("/a//").is_err());
    }
}
