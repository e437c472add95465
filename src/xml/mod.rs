//! Owned, namespace-aware XML tree used as the single source of truth for
//! the invoice payload, plus the location-path subset used by the field table.

mod path;
mod tree;

pub use path::{NodeId, PathExpr};
pub use tree::{Attribute, Element, MAX_DEPTH, Node, XML_NS, XmlDocument};
