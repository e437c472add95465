use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::core::FacturXError;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Parent chains longer than this are treated as a cycle.
const MAX_TREE_DEPTH: usize = 64;

/// Copies objects from a source document into a target document.
///
/// Every source object is imported at most once; the arena in the target
/// assigns fresh ids and all references are rewritten through `map`.
pub(crate) struct ObjectGraph<'a> {
    source: &'a Document,
    target: &'a mut Document,
    map: BTreeMap<ObjectId, ObjectId>,
}

impl<'a> ObjectGraph<'a> {
    pub fn new(source: &'a Document, target: &'a mut Document) -> Self {
        Self {
            source,
            target,
            map: BTreeMap::new(),
        }
    }

    /// Import every page in order under `pages_id`; returns the new page ids.
    pub fn import_pages(&mut self, pages_id: ObjectId) -> Result<Vec<ObjectId>, FacturXError> {
        let source_pages: Vec<ObjectId> = self.source.get_pages().into_values().collect();

        // Reserve ids first so that annotations and destinations pointing at
        // pages resolve to the copies instead of importing the originals.
        let mut new_ids = Vec::with_capacity(source_pages.len());
        for &id in &source_pages {
            let new_id = self.target.new_object_id();
            self.map.insert(id, new_id);
            new_ids.push(new_id);
        }

        for (&source_id, &new_id) in source_pages.iter().zip(&new_ids) {
            let mut page = self
                .source
                .get_dictionary(source_id)
                .map_err(|e| {
                    FacturXError::UnrecognizedContainer(format!("page {source_id:?}: {e}"))
                })?
                .clone();
            for key in INHERITABLE {
                if !page.has(key) {
                    if let Some(value) = self.inherited(&page, key) {
                        page.set(key.to_vec(), value);
                    }
                }
            }
            page.remove(b"Parent");
            let mut page = self.import_dictionary(&page);
            page.set("Parent", Object::Reference(pages_id));
            self.target.objects.insert(new_id, Object::Dictionary(page));
        }
        debug!(pages = new_ids.len(), objects = self.map.len(), "pages imported");
        Ok(new_ids)
    }

    /// Deep-copy `object`, importing everything it references.
    pub fn import(&mut self, object: &Object) -> Object {
        match object {
            Object::Reference(id) => Object::Reference(self.import_id(*id)),
            Object::Array(items) => Object::Array(items.iter().map(|o| self.import(o)).collect()),
            Object::Dictionary(dict) => Object::Dictionary(self.import_dictionary(dict)),
            Object::Stream(stream) => {
                let mut copy = stream.clone();
                copy.dict = self.import_dictionary(&stream.dict);
                Object::Stream(copy)
            }
            other => other.clone(),
        }
    }

    pub fn import_id(&mut self, id: ObjectId) -> ObjectId {
        if let Some(&mapped) = self.map.get(&id) {
            return mapped;
        }
        let new_id = self.target.new_object_id();
        self.map.insert(id, new_id);
        // Dangling references become null, as the PDF reference allows.
        let object = match self.source.get_object(id) {
            Ok(object) => self.import(object),
            Err(_) => Object::Null,
        };
        self.target.objects.insert(new_id, object);
        new_id
    }

    fn import_dictionary(&mut self, dict: &Dictionary) -> Dictionary {
        let mut out = Dictionary::new();
        for (key, value) in dict.iter() {
            out.set(key.clone(), self.import(value));
        }
        out
    }

    /// Look `key` up along the `Parent` chain of a page.
    fn inherited(&self, page: &Dictionary, key: &[u8]) -> Option<Object> {
        let mut node = page;
        for _ in 0..MAX_TREE_DEPTH {
            let parent_id = node.get(b"Parent").ok()?.as_reference().ok()?;
            node = self.source.get_dictionary(parent_id).ok()?;
            if let Ok(value) = node.get(key) {
                return Some(value.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    /// Two pages under an intermediate node that carries MediaBox and Resources.
    fn nested_source() -> Document {
        let mut doc = Document::with_version("1.7");
        let root_pages = doc.new_object_id();
        let mid_pages = doc.new_object_id();
        let font = doc.add_object(dictionary! { "Type" => "Font", "BaseFont" => "Helvetica" });
        let p1 = doc.add_object(dictionary! { "Type" => "Page", "Parent" => Object::Reference(mid_pages) });
        let p2 = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(mid_pages),
            "Rotate" => 90,
            "Annots" => vec![Object::Dictionary(dictionary! { "Subtype" => "Link", "P" => Object::Reference(p1) })],
        });
        doc.objects.insert(
            mid_pages,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Parent" => Object::Reference(root_pages),
                "Kids" => vec![Object::Reference(p1), Object::Reference(p2)],
                "Count" => 2,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => Object::Reference(font) } },
            }),
        );
        doc.objects.insert(
            root_pages,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(mid_pages)],
                "Count" => 2,
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => Object::Reference(root_pages) });
        doc.trailer.set("Root", Object::Reference(catalog));
        doc
    }

    #[test]
    fn pages_are_flattened_with_inherited_attributes() {
        let source = nested_source();
        let mut target = Document::with_version("1.7");
        let pages_id = target.new_object_id();
        let pages = ObjectGraph::new(&source, &mut target).import_pages(pages_id).unwrap();
        assert_eq!(pages.len(), 2);

        for id in &pages {
            let page = target.get_dictionary(*id).unwrap();
            assert_eq!(page.get(b"Parent").unwrap().as_reference().unwrap(), pages_id);
            assert!(page.get(b"MediaBox").is_ok());
            assert!(page.get(b"Resources").is_ok());
        }
        let second = target.get_dictionary(pages[1]).unwrap();
        assert_eq!(second.get(b"Rotate").unwrap().as_i64().unwrap(), 90);
        assert!(target.get_dictionary(pages[0]).unwrap().get(b"Rotate").is_err());
    }

    #[test]
    fn references_to_pages_point_at_copies() {
        let source = nested_source();
        let mut target = Document::with_version("1.7");
        let pages_id = target.new_object_id();
        let pages = ObjectGraph::new(&source, &mut target).import_pages(pages_id).unwrap();

        let second = target.get_dictionary(pages[1]).unwrap();
        let annots = second.get(b"Annots").unwrap().as_array().unwrap();
        let link = annots[0].as_dict().unwrap();
        assert_eq!(link.get(b"P").unwrap().as_reference().unwrap(), pages[0]);
        // Source page tree nodes are not pulled in.
        let page_nodes = target
            .objects
            .values()
            .filter(|o| matches!(o.as_dict(), Ok(d) if d.get(b"Type").and_then(|t| t.as_name()).ok() == Some(b"Pages".as_slice())))
            .count();
        assert_eq!(page_nodes, 0);
    }

    #[test]
    fn shared_objects_are_imported_once() {
        let source = nested_source();
        let mut target = Document::with_version("1.7");
        let pages_id = target.new_object_id();
        let pages = ObjectGraph::new(&source, &mut target).import_pages(pages_id).unwrap();

        let font_ref = |page: ObjectId| {
            let resources = target.get_dictionary(page).unwrap().get(b"Resources").unwrap().as_dict().unwrap();
            let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
            fonts.get(b"F1").unwrap().as_reference().unwrap()
        };
        assert_eq!(font_ref(pages[0]), font_ref(pages[1]));
    }

    #[test]
    fn dangling_reference_becomes_null() {
        let source = Document::with_version("1.7");
        let mut target = Document::with_version("1.7");
        let mut graph = ObjectGraph::new(&source, &mut target);
        let id = graph.import_id((99, 0));
        assert!(matches!(target.get_object(id), Ok(Object::Null)));
    }
}
