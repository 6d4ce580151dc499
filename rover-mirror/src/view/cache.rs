use super::factory::ViewFactoryRegistry;
use super::node_view::{NamingConvention, NodeView};
use crate::node::{NodeRecord, Tag};
use std::collections::HashMap;
use std::rc::Rc;

/// One view per live tag plus the string id index
#[derive(Debug)]
pub struct ViewCache {
    factories: ViewFactoryRegistry,
    naming: NamingConvention,
    by_tag: HashMap<Tag, Rc<NodeView>>,
    by_string_id: HashMap<String, Tag>,
}

impl ViewCache {
    pub fn new(factories: ViewFactoryRegistry, naming: NamingConvention) -> Self {
        Self {
            factories,
            naming,
            by_tag: HashMap::new(),
            by_string_id: HashMap::new(),
        }
    }

    pub fn get(&self, tag: Tag) -> Option<Rc<NodeView>> {
        self.by_tag.get(&tag).cloned()
    }

    pub fn tag_for_string_id(&self, id: &str) -> Option<Tag> {
        self.by_string_id.get(id).copied()
    }

    /// Replace the cached view with one built from `record`
    pub fn rebuild(&mut self, record: Rc<NodeRecord>) -> Rc<NodeView> {
        let tag = record.tag;
        self.unindex(tag);

        let view = Rc::new(self.factories.build(record, &self.naming));
        if let Some(id) = view.string_id() {
            if let Some(previous) = self.by_string_id.insert(id.to_string(), tag) {
                if previous != tag {
                    tracing::debug!("string id '{}' moved from {} to {}", id, previous, tag);
                }
            }
        }
        self.by_tag.insert(tag, Rc::clone(&view));
        view
    }

    pub fn remove(&mut self, tag: Tag) {
        self.unindex(tag);
        self.by_tag.remove(&tag);
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    fn unindex(&mut self, tag: Tag) {
        let Some(old) = self.by_tag.get(&tag) else {
            return;
        };
        if let Some(id) = old.string_id() {
            if self.by_string_id.get(id) == Some(&tag) {
                self.by_string_id.remove(id);
            }
        }
    }
}
