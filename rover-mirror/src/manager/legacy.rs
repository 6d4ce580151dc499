use super::component::ComponentManager;
use crate::node::Tag;
use std::collections::HashMap;
use std::rc::Rc;

/// Managers registered outside reference counting.
///
/// Several may share a tag; lookups return the most recent one.
#[derive(Default)]
pub struct LegacyManagers {
    by_tag: HashMap<Tag, Vec<Rc<dyn ComponentManager>>>,
}

impl LegacyManagers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tag: Tag, manager: Rc<dyn ComponentManager>) {
        self.by_tag.entry(tag).or_default().push(manager);
    }

    /// Remove this exact manager instance. Returns false if it was not registered.
    pub fn unregister(&mut self, tag: Tag, manager: &Rc<dyn ComponentManager>) -> bool {
        let Some(list) = self.by_tag.get_mut(&tag) else {
            return false;
        };
        let Some(position) = list.iter().position(|m| Rc::ptr_eq(m, manager)) else {
            return false;
        };
        list.remove(position);
        if list.is_empty() {
            self.by_tag.remove(&tag);
        }
        true
    }

    pub fn resolve(&self, tag: Tag) -> Option<Rc<dyn ComponentManager>> {
        let list = self.by_tag.get(&tag)?;
        if list.len() > 1 {
            tracing::warn!(
                "{} legacy managers registered for {}; using the latest",
                list.len(),
                tag
            );
        }
        list.last().cloned()
    }

    pub fn len(&self) -> usize {
        self.by_tag.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}
