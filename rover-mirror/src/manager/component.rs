use crate::node::Tag;
use std::cell::Cell;

/// Per-node controller whose lifetime follows acquire/release pairs
pub trait ComponentManager {
    fn tag(&self) -> Tag;
    fn parent_tag(&self) -> Option<Tag>;
    fn set_parent_tag(&self, parent: Option<Tag>);

    /// Called once when the last holder releases the manager
    fn on_destroy(&self) {}
}

/// Tag and parent bookkeeping shared by manager implementations
#[derive(Debug)]
pub struct ManagerBase {
    tag: Tag,
    parent: Cell<Option<Tag>>,
}

impl ManagerBase {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            parent: Cell::new(None),
        }
    }

    pub fn with_parent(tag: Tag, parent: Tag) -> Self {
        Self {
            tag,
            parent: Cell::new(Some(parent)),
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn parent_tag(&self) -> Option<Tag> {
        self.parent.get()
    }

    pub fn set_parent_tag(&self, parent: Option<Tag>) {
        self.parent.set(parent);
    }
}

impl ComponentManager for ManagerBase {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn parent_tag(&self) -> Option<Tag> {
        self.parent.get()
    }

    fn set_parent_tag(&self, parent: Option<Tag>) {
        self.parent.set(parent);
    }
}
