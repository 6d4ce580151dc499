use crate::node::{ChildMutation, NodeRecord, Tag};
use crate::view::NodeView;
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

pub type NodeListener = dyn Fn(&NodeRecord, Option<&NodeView>);
pub type ChildMutationListener = dyn Fn(&ChildMutation);
pub type SubtreeListener = dyn Fn();

/// Identity of one registered listener, unique across all three tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Node,
    ChildMutation,
    Subtree,
}

type Entries<L> = SmallVec<[(ListenerId, Rc<L>); 2]>;

struct Table<L: ?Sized> {
    by_tag: HashMap<Tag, Entries<L>>,
}

impl<L: ?Sized> Table<L> {
    fn new() -> Self {
        Self {
            by_tag: HashMap::new(),
        }
    }

    fn add(&mut self, tag: Tag, id: ListenerId, listener: Rc<L>) {
        self.by_tag.entry(tag).or_default().push((id, listener));
    }

    fn remove(&mut self, tag: Tag, id: ListenerId) -> bool {
        let Some(entries) = self.by_tag.get_mut(&tag) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.by_tag.remove(&tag);
        }
        removed
    }

    fn contains(&self, tag: Tag, id: ListenerId) -> bool {
        self.by_tag
            .get(&tag)
            .is_some_and(|entries| entries.iter().any(|(existing, _)| *existing == id))
    }

    /// Copy of the current entries so callbacks may (un)subscribe freely
    fn snapshot(&self, tag: Tag) -> Entries<L> {
        self.by_tag.get(&tag).cloned().unwrap_or_default()
    }

    fn len(&self) -> usize {
        self.by_tag.values().map(|entries| entries.len()).sum()
    }
}

/// The three subscription tables consulted after a batch
pub struct ListenerTables {
    next_id: Cell<u64>,
    node: RefCell<Table<NodeListener>>,
    child_mutation: RefCell<Table<ChildMutationListener>>,
    subtree: RefCell<Table<SubtreeListener>>,
}

impl ListenerTables {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(0),
            node: RefCell::new(Table::new()),
            child_mutation: RefCell::new(Table::new()),
            subtree: RefCell::new(Table::new()),
        }
    }

    fn allocate_id(&self) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        ListenerId(id)
    }

    pub fn add_node(&self, tag: Tag, listener: Rc<NodeListener>) -> ListenerId {
        let id = self.allocate_id();
        self.node.borrow_mut().add(tag, id, listener);
        id
    }

    pub fn add_child_mutation(&self, tag: Tag, listener: Rc<ChildMutationListener>) -> ListenerId {
        let id = self.allocate_id();
        self.child_mutation.borrow_mut().add(tag, id, listener);
        id
    }

    pub fn add_subtree(&self, tag: Tag, listener: Rc<SubtreeListener>) -> ListenerId {
        let id = self.allocate_id();
        self.subtree.borrow_mut().add(tag, id, listener);
        id
    }

    pub fn remove(&self, granularity: Granularity, tag: Tag, id: ListenerId) -> bool {
        match granularity {
            Granularity::Node => self.node.borrow_mut().remove(tag, id),
            Granularity::ChildMutation => self.child_mutation.borrow_mut().remove(tag, id),
            Granularity::Subtree => self.subtree.borrow_mut().remove(tag, id),
        }
    }

    pub fn is_live(&self, granularity: Granularity, tag: Tag, id: ListenerId) -> bool {
        match granularity {
            Granularity::Node => self.node.borrow().contains(tag, id),
            Granularity::ChildMutation => self.child_mutation.borrow().contains(tag, id),
            Granularity::Subtree => self.subtree.borrow().contains(tag, id),
        }
    }

    pub fn node_listeners(&self, tag: Tag) -> Entries<NodeListener> {
        self.node.borrow().snapshot(tag)
    }

    pub fn child_mutation_listeners(&self, tag: Tag) -> Entries<ChildMutationListener> {
        self.child_mutation.borrow().snapshot(tag)
    }

    pub fn subtree_listeners(&self, tag: Tag) -> Entries<SubtreeListener> {
        self.subtree.borrow().snapshot(tag)
    }

    pub fn len(&self, granularity: Granularity) -> usize {
        match granularity {
            Granularity::Node => self.node.borrow().len(),
            Granularity::ChildMutation => self.child_mutation.borrow().len(),
            Granularity::Subtree => self.subtree.borrow().len(),
        }
    }
}

impl Default for ListenerTables {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ListenerTables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerTables")
            .field("node", &self.len(Granularity::Node))
            .field("child_mutation", &self.len(Granularity::ChildMutation))
            .field("subtree", &self.len(Granularity::Subtree))
            .finish()
    }
}

/// Disposer for one listener.
///
/// Disposing is idempotent and safe from inside any callback. Dropping the
/// handle disposes it; call [`Subscription::detach`] to keep the listener
/// registered for the lifetime of the mirror instead.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    tables: Weak<ListenerTables>,
    granularity: Granularity,
    tag: Tag,
    id: ListenerId,
    active: Cell<bool>,
}

impl Subscription {
    pub(crate) fn new(
        tables: &Rc<ListenerTables>,
        granularity: Granularity,
        tag: Tag,
        id: ListenerId,
    ) -> Self {
        Self {
            tables: Rc::downgrade(tables),
            granularity,
            tag,
            id,
            active: Cell::new(true),
        }
    }

    pub fn dispose(&self) {
        if !self.active.replace(false) {
            return;
        }
        if let Some(tables) = self.tables.upgrade() {
            tables.remove(self.granularity, self.tag, self.id);
        }
    }

    /// Leave the listener registered and give up the handle
    pub fn detach(self) {
        self.active.set(false);
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("granularity", &self.granularity)
            .field("tag", &self.tag)
            .field("id", &self.id)
            .field("active", &self.active.get())
            .finish()
    }
}

/// Run one consumer callback; a panic is logged and does not escape
pub(crate) fn invoke_isolated(kind: &str, tag: Tag, callback: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
        tracing::error!("{} listener for {} panicked; continuing fan-out", kind, tag);
    }
}
