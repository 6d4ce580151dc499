use super::listeners::{
    ChildMutationListener, Granularity, ListenerId, ListenerTables, NodeListener,
    Subscription, SubtreeListener, invoke_isolated,
};
use super::overlay::AnimatedOverlay;
use crate::config::MirrorConfig;
use crate::error::{MirrorError, MutationError, Result};
use crate::node::{
    ChildMutation, ChildMutationKind, LayoutMetrics, Mutation, NodeRecord, NodeSpec, NodeStore,
    NodeUpdate, Point, Props, ROOT_VIEW_TYPE, StructuralIssue, Tag,
};
use crate::view::{NamingConvention, NodeView, ViewCache, ViewFactoryRegistry};
use serde_json::Value;
use smallvec::{SmallVec, smallvec};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

/// Receives opaque state updates addressed to a node
pub trait StateSync {
    fn set_state(&self, tag: Tag, state: &Value);
}

impl<F> StateSync for F
where
    F: Fn(Tag, &Value),
{
    fn set_state(&self, tag: Tag, state: &Value) {
        self(tag, state)
    }
}

/// Outcome of one `apply_mutations` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub applied: usize,
    pub skipped: usize,
    /// Tags whose per-node listeners the batch addressed, in first-touch order
    pub changed: Vec<Tag>,
}

/// Insertion-ordered set of tags
#[derive(Debug, Default)]
struct TagSet {
    order: Vec<Tag>,
    seen: HashSet<Tag>,
}

impl TagSet {
    fn push(&mut self, tag: Tag) {
        if self.seen.insert(tag) {
            self.order.push(tag);
        }
    }

    fn extend(&mut self, tags: impl IntoIterator<Item = Tag>) {
        for tag in tags {
            self.push(tag);
        }
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn take(&mut self) -> Vec<Tag> {
        self.seen.clear();
        std::mem::take(&mut self.order)
    }
}

/// Notifications held back while delivery is suspended
#[derive(Debug)]
struct DeliveryState {
    foreground: bool,
    pending_tags: TagSet,
    pending_deltas: Vec<(Tag, ChildMutation)>,
}

/// What a single applied mutation touched
#[derive(Debug, Default)]
struct Applied {
    changed: SmallVec<[Tag; 3]>,
    touched: SmallVec<[Tag; 3]>,
    delta: Option<(Tag, ChildMutation)>,
}

/// In-memory mirror of the native tree.
///
/// Every entry point takes `&self`; listeners may call back into the engine
/// because no internal borrow is held while consumer code runs.
pub struct MirrorEngine {
    config: MirrorConfig,
    store: RefCell<NodeStore>,
    views: RefCell<ViewCache>,
    overlay: RefCell<AnimatedOverlay>,
    listeners: Rc<ListenerTables>,
    delivery: RefCell<DeliveryState>,
    should_update_ui: Box<dyn Fn() -> bool>,
    state_sync: Option<Box<dyn StateSync>>,
}

impl MirrorEngine {
    pub fn new(config: MirrorConfig) -> Self {
        let naming = NamingConvention::new(&*config.string_id_prop, &*config.hint_prefix);
        let overlay = AnimatedOverlay::new(config.props_routed_keys.clone());

        Self {
            store: RefCell::new(NodeStore::new()),
            views: RefCell::new(ViewCache::new(ViewFactoryRegistry::new(), naming)),
            overlay: RefCell::new(overlay),
            listeners: Rc::new(ListenerTables::new()),
            delivery: RefCell::new(DeliveryState {
                foreground: true,
                pending_tags: TagSet::default(),
                pending_deltas: Vec::new(),
            }),
            should_update_ui: Box::new(|| true),
            state_sync: None,
            config,
        }
    }

    pub fn with_view_factories(self, factories: ViewFactoryRegistry) -> Self {
        let naming = NamingConvention::new(
            &*self.config.string_id_prop,
            &*self.config.hint_prefix,
        );
        self.views.replace(ViewCache::new(factories, naming));
        self
    }

    /// Extra gate consulted before any listener delivery
    pub fn with_should_update_ui(mut self, predicate: impl Fn() -> bool + 'static) -> Self {
        self.should_update_ui = Box::new(predicate);
        self
    }

    pub fn with_state_sync(mut self, sink: impl StateSync + 'static) -> Self {
        self.state_sync = Some(Box::new(sink));
        self
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    // Lookups

    pub fn record(&self, tag: Tag) -> Option<Rc<NodeRecord>> {
        self.store.borrow().get_rc(tag)
    }

    pub fn view(&self, tag: Tag) -> Option<Rc<NodeView>> {
        self.views.borrow().get(tag)
    }

    pub fn view_by_string_id(&self, id: &str) -> Option<Rc<NodeView>> {
        let views = self.views.borrow();
        let tag = views.tag_for_string_id(id)?;
        views.get(tag)
    }

    pub fn record_by_string_id(&self, id: &str) -> Option<Rc<NodeRecord>> {
        let tag = self.views.borrow().tag_for_string_id(id)?;
        self.record(tag)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.store.borrow().contains(tag)
    }

    pub fn len(&self) -> usize {
        self.store.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.borrow().is_empty()
    }

    /// Live tags in ascending order
    pub fn tags(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self.store.borrow().tags().collect();
        tags.sort_unstable();
        tags
    }

    /// Ancestor chain, root first, ending at `tag`
    pub fn lineage(&self, tag: Tag) -> Vec<Rc<NodeRecord>> {
        self.store.borrow().lineage(tag)
    }

    /// Offset of `tag` inside `ancestor`, summing frame origins below it.
    /// `None` when `ancestor` is not on the chain.
    pub fn position_relative_to(&self, tag: Tag, ancestor: Tag) -> Option<Point> {
        let chain = self.lineage(tag);
        let start = chain.iter().position(|record| record.tag == ancestor)?;

        let mut position = Point::default();
        for record in &chain[start + 1..] {
            let origin = record.layout_metrics.frame.origin;
            position.x += origin.x;
            position.y += origin.y;
        }
        Some(position)
    }

    pub fn validate(&self) -> Vec<StructuralIssue> {
        self.store.borrow().validate()
    }

    pub fn animated_props(&self, tag: Tag) -> Option<Props> {
        self.overlay.borrow().get(tag).cloned()
    }

    // Subscriptions

    pub fn subscribe_to_node(
        &self,
        tag: Tag,
        listener: impl Fn(&NodeRecord, Option<&NodeView>) + 'static,
    ) -> Subscription {
        let listener: Rc<NodeListener> = Rc::new(listener);
        let id = self.listeners.add_node(tag, listener);
        Subscription::new(&self.listeners, Granularity::Node, tag, id)
    }

    pub fn subscribe_to_child_mutations(
        &self,
        tag: Tag,
        listener: impl Fn(&ChildMutation) + 'static,
    ) -> Subscription {
        let listener: Rc<ChildMutationListener> = Rc::new(listener);
        let id = self.listeners.add_child_mutation(tag, listener);
        Subscription::new(&self.listeners, Granularity::ChildMutation, tag, id)
    }

    /// Fires once per fan-out when `tag` or any descendant changes
    pub fn subscribe_to_subtree(&self, tag: Tag, listener: impl Fn() + 'static) -> Subscription {
        let listener: Rc<SubtreeListener> = Rc::new(listener);
        let id = self.listeners.add_subtree(tag, listener);
        Subscription::new(&self.listeners, Granularity::Subtree, tag, id)
    }

    // Roots

    pub fn create_root(&self, tag: Tag, layout_metrics: LayoutMetrics) -> Result<()> {
        let record = {
            let mut store = self.store.borrow_mut();
            if store.contains(tag) {
                return Err(MirrorError::DuplicateTag(tag));
            }
            store.insert(
                NodeSpec::new(tag, ROOT_VIEW_TYPE)
                    .with_layout(layout_metrics)
                    .into_record(),
            );
            store.get_rc(tag)
        };
        if let Some(record) = record {
            self.views.borrow_mut().rebuild(record);
        }
        debug!("created root {}", tag);
        Ok(())
    }

    pub fn delete_root(&self, tag: Tag) -> Result<()> {
        {
            let mut store = self.store.borrow_mut();
            let record = store.get(tag).ok_or(MirrorError::UnknownTag(tag))?;
            if !record.is_root() {
                return Err(MirrorError::NotARoot(tag));
            }
            if !record.children_tags.is_empty() {
                return Err(MirrorError::RootHasChildren {
                    tag,
                    children: record.children_tags.len(),
                });
            }
            store.remove(tag);
        }
        self.overlay.borrow_mut().clear(tag);
        self.views.borrow_mut().remove(tag);
        debug!("deleted root {}", tag);
        Ok(())
    }

    // Mutations

    /// Apply one commit's edits in order and fan out notifications.
    ///
    /// Anomalous mutations are logged and skipped; the rest of the batch
    /// still applies.
    pub fn apply_mutations(&self, batch: &[Mutation]) -> BatchReport {
        let mut report = BatchReport::default();
        let mut changed = TagSet::default();

        for mutation in batch {
            match self.apply_one(mutation) {
                Ok(applied) => {
                    report.applied += 1;
                    changed.extend(applied.changed);
                    // Views must match records before structural listeners re-query.
                    self.refresh_views(applied.touched);
                    if let Some((parent, delta)) = applied.delta {
                        self.emit_child_mutation(parent, delta);
                    }
                }
                Err(err) => {
                    report.skipped += 1;
                    warn!("skipping {}: {}", mutation.kind_name(), err);
                }
            }
        }

        report.changed = changed.take();
        debug!(
            "applied batch: {} applied, {} skipped, {} changed",
            report.applied,
            report.skipped,
            report.changed.len()
        );
        self.deliver(report.changed.clone());
        report
    }

    fn apply_one(&self, mutation: &Mutation) -> std::result::Result<Applied, MutationError> {
        match mutation {
            Mutation::Create { descriptor } => self.apply_create(descriptor),
            Mutation::Insert {
                parent_tag,
                child_tag,
                index,
            } => self.apply_insert(*parent_tag, *child_tag, *index),
            Mutation::Update { descriptor } => self.apply_update(descriptor),
            Mutation::Remove {
                parent_tag,
                child_tag,
                index,
            } => self.apply_remove(*parent_tag, *child_tag, *index),
            Mutation::Delete { tag } => self.apply_delete(*tag),
            Mutation::RemoveDeleteTree { .. } => Ok(Applied::default()),
        }
    }

    fn apply_create(&self, spec: &NodeSpec) -> std::result::Result<Applied, MutationError> {
        let mut store = self.store.borrow_mut();
        if store.contains(spec.tag) {
            return Err(MutationError::AlreadyLive(spec.tag));
        }
        store.insert(spec.clone().into_record());

        Ok(Applied {
            touched: smallvec![spec.tag],
            ..Applied::default()
        })
    }

    fn apply_insert(
        &self,
        parent: Tag,
        child: Tag,
        index: usize,
    ) -> std::result::Result<Applied, MutationError> {
        let mut store = self.store.borrow_mut();
        if !store.contains(parent) {
            return Err(MutationError::MissingParent {
                op: "INSERT",
                parent,
            });
        }
        let child_record = store.get(child).ok_or(MutationError::MissingChild {
            op: "INSERT",
            child,
        })?;
        if child_record.is_root() {
            return Err(MutationError::RootAsChild(child));
        }
        if store.lineage(parent).iter().any(|record| record.tag == child) {
            return Err(MutationError::WouldCycle { parent, child });
        }

        let mut applied = Applied {
            changed: smallvec![parent, child],
            touched: smallvec![parent, child],
            delta: None,
        };

        if let Some(previous) = child_record.parent_tag {
            if let Some(old_parent) = store.get_mut(previous) {
                if let Some(position) = old_parent.child_index(child) {
                    old_parent.children_tags.remove(position);
                    if previous != parent {
                        warn!(
                            "{} was still linked under {}; moving to {}",
                            child, previous, parent
                        );
                        applied.changed.push(previous);
                        applied.touched.push(previous);
                    }
                }
            }
        }

        let Some(parent_record) = store.get_mut(parent) else {
            return Err(MutationError::MissingParent {
                op: "INSERT",
                parent,
            });
        };
        let at = index.min(parent_record.children_tags.len());
        if at != index {
            debug!("clamped insert index {} to {} under {}", index, at, parent);
        }
        parent_record.children_tags.insert(at, child);

        if let Some(child_record) = store.get_mut(child) {
            child_record.parent_tag = Some(parent);
        }

        applied.delta = Some((
            parent,
            ChildMutation {
                kind: ChildMutationKind::InsertChild,
                child_index: at,
                child_tag: child,
            },
        ));
        Ok(applied)
    }

    fn apply_update(&self, update: &NodeUpdate) -> std::result::Result<Applied, MutationError> {
        let tag = update.tag;
        let mut store = self.store.borrow_mut();
        let current = store.get(tag).ok_or(MutationError::MissingNode {
            op: "UPDATE",
            tag,
        })?;

        let mut next = current.clone();
        self.overlay
            .borrow()
            .merge_update(&mut next, &update.props, &update.raw_props);
        if let Some(state) = &update.state {
            next.state = state.clone();
        }
        if let Some(layout_metrics) = update.layout_metrics {
            next.layout_metrics = layout_metrics;
        }
        if let Some(is_dynamic_binder) = update.is_dynamic_binder {
            next.is_dynamic_binder = is_dynamic_binder;
        }
        next.render_key = current.render_key + 1;

        store.replace(next);

        Ok(Applied {
            changed: smallvec![tag],
            touched: smallvec![tag],
            delta: update_delta(&store, tag),
        })
    }

    fn apply_remove(
        &self,
        parent: Tag,
        child: Tag,
        index: usize,
    ) -> std::result::Result<Applied, MutationError> {
        let mut store = self.store.borrow_mut();
        let Some(parent_record) = store.get(parent) else {
            return Err(MutationError::MissingParent {
                op: "REMOVE",
                parent,
            });
        };
        let at = if parent_record.children_tags.get(index) == Some(&child) {
            index
        } else {
            parent_record
                .child_index(child)
                .ok_or(MutationError::NotAChild { parent, child })?
        };

        if let Some(parent_record) = store.get_mut(parent) {
            parent_record.children_tags.remove(at);
        }
        // The child may already be deleted earlier in the same batch.
        if store
            .get(child)
            .is_some_and(|record| record.parent_tag == Some(parent))
        {
            if let Some(child_record) = store.get_mut(child) {
                child_record.parent_tag = None;
            }
        }

        Ok(Applied {
            changed: smallvec![parent],
            touched: smallvec![parent, child],
            delta: Some((
                parent,
                ChildMutation {
                    kind: ChildMutationKind::RemoveChild,
                    child_index: at,
                    child_tag: child,
                },
            )),
        })
    }

    fn apply_delete(&self, tag: Tag) -> std::result::Result<Applied, MutationError> {
        if self.store.borrow_mut().remove(tag).is_none() {
            return Err(MutationError::MissingNode { op: "DELETE", tag });
        }
        self.overlay.borrow_mut().clear(tag);
        self.views.borrow_mut().remove(tag);
        Ok(Applied::default())
    }

    fn refresh_views(&self, tags: impl IntoIterator<Item = Tag>) {
        let store = self.store.borrow();
        let mut views = self.views.borrow_mut();
        for tag in tags {
            match store.get_rc(tag) {
                Some(record) => {
                    views.rebuild(record);
                }
                None => views.remove(tag),
            }
        }
    }

    // Animated overlay and state

    /// Merge an animated patch over the record without a commit and notify
    /// all three listener tiers. Unknown tags are ignored.
    pub fn set_animated_props(&self, tag: Tag, patch: Props) {
        let (record, delta) = {
            let mut store = self.store.borrow_mut();
            let Some(current) = store.get(tag) else {
                debug!("animated props for unknown {}", tag);
                return;
            };
            let mut next = current.clone();
            next.render_key += 1;

            let mut overlay = self.overlay.borrow_mut();
            overlay.patch(tag, &patch);
            overlay.apply_to(&mut next, &patch);

            store.replace(next);
            (store.get_rc(tag), update_delta(&store, tag))
        };
        if let Some(record) = record {
            self.views.borrow_mut().rebuild(record);
        }
        if let Some((parent, delta)) = delta {
            self.emit_child_mutation(parent, delta);
        }
        self.deliver(vec![tag]);
    }

    pub fn clear_animated_props(&self, tag: Tag) {
        self.overlay.borrow_mut().clear(tag);
    }

    pub fn set_state(&self, tag: Tag, state: Value) {
        match &self.state_sync {
            Some(sink) => sink.set_state(tag, &state),
            None => debug!("state update for {} dropped: no state sink", tag),
        }
    }

    // Delivery

    pub fn is_foreground(&self) -> bool {
        self.delivery.borrow().foreground
    }

    pub fn set_foreground(&self, foreground: bool) {
        let was = std::mem::replace(&mut self.delivery.borrow_mut().foreground, foreground);
        if foreground && !was {
            debug!("foreground: flushing pending notifications");
            self.flush_pending();
        }
    }

    /// Number of tags and deltas waiting for delivery
    pub fn pending_count(&self) -> (usize, usize) {
        let delivery = self.delivery.borrow();
        (delivery.pending_tags.len(), delivery.pending_deltas.len())
    }

    /// Deliver everything held back while suspended.
    /// Returns false if delivery is still not allowed.
    pub fn flush_pending(&self) -> bool {
        if !self.can_deliver() {
            return false;
        }
        self.replay_deltas();
        let tags = self.delivery.borrow_mut().pending_tags.take();
        if !tags.is_empty() {
            self.notify(&tags);
        }
        true
    }

    fn can_deliver(&self) -> bool {
        self.is_foreground() && (self.should_update_ui)()
    }

    fn emit_child_mutation(&self, parent: Tag, delta: ChildMutation) {
        if !self.can_deliver() {
            self.delivery
                .borrow_mut()
                .pending_deltas
                .push((parent, delta));
            return;
        }
        self.replay_deltas();
        self.notify_child_mutation(parent, &delta);
    }

    fn replay_deltas(&self) {
        let queued = std::mem::take(&mut self.delivery.borrow_mut().pending_deltas);
        for (parent, delta) in queued {
            self.notify_child_mutation(parent, &delta);
        }
    }

    fn deliver(&self, tags: Vec<Tag>) {
        if !self.can_deliver() {
            let mut delivery = self.delivery.borrow_mut();
            delivery.pending_tags.extend(tags);
            debug!(
                "delivery suspended: {} tags pending",
                delivery.pending_tags.len()
            );
            return;
        }

        self.replay_deltas();
        let mut all = TagSet::default();
        all.extend(self.delivery.borrow_mut().pending_tags.take());
        all.extend(tags);
        if !all.is_empty() {
            self.notify(&all.take());
        }
    }

    fn notify_child_mutation(&self, parent: Tag, delta: &ChildMutation) {
        for (id, listener) in self.listeners.child_mutation_listeners(parent) {
            if !self.listeners.is_live(Granularity::ChildMutation, parent, id) {
                continue;
            }
            invoke_isolated("child mutation", parent, || listener(delta));
        }
    }

    fn notify(&self, tags: &[Tag]) {
        for &tag in tags {
            let Some(record) = self.record(tag) else {
                continue;
            };
            let view = self.view(tag);
            for (id, listener) in self.listeners.node_listeners(tag) {
                if !self.listeners.is_live(Granularity::Node, tag, id) {
                    continue;
                }
                invoke_isolated("node", tag, || listener(&*record, view.as_deref()));
            }
        }

        for (owner, id, listener) in self.collect_subtree_listeners(tags) {
            if !self.listeners.is_live(Granularity::Subtree, owner, id) {
                continue;
            }
            invoke_isolated("subtree", owner, || listener());
        }
    }

    /// Subtree listeners on every changed tag and its ancestors, each once
    fn collect_subtree_listeners(
        &self,
        tags: &[Tag],
    ) -> Vec<(Tag, ListenerId, Rc<SubtreeListener>)> {
        let store = self.store.borrow();
        let mut seen = HashSet::new();
        let mut collected = Vec::new();

        for &tag in tags {
            for record in store.lineage(tag).iter().rev() {
                for (id, listener) in self.listeners.subtree_listeners(record.tag) {
                    if seen.insert(id) {
                        collected.push((record.tag, id, listener));
                    }
                }
            }
        }
        collected
    }
}

/// `UpdateChild` delta for `tag` addressed to its parent, if it is linked
fn update_delta(store: &NodeStore, tag: Tag) -> Option<(Tag, ChildMutation)> {
    let parent = store.get(tag)?.parent_tag?;
    let child_index = store.get(parent)?.child_index(tag)?;
    Some((
        parent,
        ChildMutation {
            kind: ChildMutationKind::UpdateChild,
            child_index,
            child_tag: tag,
        },
    ))
}

impl Default for MirrorEngine {
    fn default() -> Self {
        Self::new(MirrorConfig::default())
    }
}

impl fmt::Debug for MirrorEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorEngine")
            .field("nodes", &self.len())
            .field("listeners", &self.listeners)
            .field("foreground", &self.is_foreground())
            .finish_non_exhaustive()
    }
}
