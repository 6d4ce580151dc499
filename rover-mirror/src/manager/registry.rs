use super::component::ComponentManager;
use super::legacy::LegacyManagers;
use crate::error::{MirrorError, Result};
use crate::node::Tag;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

/// Result of a successful release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Other holders remain
    Retained(usize),
    /// The last holder left and the manager was torn down
    Destroyed,
}

struct Entry {
    manager: Rc<dyn ComponentManager>,
    ref_count: usize,
}

/// Reference-counted tag → manager map.
///
/// The factory and `on_destroy` run with no internal borrow held, so both
/// may call back into the registry.
pub struct ManagerRegistry {
    entries: RefCell<HashMap<Tag, Entry>>,
    legacy: RefCell<LegacyManagers>,
}

impl ManagerRegistry {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
            legacy: RefCell::new(LegacyManagers::new()),
        }
    }

    /// Take a reference on the manager for `tag`, building it on first use
    pub fn acquire<F>(&self, tag: Tag, factory: F) -> Rc<dyn ComponentManager>
    where
        F: FnOnce(Tag) -> Rc<dyn ComponentManager>,
    {
        if let Some(entry) = self.entries.borrow_mut().get_mut(&tag) {
            entry.ref_count += 1;
            return Rc::clone(&entry.manager);
        }

        let manager = factory(tag);

        let mut entries = self.entries.borrow_mut();
        if let Some(entry) = entries.get_mut(&tag) {
            // The factory acquired the same tag itself.
            warn!("manager for {} created re-entrantly; keeping the first", tag);
            entry.ref_count += 1;
            return Rc::clone(&entry.manager);
        }
        entries.insert(
            tag,
            Entry {
                manager: Rc::clone(&manager),
                ref_count: 1,
            },
        );
        debug!("created manager for {}", tag);
        manager
    }

    pub fn release(&self, tag: Tag) -> Result<Release> {
        let destroyed = {
            let mut entries = self.entries.borrow_mut();
            let Some(entry) = entries.get_mut(&tag) else {
                warn!("release of {} without a matching acquire", tag);
                return Err(MirrorError::ManagerNotAcquired(tag));
            };
            entry.ref_count -= 1;
            if entry.ref_count > 0 {
                return Ok(Release::Retained(entry.ref_count));
            }
            entries.remove(&tag)
        };

        if let Some(entry) = destroyed {
            entry.manager.on_destroy();
            debug!("destroyed manager for {}", tag);
        }
        Ok(Release::Destroyed)
    }

    pub fn ref_count(&self, tag: Tag) -> usize {
        self.entries
            .borrow()
            .get(&tag)
            .map_or(0, |entry| entry.ref_count)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn register_legacy(&self, tag: Tag, manager: Rc<dyn ComponentManager>) {
        self.legacy.borrow_mut().register(tag, manager);
    }

    pub fn unregister_legacy(&self, tag: Tag, manager: &Rc<dyn ComponentManager>) -> bool {
        self.legacy.borrow_mut().unregister(tag, manager)
    }

    /// Ref-counted entry first, then the legacy registrations
    pub fn manager(&self, tag: Tag) -> Option<Rc<dyn ComponentManager>> {
        if let Some(entry) = self.entries.borrow().get(&tag) {
            return Some(Rc::clone(&entry.manager));
        }
        self.legacy.borrow().resolve(tag)
    }

    /// Managers from the outermost resolvable ancestor down to `tag`
    pub fn lineage(&self, tag: Tag) -> Vec<Rc<dyn ComponentManager>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(tag);

        while let Some(t) = current {
            if !seen.insert(t) {
                warn!("manager lineage of {} loops at {}", tag, t);
                break;
            }
            let Some(manager) = self.manager(t) else {
                break;
            };
            current = manager.parent_tag();
            chain.push(manager);
        }

        chain.reverse();
        chain
    }
}

impl Default for ManagerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ManagerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerRegistry")
            .field("entries", &self.len())
            .field("legacy", &self.legacy.borrow().len())
            .finish()
    }
}
