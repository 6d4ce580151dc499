use super::types::{NodeRecord, Tag};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Inconsistency between a parent's children list and a child's back-link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralIssue {
    /// `parent` lists `child`, but the child is missing from the store.
    MissingChild { parent: Tag, child: Tag },
    /// `parent` lists `child`, but the child points somewhere else.
    ParentMismatch {
        parent: Tag,
        child: Tag,
        recorded: Option<Tag>,
    },
    /// `child` points at `parent`, but the parent does not list it.
    NotListed { parent: Tag, child: Tag },
    /// The same child appears more than once in `parent`'s children.
    DuplicateChild { parent: Tag, child: Tag },
}

/// Tag-keyed storage for node records
#[derive(Debug, Default)]
pub struct NodeStore {
    records: HashMap<Tag, Rc<NodeRecord>>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    pub fn get(&self, tag: Tag) -> Option<&NodeRecord> {
        self.records.get(&tag).map(|r| r.as_ref())
    }

    /// Shared snapshot of the current record
    pub fn get_rc(&self, tag: Tag) -> Option<Rc<NodeRecord>> {
        self.records.get(&tag).cloned()
    }

    /// Copy-on-write access: readers holding an older snapshot keep it intact
    pub fn get_mut(&mut self, tag: Tag) -> Option<&mut NodeRecord> {
        self.records.get_mut(&tag).map(Rc::make_mut)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.records.contains_key(&tag)
    }

    /// Insert a record, returning the one it displaced
    pub fn insert(&mut self, record: NodeRecord) -> Option<Rc<NodeRecord>> {
        self.records.insert(record.tag, Rc::new(record))
    }

    /// Swap in a freshly built record for an existing tag
    pub fn replace(&mut self, record: NodeRecord) {
        self.records.insert(record.tag, Rc::new(record));
    }

    pub fn remove(&mut self, tag: Tag) -> Option<Rc<NodeRecord>> {
        self.records.remove(&tag)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.records.keys().copied()
    }

    /// Ancestor chain of `tag`, root first and ending at `tag`.
    ///
    /// Stops at the first parent link that does not resolve, and at the
    /// first repeated tag, so a corrupted chain never loops.
    pub fn lineage(&self, tag: Tag) -> Vec<Rc<NodeRecord>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(tag);

        while let Some(t) = current {
            if !seen.insert(t) {
                break;
            }
            let Some(record) = self.records.get(&t) else {
                break;
            };
            current = record.parent_tag;
            chain.push(Rc::clone(record));
        }

        chain.reverse();
        chain
    }

    /// Check that every parent/child link is mirrored on both sides
    pub fn validate(&self) -> Vec<StructuralIssue> {
        let mut issues = Vec::new();

        for record in self.records.values() {
            let mut seen = HashSet::new();
            for &child in &record.children_tags {
                if !seen.insert(child) {
                    issues.push(StructuralIssue::DuplicateChild {
                        parent: record.tag,
                        child,
                    });
                    continue;
                }
                match self.records.get(&child) {
                    None => issues.push(StructuralIssue::MissingChild {
                        parent: record.tag,
                        child,
                    }),
                    Some(child_record) if child_record.parent_tag != Some(record.tag) => {
                        issues.push(StructuralIssue::ParentMismatch {
                            parent: record.tag,
                            child,
                            recorded: child_record.parent_tag,
                        })
                    }
                    Some(_) => {}
                }
            }

            if let Some(parent) = record.parent_tag {
                let listed = self
                    .records
                    .get(&parent)
                    .is_some_and(|p| p.children_tags.contains(&record.tag));
                if !listed {
                    issues.push(StructuralIssue::NotListed {
                        parent,
                        child: record.tag,
                    });
                }
            }
        }

        issues
    }
}
