use crate::node::{NodeRecord, Props, Tag};
use std::collections::HashMap;

/// Per-tag animated property overrides that outlive ordinary updates
#[derive(Debug)]
pub struct AnimatedOverlay {
    props_routed_keys: Vec<String>,
    by_tag: HashMap<Tag, Props>,
}

impl AnimatedOverlay {
    pub fn new(props_routed_keys: Vec<String>) -> Self {
        Self {
            props_routed_keys,
            by_tag: HashMap::new(),
        }
    }

    pub fn get(&self, tag: Tag) -> Option<&Props> {
        self.by_tag.get(&tag)
    }

    /// Fold `patch` into the stored overlay for `tag`
    pub fn patch(&mut self, tag: Tag, patch: &Props) {
        let entry = self.by_tag.entry(tag).or_default();
        for (key, value) in patch {
            entry.insert(key.clone(), value.clone());
        }
    }

    pub fn clear(&mut self, tag: Tag) -> Option<Props> {
        self.by_tag.remove(&tag)
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    /// Write `animated` onto the record, routing each key to `props` or `raw_props`
    pub fn apply_to(&self, record: &mut NodeRecord, animated: &Props) {
        for (key, value) in animated {
            let target = if self.props_routed_keys.iter().any(|k| k == key) {
                &mut record.props
            } else {
                &mut record.raw_props
            };
            target.insert(key.clone(), value.clone());
        }
    }

    /// Three-layer merge for an UPDATE. Highest wins: overlay, then the
    /// incoming props, then what the record already holds.
    pub fn merge_update(&self, record: &mut NodeRecord, incoming: &Props, incoming_raw: &Props) {
        for (key, value) in incoming {
            record.props.insert(key.clone(), value.clone());
        }
        for (key, value) in incoming_raw {
            record.raw_props.insert(key.clone(), value.clone());
        }
        if let Some(animated) = self.by_tag.get(&record.tag) {
            self.apply_to(record, animated);
        }
    }
}
