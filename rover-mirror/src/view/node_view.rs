use crate::node::{LayoutDirection, NodeRecord, Point, Props, Rect, Tag};
use serde_json::Value;
use smallvec::SmallVec;
use smartstring::{LazyCompact, SmartString};
use std::rc::Rc;

pub type Hint = SmartString<LazyCompact>;

/// How string identifiers and hints are read out of raw props
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingConvention {
    pub string_id_prop: String,
    pub hint_prefix: String,
}

impl NamingConvention {
    pub fn new(string_id_prop: impl Into<String>, hint_prefix: impl Into<String>) -> Self {
        Self {
            string_id_prop: string_id_prop.into(),
            hint_prefix: hint_prefix.into(),
        }
    }

    /// Split a raw identifier into `(id, hints)`.
    ///
    /// `<prefix>a;b:id` yields `id` with hints `a` and `b`. A prefixed value
    /// without `:` carries hints only. Anything else is a plain id.
    pub fn parse(&self, raw: &str) -> (Option<String>, SmallVec<[Hint; 2]>) {
        let mut hints = SmallVec::new();
        let Some(rest) = raw
            .strip_prefix(self.hint_prefix.as_str())
            .filter(|_| !self.hint_prefix.is_empty())
        else {
            return (non_empty(raw), hints);
        };

        let (hint_part, id) = match rest.split_once(':') {
            Some((h, id)) => (h, non_empty(id)),
            None => (rest, None),
        };
        hints.extend(
            hint_part
                .split(';')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(Hint::from),
        );
        (id, hints)
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

/// Read-only projection of a node record, rebuilt whenever the record changes
#[derive(Debug, Clone)]
pub struct NodeView {
    record: Rc<NodeRecord>,
    string_id: Option<String>,
    hints: SmallVec<[Hint; 2]>,
}

impl NodeView {
    pub fn from_record(record: Rc<NodeRecord>, naming: &NamingConvention) -> Self {
        let (string_id, hints) = match record.raw_props.get(&naming.string_id_prop) {
            Some(Value::String(raw)) => naming.parse(raw),
            _ => (None, SmallVec::new()),
        };
        Self {
            record,
            string_id,
            hints,
        }
    }

    pub fn tag(&self) -> Tag {
        self.record.tag
    }

    pub fn node_type(&self) -> &str {
        self.record.node_type.as_str()
    }

    pub fn parent_tag(&self) -> Option<Tag> {
        self.record.parent_tag
    }

    pub fn render_key(&self) -> u64 {
        self.record.render_key
    }

    pub fn record(&self) -> &Rc<NodeRecord> {
        &self.record
    }

    pub fn native_props(&self) -> &Props {
        self.record.native_props()
    }

    pub fn frame(&self) -> Rect {
        self.record.layout_metrics.frame
    }

    pub fn width(&self) -> f64 {
        self.record.layout_metrics.frame.size.width
    }

    pub fn height(&self) -> f64 {
        self.record.layout_metrics.frame.size.height
    }

    /// Origin relative to the parent's frame
    pub fn position(&self) -> Point {
        self.record.layout_metrics.frame.origin
    }

    pub fn is_rtl(&self) -> bool {
        self.record.layout_metrics.layout_direction == LayoutDirection::Rtl
    }

    pub fn string_id(&self) -> Option<&str> {
        self.string_id.as_deref()
    }

    pub fn hints(&self) -> &[Hint] {
        &self.hints
    }

    pub fn has_hint(&self, hint: &str) -> bool {
        self.hints.iter().any(|h| h.as_str() == hint)
    }

    /// For custom factories that derive hints from something other than the id
    pub fn add_hint(&mut self, hint: &str) {
        if !self.has_hint(hint) {
            self.hints.push(Hint::from(hint));
        }
    }
}
