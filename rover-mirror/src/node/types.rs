use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smartstring::{LazyCompact, SmartString};
use std::fmt;

/// Opaque node identifier assigned by the native engine
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Tag(pub u32);

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Untyped property bag as it crosses the bridge
pub type Props = Map<String, Value>;

pub type NodeType = SmartString<LazyCompact>;

/// Type name reserved for surface roots.
pub const ROOT_VIEW_TYPE: &str = "RootView";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point { x, y },
            size: Size { width, height },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutDirection {
    #[default]
    Undefined,
    Ltr,
    Rtl,
}

/// Frame and direction produced by the external layout pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutMetrics {
    pub frame: Rect,
    #[serde(default)]
    pub layout_direction: LayoutDirection,
}

impl LayoutMetrics {
    pub fn with_frame(frame: Rect) -> Self {
        Self {
            frame,
            layout_direction: LayoutDirection::Undefined,
        }
    }
}

/// Canonical stored state for one tag.
///
/// Records are shared as `Rc<NodeRecord>`; a snapshot handed out to a
/// listener never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub tag: Tag,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub parent_tag: Option<Tag>,
    pub children_tags: Vec<Tag>,
    pub props: Props,
    pub raw_props: Props,
    pub state: Value,
    pub layout_metrics: LayoutMetrics,
    pub render_key: u64,
    /// Legacy switch: when set, `raw_props` is what native consumers read.
    pub is_dynamic_binder: bool,
}

impl NodeRecord {
    pub fn is_root(&self) -> bool {
        self.node_type.as_str() == ROOT_VIEW_TYPE
    }

    /// The prop bag native consumers should read
    pub fn native_props(&self) -> &Props {
        if self.is_dynamic_binder {
            &self.raw_props
        } else {
            &self.props
        }
    }

    pub fn child_index(&self, child: Tag) -> Option<usize> {
        self.children_tags.iter().position(|t| *t == child)
    }
}

/// Payload of a CREATE mutation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeSpec {
    pub tag: Tag,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub props: Props,
    pub raw_props: Props,
    pub state: Value,
    pub layout_metrics: LayoutMetrics,
    pub is_dynamic_binder: bool,
}

impl NodeSpec {
    pub fn new(tag: Tag, node_type: &str) -> Self {
        Self {
            tag,
            node_type: node_type.into(),
            ..Default::default()
        }
    }

    pub fn with_raw_props(mut self, raw_props: Props) -> Self {
        self.raw_props = raw_props;
        self
    }

    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    pub fn with_layout(mut self, layout_metrics: LayoutMetrics) -> Self {
        self.layout_metrics = layout_metrics;
        self
    }

    pub(crate) fn into_record(self) -> NodeRecord {
        NodeRecord {
            tag: self.tag,
            node_type: self.node_type,
            parent_tag: None,
            children_tags: Vec::new(),
            props: self.props,
            raw_props: self.raw_props,
            state: self.state,
            layout_metrics: self.layout_metrics,
            render_key: 0,
            is_dynamic_binder: self.is_dynamic_binder,
        }
    }
}

/// Payload of an UPDATE mutation.
///
/// Props are merged over what is stored; `state` and `layout_metrics`
/// replace the stored values only when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeUpdate {
    pub tag: Tag,
    pub props: Props,
    pub raw_props: Props,
    pub state: Option<Value>,
    pub layout_metrics: Option<LayoutMetrics>,
    pub is_dynamic_binder: Option<bool>,
}

impl NodeUpdate {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            ..Default::default()
        }
    }

    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    pub fn with_raw_props(mut self, raw_props: Props) -> Self {
        self.raw_props = raw_props;
        self
    }

    pub fn with_state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_layout(mut self, layout_metrics: LayoutMetrics) -> Self {
        self.layout_metrics = Some(layout_metrics);
        self
    }
}
