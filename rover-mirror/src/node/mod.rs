mod mutation;
mod store;
mod types;

pub use mutation::{ChildMutation, ChildMutationKind, Mutation};
pub use store::{NodeStore, StructuralIssue};
pub use types::{
    LayoutDirection, LayoutMetrics, NodeRecord, NodeSpec, NodeType, NodeUpdate, Point, Props,
    ROOT_VIEW_TYPE, Rect, Size, Tag,
};
