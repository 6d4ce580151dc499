use super::types::{NodeSpec, NodeUpdate, Tag};
use serde::{Deserialize, Serialize};

/// One edit in a commit batch produced by the native differ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mutation {
    Create {
        descriptor: NodeSpec,
    },
    #[serde(rename_all = "camelCase")]
    Insert {
        parent_tag: Tag,
        child_tag: Tag,
        index: usize,
    },
    Update {
        descriptor: NodeUpdate,
    },
    #[serde(rename_all = "camelCase")]
    Remove {
        parent_tag: Tag,
        child_tag: Tag,
        index: usize,
    },
    Delete {
        tag: Tag,
    },
    /// Bookkeeping marker for a subtree teardown that the surrounding
    /// REMOVE/DELETE mutations already describe. Never notifies.
    #[serde(rename_all = "camelCase")]
    RemoveDeleteTree {
        parent_tag: Tag,
        child_tag: Tag,
        index: usize,
    },
}

impl Mutation {
    pub fn create(descriptor: NodeSpec) -> Self {
        Self::Create { descriptor }
    }

    pub fn insert(parent_tag: Tag, child_tag: Tag, index: usize) -> Self {
        Self::Insert {
            parent_tag,
            child_tag,
            index,
        }
    }

    pub fn update(descriptor: NodeUpdate) -> Self {
        Self::Update { descriptor }
    }

    pub fn remove(parent_tag: Tag, child_tag: Tag, index: usize) -> Self {
        Self::Remove {
            parent_tag,
            child_tag,
            index,
        }
    }

    pub fn delete(tag: Tag) -> Self {
        Self::Delete { tag }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Mutation::Create { .. } => "CREATE",
            Mutation::Insert { .. } => "INSERT",
            Mutation::Update { .. } => "UPDATE",
            Mutation::Remove { .. } => "REMOVE",
            Mutation::Delete { .. } => "DELETE",
            Mutation::RemoveDeleteTree { .. } => "REMOVE_DELETE_TREE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChildMutationKind {
    InsertChild,
    UpdateChild,
    RemoveChild,
}

/// Minimal delta delivered to structural listeners of the parent.
///
/// `child_index` is the position after the edit for inserts and updates,
/// and the position the child held before removal for removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildMutation {
    pub kind: ChildMutationKind,
    pub child_index: usize,
    pub child_tag: Tag,
}
