use crate::node::Tag;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("root {tag} still has {children} children")]
    RootHasChildren { tag: Tag, children: usize },

    #[error("{0} is not a root node")]
    NotARoot(Tag),

    #[error("no node registered for {0}")]
    UnknownTag(Tag),

    #[error("{0} is already registered")]
    DuplicateTag(Tag),

    #[error("release of {0} without a matching acquire")]
    ManagerNotAcquired(Tag),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MirrorError>;

/// A single mutation that could not be applied. Logged and skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum MutationError {
    #[error("CREATE of {0}, which is already live")]
    AlreadyLive(Tag),

    #[error("{op} references unknown parent {parent}")]
    MissingParent { op: &'static str, parent: Tag },

    #[error("{op} references unknown child {child}")]
    MissingChild { op: &'static str, child: Tag },

    #[error("{op} references unknown node {tag}")]
    MissingNode { op: &'static str, tag: Tag },

    #[error("root {0} cannot become a child")]
    RootAsChild(Tag),

    #[error("inserting {child} under {parent} would create a cycle")]
    WouldCycle { parent: Tag, child: Tag },

    #[error("{child} is not a child of {parent}")]
    NotAChild { parent: Tag, child: Tag },
}
