pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod mirror;
pub mod node;
pub mod view;

// Re-export key types
pub use config::MirrorConfig;
pub use error::{MirrorError, Result};
pub use manager::{ComponentManager, ManagerBase, ManagerRegistry, Release};
pub use mirror::{BatchReport, MirrorEngine, StateSync, Subscription};
pub use node::{ChildMutation, ChildMutationKind, Mutation, NodeRecord, NodeSpec, NodeUpdate, Tag};
pub use view::NodeView;
