mod engine;
mod listeners;
mod overlay;

pub use engine::{BatchReport, MirrorEngine, StateSync};
pub use listeners::{
    ChildMutationListener, Granularity, ListenerId, ListenerTables, NodeListener, Subscription,
    SubtreeListener,
};
pub use overlay::AnimatedOverlay;
