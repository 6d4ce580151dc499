mod cache;
mod factory;
mod node_view;

pub use cache::ViewCache;
pub use factory::{DefaultViewFactory, ViewFactory, ViewFactoryRegistry};
pub use node_view::{Hint, NamingConvention, NodeView};
