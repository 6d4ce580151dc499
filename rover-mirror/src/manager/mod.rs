mod component;
mod legacy;
mod registry;

pub use component::{ComponentManager, ManagerBase};
pub use legacy::LegacyManagers;
pub use registry::{ManagerRegistry, Release};
