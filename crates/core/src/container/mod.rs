#[allow(clippy::module_inception)]
pub mod container;
pub mod lifecycle;
pub mod registry;
pub mod resolver;
pub mod scope;

pub use container::{Container, ContainerStats, ContainerStatus};
pub use lifecycle::{DisposalTracker, Disposable};
pub use registry::{ServiceEntry, ServiceRegistry};
pub use resolver::ResolutionPath;
pub use scope::{ScopeId, ScopedServiceManager, ServiceScope};
