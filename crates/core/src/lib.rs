//! Core service container runtime for keel.
//!
//! Services are registered under string tokens with a lifetime
//! ([`ServiceScope`]) and resolved asynchronously from an explicit
//! [`Container`]. Composable [`ContainerModule`]s group registrations per
//! capability and report failures as [`ServiceResult`] envelopes.

pub mod config;
pub mod container;
pub mod errors;
pub mod modules;

pub use config::{ConfigError, Environment};
pub use container::{Container, ContainerStats, Disposable, ScopedServiceManager, ServiceScope};
pub use errors::{CoreError, ServiceError, ServiceResult};
pub use modules::{configure_with_timeout, CompositeModule, ContainerModule, ModuleMetadata};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get crate version
pub fn version() -> &'static str {
    VERSION
}
