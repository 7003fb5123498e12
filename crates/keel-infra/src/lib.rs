//! Capability adapters and per-environment modules for the keel container.
//!
//! [`InfrastructureModule`] registers configuration, logging, database,
//! cache, event bus, queue, metrics, HTTP client and file storage under the
//! tokens in [`tokens`]; [`bootstrap`](bootstrap::bootstrap) wires it into a
//! fresh [`Container`](keel_core::Container).

pub mod bootstrap;
pub mod error;
pub mod logging;
pub mod modules;
pub mod services;
pub mod tokens;

pub use bootstrap::{bootstrap, bootstrap_from_env, bootstrap_with};
pub use error::{AdapterError, AdapterResult, IntoServiceResult};
pub use logging::{init_logging, LoggingConfig};
pub use modules::{InfrastructureBuilder, InfrastructureModule};
