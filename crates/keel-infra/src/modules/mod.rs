//! Per-capability container modules and the infrastructure composite.
//!
//! Each module picks its adapter with an exhaustive `match` on the
//! [`Environment`](keel_core::Environment) it was constructed for.

pub mod cache;
pub mod configuration;
pub mod database;
pub mod file_storage;
pub mod http_client;
pub mod infrastructure;
pub mod logger;
pub mod messaging;
pub mod metrics;

pub use cache::CacheModule;
pub use configuration::ConfigurationModule;
pub use database::DatabaseModule;
pub use file_storage::FileStorageModule;
pub use http_client::HttpClientModule;
pub use infrastructure::{InfrastructureBuilder, InfrastructureModule};
pub use logger::LoggerModule;
pub use messaging::{EventBusModule, QueueModule};
pub use metrics::MetricsModule;

use std::sync::Arc;

use keel_core::{Container, CoreError};

use crate::services::ConfigurationProvider;
use crate::tokens;

/// Resolve the configuration provider registered by [`ConfigurationModule`]
pub(crate) async fn configuration_provider(container: &Container) -> Result<Arc<dyn ConfigurationProvider>, CoreError> {
    container
        .resolve::<dyn ConfigurationProvider>(tokens::CONFIGURATION_PROVIDER)
        .await
}
