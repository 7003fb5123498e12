use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use keel_core::{Container, ContainerModule, CoreError, Environment, ServiceScope};

use crate::modules::configuration_provider;
use crate::services::config::keys;
use crate::services::{Cache, InMemoryCache};
use crate::tokens;

/// Registers `ICache`
///
/// Outside test the default time-to-live comes from `cache_default_ttl_secs`,
/// read while registering so a malformed value fails configuration.
#[derive(Debug, Clone)]
pub struct CacheModule {
    environment: Environment,
}

impl CacheModule {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }
}

#[async_trait]
impl ContainerModule for CacheModule {
    fn name(&self) -> &str {
        "cache"
    }

    fn environment(&self) -> Environment {
        self.environment
    }

    fn provides(&self) -> Vec<&'static str> {
        vec![tokens::CACHE]
    }

    async fn register(&self, container: &Container) -> Result<(), CoreError> {
        match self.environment {
            Environment::Development | Environment::Production => {
                let ttl = configuration_provider(container)
                    .await?
                    .get_u64(keys::CACHE_DEFAULT_TTL_SECS)?
                    .map(Duration::from_secs);
                container.register_disposable_factory(tokens::CACHE, ServiceScope::Singleton, move |_| {
                    let cache = match ttl {
                        Some(ttl) => InMemoryCache::with_default_ttl(ttl),
                        None => InMemoryCache::new(),
                    };
                    Ok(Arc::new(cache) as Arc<dyn Cache>)
                })
            }
            Environment::Test => container.register_disposable_factory(tokens::CACHE, ServiceScope::Singleton, |_| {
                Ok(Arc::new(InMemoryCache::new()) as Arc<dyn Cache>)
            }),
        }
    }
}
