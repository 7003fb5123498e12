use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use keel_core::{Container, ContainerModule, CoreError, Environment};

use crate::services::{ConfigurationProvider, EnvConfigurationProvider, StaticConfigurationProvider};
use crate::tokens;

/// Registers `IConfigurationProvider`
///
/// Development and production read `KEEL_*` environment variables; test uses
/// the values given to [`ConfigurationModule::with_value`]. An explicit
/// provider overrides both.
#[derive(Clone)]
pub struct ConfigurationModule {
    environment: Environment,
    values: HashMap<String, String>,
    provider: Option<Arc<dyn ConfigurationProvider>>,
}

impl ConfigurationModule {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            values: HashMap::new(),
            provider: None,
        }
    }

    /// Value served by the test provider
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Use `provider` regardless of environment
    pub fn with_provider(mut self, provider: Arc<dyn ConfigurationProvider>) -> Self {
        self.provider = Some(provider);
        self
    }
}

#[async_trait]
impl ContainerModule for ConfigurationModule {
    fn name(&self) -> &str {
        "configuration"
    }

    fn environment(&self) -> Environment {
        self.environment
    }

    fn provides(&self) -> Vec<&'static str> {
        vec![tokens::CONFIGURATION_PROVIDER]
    }

    async fn register(&self, container: &Container) -> Result<(), CoreError> {
        let provider: Arc<dyn ConfigurationProvider> = match (&self.provider, self.environment) {
            (Some(provider), _) => provider.clone(),
            (None, Environment::Development) | (None, Environment::Production) => {
                Arc::new(EnvConfigurationProvider::new())
            }
            (None, Environment::Test) => Arc::new(StaticConfigurationProvider::new(self.values.clone())),
        };

        container.register_instance(tokens::CONFIGURATION_PROVIDER, provider)
    }
}
