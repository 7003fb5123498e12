use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use keel_core::{Container, ContainerModule, CoreError, Environment, ServiceScope};

use crate::error::creation_failed;
use crate::modules::configuration_provider;
use crate::services::config::keys;
use crate::services::{HttpClient, NoopHttpClient, ReqwestHttpClient};
use crate::tokens;

/// Registers `IHttpClient`
///
/// Production requires `http_base_url`; development uses it when present.
/// Settings are read while registering.
/// Test records requests instead of sending them.
#[derive(Debug, Clone)]
pub struct HttpClientModule {
    environment: Environment,
}

impl HttpClientModule {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    async fn register_reqwest(&self, container: &Container, require_base_url: bool) -> Result<(), CoreError> {
        let config = configuration_provider(container).await?;
        let base_url = if require_base_url {
            Some(config.require(keys::HTTP_BASE_URL)?)
        } else {
            config.get(keys::HTTP_BASE_URL)
        };
        let timeout = config.get_u64(keys::HTTP_TIMEOUT_SECS)?.map(Duration::from_secs);

        container.register_factory(tokens::HTTP_CLIENT, ServiceScope::Singleton, move |_| {
            let client = ReqwestHttpClient::new(base_url.as_deref(), timeout)
                .map_err(|err| creation_failed(tokens::HTTP_CLIENT, err))?;
            Ok(Arc::new(client) as Arc<dyn HttpClient>)
        })
    }
}

#[async_trait]
impl ContainerModule for HttpClientModule {
    fn name(&self) -> &str {
        "http-client"
    }

    fn environment(&self) -> Environment {
        self.environment
    }

    fn provides(&self) -> Vec<&'static str> {
        vec![tokens::HTTP_CLIENT]
    }

    async fn register(&self, container: &Container) -> Result<(), CoreError> {
        match self.environment {
            Environment::Development => self.register_reqwest(container, false).await,
            Environment::Test => container.register_factory(tokens::HTTP_CLIENT, ServiceScope::Singleton, |_| {
                Ok(Arc::new(NoopHttpClient::new()) as Arc<dyn HttpClient>)
            }),
            Environment::Production => self.register_reqwest(container, true).await,
        }
    }
}
