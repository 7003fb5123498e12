use std::sync::Arc;

use async_trait::async_trait;
use keel_core::{Container, ContainerModule, CoreError, Environment, ServiceScope};

use crate::error::creation_failed;
use crate::modules::configuration_provider;
use crate::services::config::keys;
use crate::services::{Database, DatabaseConnectContext, DatabaseConnector, InMemoryDatabase, Logger};
use crate::tokens;

/// Registers `IDatabase`
///
/// Development and test get an [`InMemoryDatabase`]. Production connects
/// through the caller-supplied [`DatabaseConnector`], which receives the
/// configured `database_url`, the configuration provider and the logger; a
/// production module without a connector fails to configure.
#[derive(Clone)]
pub struct DatabaseModule {
    environment: Environment,
    connector: Option<DatabaseConnector>,
}

impl DatabaseModule {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            connector: None,
        }
    }

    pub fn with_connector(mut self, connector: DatabaseConnector) -> Self {
        self.connector = Some(connector);
        self
    }

    async fn register_production(&self, container: &Container) -> Result<(), CoreError> {
        let connector = self
            .connector
            .clone()
            .ok_or_else(|| CoreError::configuration("production database requires an adapter connector"))?;

        // Fail at startup rather than on first use.
        configuration_provider(container).await?.require(keys::DATABASE_URL)?;

        container.register_async_disposable_factory(tokens::DATABASE, ServiceScope::Singleton, move |c: Container| {
            let connector = connector.clone();
            async move {
                let config = configuration_provider(&c).await?;
                let logger = c.resolve::<dyn Logger>(tokens::LOGGER).await?;
                let url = config.require(keys::DATABASE_URL)?;

                logger.info("Connecting production database");
                let database = connector(DatabaseConnectContext { url, config, logger: logger.clone() })
                    .await
                    .map_err(|err| creation_failed(tokens::DATABASE, err))?;
                logger.info(&format!("Connected {} database", database.name()));
                Ok(database)
            }
        })
    }
}

#[async_trait]
impl ContainerModule for DatabaseModule {
    fn name(&self) -> &str {
        "database"
    }

    fn environment(&self) -> Environment {
        self.environment
    }

    fn provides(&self) -> Vec<&'static str> {
        vec![tokens::DATABASE]
    }

    async fn register(&self, container: &Container) -> Result<(), CoreError> {
        match self.environment {
            Environment::Development | Environment::Test => {
                container.register_disposable_factory(tokens::DATABASE, ServiceScope::Singleton, |_| {
                    Ok(Arc::new(InMemoryDatabase::new()) as Arc<dyn Database>)
                })
            }
            Environment::Production => self.register_production(container).await,
        }
    }
}
