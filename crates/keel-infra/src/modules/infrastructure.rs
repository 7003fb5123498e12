use async_trait::async_trait;
use keel_core::{CompositeModule, Container, ContainerModule, CoreError, Environment, ServiceResult};

use crate::modules::{
    CacheModule, ConfigurationModule, DatabaseModule, EventBusModule, FileStorageModule, HttpClientModule,
    LoggerModule, MetricsModule, QueueModule,
};

/// Composite registering every capability in dependency order
///
/// Configuration, logger, database, cache, event bus, queue, metrics, HTTP
/// client and file storage. Later modules may resolve anything an earlier one
/// registered.
#[derive(Debug)]
pub struct InfrastructureModule {
    composite: CompositeModule,
}

impl InfrastructureModule {
    /// Infrastructure with default settings for `environment`
    pub fn new(environment: Environment) -> Self {
        Self::builder(environment).build()
    }

    pub fn builder(environment: Environment) -> InfrastructureBuilder {
        InfrastructureBuilder {
            environment,
            configuration: ConfigurationModule::new(environment),
            logger: LoggerModule::new(environment),
            database: DatabaseModule::new(environment),
        }
    }

    pub fn composite(&self) -> &CompositeModule {
        &self.composite
    }
}

/// Overrides for the modules that take caller input
pub struct InfrastructureBuilder {
    environment: Environment,
    configuration: ConfigurationModule,
    logger: LoggerModule,
    database: DatabaseModule,
}

impl InfrastructureBuilder {
    pub fn configuration(mut self, module: ConfigurationModule) -> Self {
        self.configuration = module;
        self
    }

    pub fn logger(mut self, module: LoggerModule) -> Self {
        self.logger = module;
        self
    }

    pub fn database(mut self, module: DatabaseModule) -> Self {
        self.database = module;
        self
    }

    pub fn build(self) -> InfrastructureModule {
        let environment = self.environment;
        let composite = CompositeModule::new("infrastructure", environment)
            .with_child(self.configuration)
            .with_child(self.logger)
            .with_child(self.database)
            .with_child(CacheModule::new(environment))
            .with_child(EventBusModule::new(environment))
            .with_child(QueueModule::new(environment))
            .with_child(MetricsModule::new(environment))
            .with_child(HttpClientModule::new(environment))
            .with_child(FileStorageModule::new(environment));

        InfrastructureModule { composite }
    }
}

#[async_trait]
impl ContainerModule for InfrastructureModule {
    fn name(&self) -> &str {
        self.composite.name()
    }

    fn environment(&self) -> Environment {
        self.composite.environment()
    }

    fn provides(&self) -> Vec<&'static str> {
        self.composite.provides()
    }

    async fn register(&self, container: &Container) -> Result<(), CoreError> {
        self.composite.register(container).await
    }

    async fn configure(&self, container: &Container) -> ServiceResult<()> {
        self.composite.configure(container).await
    }
}
