use std::sync::Arc;

use async_trait::async_trait;
use keel_core::{Container, ContainerModule, CoreError, Environment};

use crate::services::{Logger, MemoryLogger, TracingLogger};
use crate::tokens;

/// Registers `ILogger`: `tracing` outside tests, captured records in test
#[derive(Debug, Clone)]
pub struct LoggerModule {
    environment: Environment,
    component: String,
    memory: Option<Arc<MemoryLogger>>,
}

impl LoggerModule {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            component: "keel".to_string(),
            memory: None,
        }
    }

    /// Component name attached to every `tracing` event
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    /// Share a capture logger with the caller in test
    pub fn with_memory_logger(mut self, logger: Arc<MemoryLogger>) -> Self {
        self.memory = Some(logger);
        self
    }
}

#[async_trait]
impl ContainerModule for LoggerModule {
    fn name(&self) -> &str {
        "logger"
    }

    fn environment(&self) -> Environment {
        self.environment
    }

    fn provides(&self) -> Vec<&'static str> {
        vec![tokens::LOGGER]
    }

    async fn register(&self, container: &Container) -> Result<(), CoreError> {
        let logger: Arc<dyn Logger> = match self.environment {
            Environment::Development | Environment::Production => Arc::new(TracingLogger::new(self.component.clone())),
            Environment::Test => self.memory.clone().unwrap_or_default(),
        };

        container.register_instance(tokens::LOGGER, logger)
    }
}
