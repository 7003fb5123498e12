use std::sync::Arc;

use async_trait::async_trait;
use keel_core::{Container, ContainerModule, CoreError, Environment, ServiceScope};

use crate::services::{InMemoryMetrics, Metrics};
use crate::tokens;

/// Registers `IMetrics`
#[derive(Debug, Clone)]
pub struct MetricsModule {
    environment: Environment,
}

impl MetricsModule {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }
}

#[async_trait]
impl ContainerModule for MetricsModule {
    fn name(&self) -> &str {
        "metrics"
    }

    fn environment(&self) -> Environment {
        self.environment
    }

    fn provides(&self) -> Vec<&'static str> {
        vec![tokens::METRICS]
    }

    async fn register(&self, container: &Container) -> Result<(), CoreError> {
        container.register_factory(tokens::METRICS, ServiceScope::Singleton, |_| {
            Ok(Arc::new(InMemoryMetrics::new()) as Arc<dyn Metrics>)
        })
    }
}
