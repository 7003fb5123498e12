use std::sync::Arc;

use async_trait::async_trait;
use keel_core::{Container, ContainerModule, CoreError, Environment, ServiceScope};

use crate::services::{EventBus, InMemoryEventBus, InMemoryQueue, Queue};
use crate::tokens;

const TEST_EVENT_CAPACITY: usize = 64;

/// Registers `IEventBus`
#[derive(Debug, Clone)]
pub struct EventBusModule {
    environment: Environment,
}

impl EventBusModule {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }
}

#[async_trait]
impl ContainerModule for EventBusModule {
    fn name(&self) -> &str {
        "event-bus"
    }

    fn environment(&self) -> Environment {
        self.environment
    }

    fn provides(&self) -> Vec<&'static str> {
        vec![tokens::EVENT_BUS]
    }

    async fn register(&self, container: &Container) -> Result<(), CoreError> {
        let environment = self.environment;
        container.register_disposable_factory(tokens::EVENT_BUS, ServiceScope::Singleton, move |_| {
            let bus = match environment {
                Environment::Development | Environment::Production => InMemoryEventBus::new(),
                Environment::Test => InMemoryEventBus::with_capacity(TEST_EVENT_CAPACITY),
            };
            Ok(Arc::new(bus) as Arc<dyn EventBus>)
        })
    }
}

/// Registers `IQueue`
#[derive(Debug, Clone)]
pub struct QueueModule {
    environment: Environment,
}

impl QueueModule {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }
}

#[async_trait]
impl ContainerModule for QueueModule {
    fn name(&self) -> &str {
        "queue"
    }

    fn environment(&self) -> Environment {
        self.environment
    }

    fn provides(&self) -> Vec<&'static str> {
        vec![tokens::QUEUE]
    }

    async fn register(&self, container: &Container) -> Result<(), CoreError> {
        container.register_disposable_factory(tokens::QUEUE, ServiceScope::Singleton, |_| {
            Ok(Arc::new(InMemoryQueue::new()) as Arc<dyn Queue>)
        })
    }
}
