use std::sync::Arc;

use async_trait::async_trait;
use keel_core::{Container, ContainerModule, CoreError, Environment, ServiceScope};

use crate::modules::configuration_provider;
use crate::services::config::keys;
use crate::services::storage::DEFAULT_STORAGE_ROOT;
use crate::services::{FileStorage, InMemoryFileStorage, LocalFileStorage};
use crate::tokens;

/// Registers `IFileStorage`
///
/// Development stores under `storage_root` (default `./storage`), production
/// requires `storage_root`, test keeps files in memory.
#[derive(Debug, Clone)]
pub struct FileStorageModule {
    environment: Environment,
}

impl FileStorageModule {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }
}

#[async_trait]
impl ContainerModule for FileStorageModule {
    fn name(&self) -> &str {
        "file-storage"
    }

    fn environment(&self) -> Environment {
        self.environment
    }

    fn provides(&self) -> Vec<&'static str> {
        vec![tokens::FILE_STORAGE]
    }

    async fn register(&self, container: &Container) -> Result<(), CoreError> {
        let root = match self.environment {
            Environment::Development => {
                configuration_provider(container)
                    .await?
                    .get_or(keys::STORAGE_ROOT, DEFAULT_STORAGE_ROOT)
            }
            Environment::Production => configuration_provider(container).await?.require(keys::STORAGE_ROOT)?,
            Environment::Test => {
                return container.register_disposable_factory(tokens::FILE_STORAGE, ServiceScope::Singleton, |_| {
                    Ok(Arc::new(InMemoryFileStorage::new()) as Arc<dyn FileStorage>)
                });
            }
        };

        tracing::debug!(root = %root, "Using local file storage");
        container.register_disposable_factory(tokens::FILE_STORAGE, ServiceScope::Singleton, move |_| {
            Ok(Arc::new(LocalFileStorage::new(root.clone())) as Arc<dyn FileStorage>)
        })
    }
}
