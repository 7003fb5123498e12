//! Application startup: build a container and configure it, failing closed.

use keel_core::{Container, ContainerModule, CoreError, Environment, ServiceError};

use crate::modules::InfrastructureModule;

/// Container configured with the default infrastructure for `environment`
pub async fn bootstrap(environment: Environment) -> Result<Container, ServiceError> {
    bootstrap_with(&InfrastructureModule::new(environment)).await
}

/// Like [`bootstrap`], reading the environment from `APP_ENV`
pub async fn bootstrap_from_env() -> Result<Container, ServiceError> {
    let environment = Environment::from_env().map_err(|err| ServiceError::from(CoreError::from(err)))?;
    bootstrap(environment).await
}

/// Configure a fresh container with `module`
///
/// On failure the partially configured container is disposed and the
/// module's error is returned; startup must not continue.
pub async fn bootstrap_with(module: &dyn ContainerModule) -> Result<Container, ServiceError> {
    let container = Container::new();
    tracing::info!(module = module.name(), environment = %module.environment(), "Bootstrapping container");

    match module.configure(&container).await.into_result() {
        Ok(_) => {
            tracing::info!(
                module = module.name(),
                services = container.registered_tokens().len(),
                "Container ready"
            );
            Ok(container)
        }
        Err(err) => {
            tracing::error!(module = module.name(), code = %err.code, error = %err.message, "Bootstrap failed");
            if let Some(teardown) = container.dispose().await.error() {
                tracing::warn!(code = %teardown.code, "Teardown after failed bootstrap reported errors");
            }
            Err(err)
        }
    }
}
