use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use crate::config::Environment;
use crate::container::Container;
use crate::errors::{module_error_code, CoreError, ServiceError, ServiceResult};

/// Stateless configuration unit that registers services into a container
///
/// Implementors provide [`ContainerModule::register`]; the provided
/// [`ContainerModule::configure`] turns the outcome into a [`ServiceResult`]
/// so module failures never escape as a Rust `Err`.
#[async_trait]
pub trait ContainerModule: Send + Sync {
    /// Module name; also the prefix of its `<MODULE>_MODULE_ERROR` code
    fn name(&self) -> &str;

    /// Environment the module was constructed for
    fn environment(&self) -> Environment;

    /// Tokens this module registers
    fn provides(&self) -> Vec<&'static str> {
        vec![]
    }

    /// Register this module's factories
    async fn register(&self, container: &Container) -> Result<(), CoreError>;

    /// Configure the container, reporting failure as the module error envelope
    async fn configure(&self, container: &Container) -> ServiceResult<()> {
        let name = self.name();
        let environment = self.environment();

        match self.register(container).await {
            Ok(()) => {
                let provides = self.provides();
                tracing::info!(
                    module = name,
                    environment = %environment,
                    services = ?provides,
                    "Configured module"
                );
                ServiceResult::ok()
                    .with_metadata("environment", environment.as_str())
                    .with_metadata("registeredServices", provides)
            }
            Err(err) => {
                tracing::error!(module = name, environment = %environment, error = %err, "Module configuration failed");
                ServiceResult::Failure(module_failure(name, &err))
            }
        }
    }
}

/// Module error envelope for a failed registration
pub fn module_failure(module: &str, err: &CoreError) -> ServiceError {
    ServiceError::new(
        module_error_code(module),
        format!("Failed to configure {} module: {}", module, err),
    )
    .with_details(json!({
        "module": module,
        "originalError": err.to_string(),
        "originalCode": err.code(),
    }))
}

/// Module metadata for introspection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleMetadata {
    pub name: String,
    pub environment: Environment,
    pub provides: Vec<String>,
}

impl ModuleMetadata {
    /// Create metadata from a module
    pub fn from_module<M: ContainerModule + ?Sized>(module: &M) -> Self {
        Self {
            name: module.name().to_string(),
            environment: module.environment(),
            provides: module.provides().iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ServiceScope;
    use std::sync::Arc;

    struct ClockModule {
        environment: Environment,
        fail: bool,
    }

    #[async_trait]
    impl ContainerModule for ClockModule {
        fn name(&self) -> &str {
            "clock"
        }

        fn environment(&self) -> Environment {
            self.environment
        }

        fn provides(&self) -> Vec<&'static str> {
            vec!["IClock"]
        }

        async fn register(&self, container: &Container) -> Result<(), CoreError> {
            if self.fail {
                return Err(CoreError::configuration("clock source unavailable"));
            }
            container.register_factory("IClock", ServiceScope::Singleton, |_| Ok(Arc::new(42u64)))
        }
    }

    #[tokio::test]
    async fn test_configure_success_metadata() {
        let container = Container::new();
        let module = ClockModule { environment: Environment::Test, fail: false };

        let result = module.configure(&container).await;
        assert!(result.is_success());

        let metadata = result.metadata().unwrap();
        assert_eq!(metadata["environment"], "test");
        assert_eq!(metadata["registeredServices"], json!(["IClock"]));
        assert!(container.is_registered("IClock"));
    }

    #[tokio::test]
    async fn test_configure_failure_envelope() {
        let container = Container::new();
        let module = ClockModule { environment: Environment::Production, fail: true };

        let result = module.configure(&container).await;
        let error = result.error().unwrap();

        assert_eq!(error.code, "CLOCK_MODULE_ERROR");
        assert!(error.message.contains("clock source unavailable"));
        let details = error.details.as_ref().unwrap();
        assert!(details["originalError"].as_str().unwrap().contains("clock source unavailable"));
        assert_eq!(details["originalCode"], "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_metadata_from_module() {
        let module = ClockModule { environment: Environment::Development, fail: false };
        let metadata = ModuleMetadata::from_module(&module);

        assert_eq!(metadata.name, "clock");
        assert_eq!(metadata.environment, Environment::Development);
        assert_eq!(metadata.provides, vec!["IClock".to_string()]);
    }
}
