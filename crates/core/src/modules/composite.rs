use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::Environment;
use crate::container::Container;
use crate::errors::{module_error_code, CoreError, ServiceError, ServiceResult};
use crate::modules::definition::ContainerModule;

/// Module that configures an ordered list of child modules
///
/// Children are configured one after another, each awaited before the next,
/// so a child may resolve anything an earlier child registered. The first
/// failing child stops the sequence and its failure is returned unchanged;
/// registrations made by earlier children are kept.
pub struct CompositeModule {
    name: String,
    environment: Environment,
    children: Vec<Box<dyn ContainerModule>>,
}

impl std::fmt::Debug for CompositeModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeModule")
            .field("name", &self.name)
            .field("environment", &self.environment)
            .field("children", &self.child_names())
            .finish()
    }
}

impl CompositeModule {
    /// Create a new composite module with no children
    pub fn new(name: impl Into<String>, environment: Environment) -> Self {
        Self {
            name: name.into(),
            environment,
            children: Vec::new(),
        }
    }

    /// Append a child; dependency-providing children must come first
    pub fn with_child<M: ContainerModule + 'static>(mut self, child: M) -> Self {
        self.children.push(Box::new(child));
        self
    }

    /// Append an already boxed child
    pub fn with_boxed_child(mut self, child: Box<dyn ContainerModule>) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(&self) -> &[Box<dyn ContainerModule>] {
        &self.children
    }

    pub fn child_names(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.name()).collect()
    }

    async fn configure_children(&self, container: &Container) -> ServiceResult<()> {
        for child in &self.children {
            tracing::debug!(composite = %self.name, module = child.name(), "Configuring child module");
            let result = child.configure(container).await;
            if result.is_failure() {
                tracing::error!(
                    composite = %self.name,
                    module = child.name(),
                    "Child module failed; skipping remaining children"
                );
                return result;
            }
        }
        ServiceResult::ok()
    }
}

#[async_trait]
impl ContainerModule for CompositeModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn environment(&self) -> Environment {
        self.environment
    }

    /// Union of the children's tokens, in configuration order
    fn provides(&self) -> Vec<&'static str> {
        let mut tokens: Vec<&'static str> = Vec::new();
        for token in self.children.iter().flat_map(|c| c.provides()) {
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
        tokens
    }

    async fn register(&self, container: &Container) -> Result<(), CoreError> {
        match self.configure_children(container).await {
            ServiceResult::Failure(err) => Err(CoreError::module(self.name.clone(), err.to_string())),
            ServiceResult::Success { .. } => Ok(()),
        }
    }

    async fn configure(&self, container: &Container) -> ServiceResult<()> {
        let result = self.configure_children(container).await;
        if result.is_failure() {
            return result;
        }

        let provides = self.provides();
        tracing::info!(
            module = %self.name,
            environment = %self.environment,
            children = self.children.len(),
            services = provides.len(),
            "Configured composite module"
        );
        ServiceResult::ok()
            .with_metadata("environment", self.environment.as_str())
            .with_metadata("registeredServices", provides)
    }
}

/// Configure `module`, failing with its module error if `timeout` elapses first
///
/// Factories have no implicit timeout; this bounds startup from the outside.
/// Registrations made before the deadline are kept.
pub async fn configure_with_timeout(
    module: &dyn ContainerModule,
    container: &Container,
    timeout: Duration,
) -> ServiceResult<()> {
    match tokio::time::timeout(timeout, module.configure(container)).await {
        Ok(result) => result,
        Err(_) => {
            let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            tracing::error!(module = module.name(), timeout_ms, "Module configuration timed out");
            ServiceResult::Failure(
                ServiceError::new(
                    module_error_code(module.name()),
                    format!("{} module configuration timed out after {}ms", module.name(), timeout_ms),
                )
                .with_details(json!({ "module": module.name(), "timeoutMs": timeout_ms })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ServiceScope;
    use std::sync::{Arc, Mutex};

    struct StepModule {
        name: &'static str,
        token: &'static str,
        fail: bool,
        delay: Option<Duration>,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl StepModule {
        fn new(name: &'static str, token: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Self {
            Self { name, token, fail: false, delay: None, log: log.clone() }
        }
    }

    #[async_trait]
    impl ContainerModule for StepModule {
        fn name(&self) -> &str {
            self.name
        }

        fn environment(&self) -> Environment {
            Environment::Test
        }

        fn provides(&self) -> Vec<&'static str> {
            vec![self.token]
        }

        async fn register(&self, container: &Container) -> Result<(), CoreError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                return Err(CoreError::configuration(format!("{} unavailable", self.name)));
            }
            let value = self.name.to_string();
            container.register_factory(self.token, ServiceScope::Singleton, move |_| Ok(Arc::new(value.clone())))
        }
    }

    #[tokio::test]
    async fn test_children_configured_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let composite = CompositeModule::new("app", Environment::Test)
            .with_child(StepModule::new("config", "IConfig", &log))
            .with_child(StepModule::new("logger", "ILogger", &log));
        let container = Container::new();

        let result = composite.configure(&container).await;

        assert!(result.is_success());
        assert_eq!(*log.lock().unwrap(), vec!["config", "logger"]);
        assert_eq!(result.metadata().unwrap()["registeredServices"], json!(["IConfig", "ILogger"]));
        assert_eq!(composite.child_names(), vec!["config", "logger"]);
    }

    #[tokio::test]
    async fn test_fail_fast_returns_child_failure_unchanged() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut failing = StepModule::new("database", "IDatabase", &log);
        failing.fail = true;
        let composite = CompositeModule::new("app", Environment::Test)
            .with_child(StepModule::new("config", "IConfig", &log))
            .with_child(failing)
            .with_child(StepModule::new("cache", "ICache", &log));
        let container = Container::new();

        let result = composite.configure(&container).await;

        assert_eq!(result.error().unwrap().code, "DATABASE_MODULE_ERROR");
        assert_eq!(*log.lock().unwrap(), vec!["config", "database"]);
        assert!(container.is_registered("IConfig"));
        assert!(!container.is_registered("ICache"));
    }

    #[tokio::test]
    async fn test_nested_composite_register_maps_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut failing = StepModule::new("queue", "IQueue", &log);
        failing.fail = true;
        let inner = CompositeModule::new("messaging", Environment::Test).with_child(failing);
        let container = Container::new();

        let err = inner.register(&container).await.unwrap_err();
        assert_eq!(err.code(), "MESSAGING_MODULE_ERROR");
        assert!(err.to_string().contains("QUEUE_MODULE_ERROR"));
    }

    #[tokio::test]
    async fn test_configure_with_timeout_elapsed() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut slow = StepModule::new("metrics", "IMetrics", &log);
        slow.delay = Some(Duration::from_millis(200));
        let container = Container::new();

        let result = configure_with_timeout(&slow, &container, Duration::from_millis(10)).await;

        let error = result.error().unwrap();
        assert_eq!(error.code, "METRICS_MODULE_ERROR");
        assert_eq!(error.details.as_ref().unwrap()["timeoutMs"], 10);
        assert!(!container.is_registered("IMetrics"));
    }

    #[tokio::test]
    async fn test_configure_with_timeout_in_time() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let module = StepModule::new("metrics", "IMetrics", &log);
        let container = Container::new();

        let result = configure_with_timeout(&module, &container, Duration::from_secs(5)).await;
        assert!(result.is_success());
        assert!(container.is_registered("IMetrics"));
    }
}
