use thiserror::Error;

/// Core error type for the keel container
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Service not registered: '{token}'")]
    ServiceNotRegistered { token: String },

    #[error("Circular dependency detected: {path} (cycle at: '{cycle_service}')")]
    CircularDependency { path: String, cycle_service: String },

    #[error("Container has been disposed; cannot {operation} '{token}'")]
    ContainerDisposed { token: String, operation: String },

    #[error("Service creation failed for '{token}': {source}")]
    ServiceCreationFailed {
        token: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Service '{token}' is not of the requested type '{expected}'")]
    ServiceTypeMismatch { token: String, expected: String },

    #[error("Invalid service token: {message}")]
    InvalidToken { message: String },

    #[error("Scope {scope_id} has ended; cannot resolve '{token}'")]
    ScopeEnded { scope_id: uuid::Uuid, token: String },

    #[error("Disposal failed for {} service(s): {}", .failures.len(), summarize(.failures))]
    DisposalFailed { failures: Vec<DisposalFailure> },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Lock error on resource: {resource}")]
    LockError { resource: String },

    #[error("Module '{module}' failed: {message}")]
    Module { module: String, message: String },
}

/// A single teardown failure collected during disposal
#[derive(Debug, Clone)]
pub struct DisposalFailure {
    pub token: String,
    pub message: String,
}

fn summarize(failures: &[DisposalFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("'{}': {}", f.token, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl CoreError {
    /// Create a service-not-registered error
    pub fn not_registered(token: impl Into<String>) -> Self {
        Self::ServiceNotRegistered {
            token: token.into(),
        }
    }

    /// Create a container-disposed error for the given operation
    pub fn disposed(token: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::ContainerDisposed {
            token: token.into(),
            operation: operation.into(),
        }
    }

    /// Wrap an arbitrary error raised by a factory
    pub fn creation_failed(
        token: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ServiceCreationFailed {
            token: token.into(),
            source: source.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a module error
    pub fn module(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Module {
            module: module.into(),
            message: message.into(),
        }
    }

    pub(crate) fn lock(resource: impl Into<String>) -> Self {
        Self::LockError {
            resource: resource.into(),
        }
    }

    /// Stable taxonomy code for this error
    pub fn code(&self) -> String {
        match self {
            Self::ServiceNotRegistered { .. } => "SERVICE_NOT_REGISTERED".to_string(),
            Self::CircularDependency { .. } => "CIRCULAR_DEPENDENCY".to_string(),
            Self::ContainerDisposed { .. } => "CONTAINER_DISPOSED".to_string(),
            Self::ServiceCreationFailed { .. } => "SERVICE_CREATION_FAILED".to_string(),
            Self::ServiceTypeMismatch { .. } => "SERVICE_TYPE_MISMATCH".to_string(),
            Self::InvalidToken { .. } => "INVALID_TOKEN".to_string(),
            Self::ScopeEnded { .. } => "SCOPE_ENDED".to_string(),
            Self::DisposalFailed { .. } => "DISPOSAL_FAILED".to_string(),
            Self::Configuration { .. } => "CONFIGURATION_ERROR".to_string(),
            Self::LockError { .. } => "LOCK_ERROR".to_string(),
            Self::Module { module, .. } => module_error_code(module),
        }
    }

    /// Check if the error is a missing registration
    pub fn is_not_registered(&self) -> bool {
        matches!(self, Self::ServiceNotRegistered { .. })
    }

    /// Check if the error is a dependency cycle
    pub fn is_circular(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }

    /// Check if the error was raised because the container is torn down
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::ContainerDisposed { .. })
    }
}

/// `<MODULE>_MODULE_ERROR` code for a module name such as `"file-storage"`
pub fn module_error_code(module: &str) -> String {
    let normalized: String = module
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{}_MODULE_ERROR", normalized)
}
