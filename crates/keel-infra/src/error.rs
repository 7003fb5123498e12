use keel_core::{ConfigError, CoreError, ServiceError, ServiceResult};
use serde_json::json;
use thiserror::Error;

/// Error raised by a capability adapter
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Adapter '{0}' has been closed")]
    Closed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for adapter internals
pub type AdapterResult<T> = Result<T, AdapterError>;

impl AdapterError {
    /// Stable code carried in the failure envelope
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Closed(_) => "ADAPTER_CLOSED",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Http(_) => "HTTP_ERROR",
            Self::Url(_) => "INVALID_URL",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Backend(_) => "BACKEND_ERROR",
        }
    }
}

impl From<AdapterError> for ServiceError {
    fn from(err: AdapterError) -> Self {
        ServiceError::new(err.code(), err.to_string())
            .with_details(json!({ "originalError": err.to_string() }))
    }
}

impl<T> From<AdapterError> for ServiceResult<T> {
    fn from(err: AdapterError) -> Self {
        ServiceResult::Failure(err.into())
    }
}

/// Conversion of adapter results into the failure envelope
pub trait IntoServiceResult<T> {
    fn into_service_result(self) -> ServiceResult<T>;
}

impl<T> IntoServiceResult<T> for AdapterResult<T> {
    fn into_service_result(self) -> ServiceResult<T> {
        match self {
            Ok(data) => ServiceResult::ok_with(data),
            Err(err) => err.into(),
        }
    }
}

/// Wrap an adapter error raised while constructing `token`
pub fn creation_failed(token: &str, err: AdapterError) -> CoreError {
    CoreError::creation_failed(token, err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_error_envelope() {
        let result: ServiceResult<()> = AdapterError::NotFound("users/42".into()).into();
        let error = result.error().unwrap();

        assert_eq!(error.code, "NOT_FOUND");
        assert!(error.message.contains("users/42"));
        assert_eq!(error.details.as_ref().unwrap()["originalError"], "Not found: users/42");
    }

    #[test]
    fn test_into_service_result() {
        let ok: AdapterResult<u8> = Ok(3);
        assert_eq!(ok.into_service_result().data(), Some(&3));

        let err: AdapterResult<u8> = Err(AdapterError::Closed("queue".into()));
        assert_eq!(err.into_service_result().error().unwrap().code, "ADAPTER_CLOSED");
    }

    #[test]
    fn test_creation_failed_keeps_token() {
        let err = creation_failed("IHttpClient", AdapterError::InvalidInput("bad base url".into()));
        assert_eq!(err.code(), "SERVICE_CREATION_FAILED");
        assert!(err.to_string().contains("IHttpClient"));
        assert!(err.to_string().contains("bad base url"));
    }
}
