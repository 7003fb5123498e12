//! Uniform success/failure envelope returned by module configuration,
//! container teardown and adapter operations.
//!
//! Serialises to the wire shape
//! `{"success": true, "data": ..., "metadata": {...}}` or
//! `{"success": false, "error": {"code": ..., "message": ..., "details": {...}}}`.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::errors::CoreError;

/// Error branch of a [`ServiceResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ServiceError {
    /// Create a new service error
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured details
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ServiceError {}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        let details = match &err {
            CoreError::ServiceNotRegistered { token }
            | CoreError::ServiceTypeMismatch { token, .. }
            | CoreError::ContainerDisposed { token, .. } => Some(json!({ "token": token })),
            CoreError::CircularDependency { path, cycle_service } => {
                Some(json!({ "path": path, "token": cycle_service }))
            }
            CoreError::ServiceCreationFailed { token, source } => {
                Some(json!({ "token": token, "originalError": source.to_string() }))
            }
            CoreError::DisposalFailed { failures } => Some(json!({
                "failures": failures
                    .iter()
                    .map(|f| json!({ "token": f.token, "message": f.message }))
                    .collect::<Vec<_>>(),
            })),
            _ => None,
        };

        Self {
            code: err.code(),
            message: err.to_string(),
            details,
        }
    }
}

/// Tagged success/failure envelope
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceResult<T> {
    Success {
        data: Option<T>,
        metadata: Option<Map<String, Value>>,
    },
    Failure(ServiceError),
}

impl<T> ServiceResult<T> {
    /// Successful result carrying data
    pub fn ok_with(data: T) -> Self {
        Self::Success {
            data: Some(data),
            metadata: None,
        }
    }

    /// Failed result
    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failure(ServiceError::new(code, message))
    }

    /// Add a metadata entry; no-op on failures
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Self::Success { metadata, .. } = &mut self {
            metadata
                .get_or_insert_with(Map::new)
                .insert(key.into(), value.into());
        }
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Data of a successful result
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data, .. } => data.as_ref(),
            Self::Failure(_) => None,
        }
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Success { metadata, .. } => metadata.as_ref(),
            Self::Failure(_) => None,
        }
    }

    /// Error of a failed result
    pub fn error(&self) -> Option<&ServiceError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure(err) => Some(err),
        }
    }

    /// Convert into a plain `Result` for `?`-style handling
    pub fn into_result(self) -> Result<Option<T>, ServiceError> {
        match self {
            Self::Success { data, .. } => Ok(data),
            Self::Failure(err) => Err(err),
        }
    }
}

impl ServiceResult<()> {
    /// Successful result without data
    pub fn ok() -> Self {
        Self::Success {
            data: None,
            metadata: None,
        }
    }
}

impl<T> From<CoreError> for ServiceResult<T> {
    fn from(err: CoreError) -> Self {
        Self::Failure(err.into())
    }
}

impl<T> From<ServiceError> for ServiceResult<T> {
    fn from(err: ServiceError) -> Self {
        Self::Failure(err)
    }
}

impl<T> From<Result<T, CoreError>> for ServiceResult<T> {
    fn from(result: Result<T, CoreError>) -> Self {
        match result {
            Ok(data) => Self::ok_with(data),
            Err(err) => err.into(),
        }
    }
}

impl<T: Serialize> Serialize for ServiceResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Success { data, metadata } => {
                let len = 1 + usize::from(data.is_some()) + usize::from(metadata.is_some());
                let mut state = serializer.serialize_struct("ServiceResult", len)?;
                state.serialize_field("success", &true)?;
                if let Some(data) = data {
                    state.serialize_field("data", data)?;
                }
                if let Some(metadata) = metadata {
                    state.serialize_field("metadata", metadata)?;
                }
                state.end()
            }
            Self::Failure(error) => {
                let mut state = serializer.serialize_struct("ServiceResult", 2)?;
                state.serialize_field("success", &false)?;
                state.serialize_field("error", error)?;
                state.end()
            }
        }
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    metadata: Option<Map<String, Value>>,
    error: Option<ServiceError>,
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for ServiceResult<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let envelope = Envelope::<T>::deserialize(deserializer)?;
        if envelope.success {
            Ok(Self::Success {
                data: envelope.data,
                metadata: envelope.metadata,
            })
        } else {
            envelope
                .error
                .map(Self::Failure)
                .ok_or_else(|| de::Error::missing_field("error"))
        }
    }
}
