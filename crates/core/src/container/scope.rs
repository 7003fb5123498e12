use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use crate::container::lifecycle::{dispose_in_reverse, DisposalTracker, Disposable};
use crate::container::registry::{Instance, ServiceEntry};
use crate::errors::{CoreError, DisposalFailure};

/// Unique identifier of a resolution scope
pub type ScopeId = uuid::Uuid;

/// Service lifetime enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceScope {
    /// Single instance shared across the container
    Singleton,
    /// New instance created for each resolve
    Transient,
    /// Instance shared within one scope (e.g. a request); singleton outside a scope
    Scoped,
}

impl ServiceScope {
    /// Check if the scope is singleton
    pub fn is_singleton(&self) -> bool {
        matches!(self, ServiceScope::Singleton)
    }

    /// Check if the scope is transient
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceScope::Transient)
    }

    /// Check if the scope is scoped
    pub fn is_scoped(&self) -> bool {
        matches!(self, ServiceScope::Scoped)
    }

    /// Get the scope name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceScope::Singleton => "singleton",
            ServiceScope::Transient => "transient",
            ServiceScope::Scoped => "scoped",
        }
    }
}

impl Default for ServiceScope {
    fn default() -> Self {
        ServiceScope::Singleton
    }
}

impl std::fmt::Display for ServiceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ServiceScope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "singleton" => Ok(ServiceScope::Singleton),
            "transient" => Ok(ServiceScope::Transient),
            "scoped" => Ok(ServiceScope::Scoped),
            _ => Err(CoreError::configuration(format!(
                "invalid service lifetime '{}', expected singleton, transient or scoped",
                s
            ))),
        }
    }
}

#[derive(Default)]
struct ScopeState {
    /// token -> (registration id, per-scope construction cell)
    instances: HashMap<String, (u64, Arc<OnceCell<Instance>>)>,
    disposables: DisposalTracker,
    ended: bool,
}

/// Cache and disposal list owned by one unit of work
///
/// Must not be shared between concurrent units of work.
pub struct ScopedServiceManager {
    scope_id: ScopeId,
    state: Mutex<ScopeState>,
}

impl std::fmt::Debug for ScopedServiceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedServiceManager")
            .field("scope_id", &self.scope_id)
            .field("service_count", &self.service_count())
            .field("is_ended", &self.is_ended())
            .finish()
    }
}

impl ScopedServiceManager {
    /// Create a new scoped service manager
    pub fn new() -> Self {
        Self {
            scope_id: uuid::Uuid::new_v4(),
            state: Mutex::new(ScopeState::default()),
        }
    }

    /// Get the scope ID
    pub fn scope_id(&self) -> ScopeId {
        self.scope_id
    }

    /// Number of scoped services constructed in this scope
    pub fn service_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.instances.values().filter(|(_, cell)| cell.initialized()).count())
            .unwrap_or(0)
    }

    pub fn is_ended(&self) -> bool {
        self.state.lock().map(|state| state.ended).unwrap_or(true)
    }

    /// Construction cell for `entry` in this scope, replaced if the token was re-registered
    pub(crate) fn cell_for(&self, entry: &ServiceEntry) -> Result<Arc<OnceCell<Instance>>, CoreError> {
        let mut state = self.lock()?;
        if state.ended {
            return Err(CoreError::ScopeEnded {
                scope_id: self.scope_id,
                token: entry.token.clone(),
            });
        }

        let slot = state
            .instances
            .entry(entry.token.clone())
            .or_insert_with(|| (entry.id, Arc::new(OnceCell::new())));
        if slot.0 != entry.id {
            *slot = (entry.id, Arc::new(OnceCell::new()));
        }
        Ok(slot.1.clone())
    }

    pub(crate) fn ensure_active(&self, token: &str) -> Result<(), CoreError> {
        if self.lock()?.ended {
            return Err(CoreError::ScopeEnded {
                scope_id: self.scope_id,
                token: token.to_string(),
            });
        }
        Ok(())
    }

    /// Track an instance for disposal at scope end
    pub(crate) fn track(&self, token: &str, service: Arc<dyn Disposable>) -> Result<(), CoreError> {
        let mut state = self.lock()?;
        if state.ended {
            return Err(CoreError::ScopeEnded {
                scope_id: self.scope_id,
                token: token.to_string(),
            });
        }
        state.disposables.track(token, service);
        Ok(())
    }

    /// End the scope: dispose tracked services last-created first and clear the cache
    ///
    /// Ending an already ended scope does nothing.
    pub(crate) async fn end(&self) -> Vec<DisposalFailure> {
        let tracked = match self.state.lock() {
            Ok(mut state) => {
                if state.ended {
                    return Vec::new();
                }
                state.ended = true;
                state.instances.clear();
                state.disposables.take()
            }
            Err(_) => {
                return vec![DisposalFailure {
                    token: format!("scope:{}", self.scope_id),
                    message: "scope state lock poisoned".to_string(),
                }]
            }
        };

        tracing::debug!(scope_id = %self.scope_id, disposables = tracked.len(), "Ending scope");
        dispose_in_reverse(tracked).await
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ScopeState>, CoreError> {
        self.state
            .lock()
            .map_err(|_| CoreError::lock(format!("scope:{}", self.scope_id)))
    }
}

impl Drop for ScopedServiceManager {
    fn drop(&mut self) {
        let Ok(state) = self.state.get_mut() else {
            return;
        };
        if state.ended || state.disposables.is_empty() {
            return;
        }

        // Every handle was dropped without ending the scope.
        let tracked = state.disposables.take();
        let scope_id = self.scope_id;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::debug!(scope_id = %scope_id, disposables = tracked.len(), "Disposing abandoned scope");
                runtime.spawn(async move {
                    for failure in dispose_in_reverse(tracked).await {
                        tracing::warn!(scope_id = %scope_id, token = %failure.token, error = %failure.message, "Abandoned scope disposal failed");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    scope_id = %scope_id,
                    disposables = tracked.len(),
                    "Scope dropped outside a runtime; its services were not disposed"
                );
            }
        }
    }
}

impl Default for ScopedServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_scope_from_str() {
        assert_eq!("singleton".parse::<ServiceScope>().unwrap(), ServiceScope::Singleton);
        assert_eq!("Transient".parse::<ServiceScope>().unwrap(), ServiceScope::Transient);
        assert_eq!("scoped".parse::<ServiceScope>().unwrap(), ServiceScope::Scoped);

        assert!("invalid".parse::<ServiceScope>().is_err());
    }

    #[test]
    fn test_service_scope_display() {
        assert_eq!(format!("{}", ServiceScope::Singleton), "singleton");
        assert_eq!(format!("{}", ServiceScope::Transient), "transient");
        assert_eq!(format!("{}", ServiceScope::Scoped), "scoped");
    }

    #[tokio::test]
    async fn test_ended_scope_rejects_work() {
        let scope = ScopedServiceManager::new();
        assert!(!scope.is_ended());
        assert!(scope.end().await.is_empty());
        assert!(scope.is_ended());

        let err = scope.ensure_active("IRequestContext").unwrap_err();
        assert!(matches!(err, CoreError::ScopeEnded { ref token, .. } if token == "IRequestContext"));
        assert_eq!(err.code(), "SCOPE_ENDED");
    }
}
