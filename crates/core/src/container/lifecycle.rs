use std::sync::Arc;
use async_trait::async_trait;

use crate::errors::{CoreError, DisposalFailure};

/// Trait for services that need proper disposal/cleanup
///
/// Services with synchronous teardown simply do their work without awaiting.
#[async_trait]
pub trait Disposable: Send + Sync {
    /// Dispose of the service and clean up resources
    async fn dispose(&self) -> Result<(), CoreError>;
}

/// Forwards disposal to a possibly unsized service (`dyn Trait` where `Trait: Disposable`)
pub(crate) struct TrackedService<T: ?Sized>(pub(crate) Arc<T>);

#[async_trait]
impl<T> Disposable for TrackedService<T>
where
    T: ?Sized + Disposable + 'static,
{
    async fn dispose(&self) -> Result<(), CoreError> {
        self.0.dispose().await
    }
}

pub(crate) struct TrackedDisposable {
    pub(crate) token: String,
    pub(crate) service: Arc<dyn Disposable>,
}

/// Ordered record of constructed disposables, oldest first
#[derive(Default)]
pub struct DisposalTracker {
    entries: Vec<TrackedDisposable>,
}

impl std::fmt::Debug for DisposalTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisposalTracker")
            .field("tokens", &self.entries.iter().map(|e| e.token.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

impl DisposalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly constructed service
    pub fn track(&mut self, token: impl Into<String>, service: Arc<dyn Disposable>) {
        self.entries.push(TrackedDisposable {
            token: token.into(),
            service,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn take(&mut self) -> Vec<TrackedDisposable> {
        std::mem::take(&mut self.entries)
    }
}

/// Dispose services last-created first, awaiting each before the next
///
/// A failing service does not stop the sequence; every failure is returned.
pub(crate) async fn dispose_in_reverse(tracked: Vec<TrackedDisposable>) -> Vec<DisposalFailure> {
    let mut failures = Vec::new();

    for entry in tracked.into_iter().rev() {
        tracing::debug!(token = %entry.token, "Disposing service");
        if let Err(e) = entry.service.dispose().await {
            tracing::warn!(token = %entry.token, error = %e, "Service disposal failed");
            failures.push(DisposalFailure {
                token: entry.token,
                message: e.to_string(),
            });
        }
    }

    failures
}
