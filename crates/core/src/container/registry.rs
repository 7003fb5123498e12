use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::container::container::Container;
use crate::container::lifecycle::{Disposable, TrackedService};
use crate::container::scope::ServiceScope;
use crate::errors::CoreError;

/// Type-erased service instance; always holds an `Arc<T>` for the registered `T`
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Factory erased over the service type
pub(crate) type ErasedFactory = Arc<dyn Fn(Container) -> BoxFuture<Result<Created, CoreError>> + Send + Sync>;

/// Output of one factory invocation
pub(crate) struct Created {
    pub(crate) instance: Instance,
    pub(crate) disposer: Option<Arc<dyn Disposable>>,
}

impl Created {
    pub(crate) fn plain<T>(service: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self {
            instance: Arc::new(service),
            disposer: None,
        }
    }

    pub(crate) fn disposable<T>(service: Arc<T>) -> Self
    where
        T: ?Sized + Disposable + 'static,
    {
        Self {
            instance: Arc::new(service.clone()),
            disposer: Some(Arc::new(TrackedService(service))),
        }
    }
}

/// Registration entry binding a token to a factory and a lifetime
#[derive(Clone)]
pub struct ServiceEntry {
    /// Distinguishes successive registrations of the same token
    pub(crate) id: u64,
    pub token: String,
    pub lifetime: ServiceScope,
    pub type_name: &'static str,
    pub(crate) factory: ErasedFactory,
    /// Singleton (and scope-less scoped) construction cell
    pub(crate) singleton: Arc<OnceCell<Instance>>,
}

impl std::fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEntry")
            .field("id", &self.id)
            .field("token", &self.token)
            .field("lifetime", &self.lifetime)
            .field("type_name", &self.type_name)
            .field("constructed", &self.is_constructed())
            .finish()
    }
}

impl ServiceEntry {
    /// Whether a cached singleton instance exists
    pub fn is_constructed(&self) -> bool {
        self.singleton.initialized()
    }
}

/// Token -> registration map; the last registration for a token wins
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    entries: HashMap<String, ServiceEntry>,
    next_id: u64,
}

impl ServiceRegistry {
    /// Create a new service registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a registration, replacing (and so un-caching) any previous one
    pub(crate) fn insert(
        &mut self,
        token: String,
        lifetime: ServiceScope,
        type_name: &'static str,
        factory: ErasedFactory,
    ) -> Option<ServiceEntry> {
        self.next_id += 1;
        let entry = ServiceEntry {
            id: self.next_id,
            token: token.clone(),
            lifetime,
            type_name,
            factory,
            singleton: Arc::new(OnceCell::new()),
        };
        self.entries.insert(token, entry)
    }

    pub fn get(&self, token: &str) -> Option<&ServiceEntry> {
        self.entries.get(token)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    /// Registered tokens in sorted order
    pub fn tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self.entries.keys().cloned().collect();
        tokens.sort();
        tokens
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries holding a cached singleton
    pub fn constructed_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_constructed()).count()
    }

    /// Drop every registration together with its cached instance
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
