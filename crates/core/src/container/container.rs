use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use tokio::sync::futures::Notified;
use tokio::sync::Notify;

use crate::container::lifecycle::{dispose_in_reverse, DisposalTracker, Disposable, TrackedDisposable};
use crate::container::registry::{BoxFuture, Created, ErasedFactory, Instance, ServiceEntry, ServiceRegistry};
use crate::container::resolver::ResolutionPath;
use crate::container::scope::{ScopeId, ScopedServiceManager, ServiceScope};
use crate::errors::{CoreError, ServiceResult};

/// Container lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Active,
    Disposing,
    Disposed,
}

#[derive(Debug)]
struct ContainerState {
    registry: ServiceRegistry,
    disposables: DisposalTracker,
    scopes: HashMap<ScopeId, Weak<ScopedServiceManager>>,
    /// Singleton under construction -> token its chain is currently resolving
    waiting: HashMap<String, String>,
    status: ContainerStatus,
}

#[derive(Debug, Default)]
struct InnerStats {
    total_resolutions: AtomicU64,
    singleton_cache_hits: AtomicU64,
    singleton_cache_misses: AtomicU64,
    transient_creations: AtomicU64,
    scoped_creations: AtomicU64,
}

#[derive(Debug)]
struct ContainerInner {
    state: RwLock<ContainerState>,
    stats: InnerStats,
    teardown_finished: Notify,
}

enum Teardown<'a> {
    Finished,
    InProgress(Notified<'a>),
    Start {
        tracked: Vec<TrackedDisposable>,
        scopes: Vec<Arc<ScopedServiceManager>>,
    },
}

/// Wait-for edges recorded while a chain resolves a singleton
///
/// Dropping restores the edges the chain had before, so nested resolutions
/// unwind to the outer dependency being awaited.
struct WaitEdges {
    inner: Arc<ContainerInner>,
    previous: Vec<(String, Option<String>)>,
}

impl Drop for WaitEdges {
    fn drop(&mut self) {
        if let Ok(mut state) = self.inner.state.write() {
            for (owner, previous) in self.previous.drain(..) {
                match previous {
                    Some(target) => state.waiting.insert(owner, target),
                    None => state.waiting.remove(&owner),
                };
            }
        }
    }
}

/// Container statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerStats {
    pub total_resolutions: u64,
    pub singleton_cache_hits: u64,
    pub singleton_cache_misses: u64,
    pub transient_creations: u64,
    pub scoped_creations: u64,
    pub registered_services: usize,
    pub active_singletons: usize,
}

impl ContainerStats {
    /// Singleton cache hit rate in percent
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.singleton_cache_hits + self.singleton_cache_misses;
        if total == 0 {
            0.0
        } else {
            (self.singleton_cache_hits as f64 / total as f64) * 100.0
        }
    }
}

/// Token-addressed service container
///
/// `Container` is a cheap handle; clones share the same registry, singleton
/// cache and disposal list. Handles returned by [`Container::create_scope`]
/// additionally carry a scope, and the handle a factory receives carries the
/// chain of tokens being constructed so cycles are detected.
///
/// ```rust,no_run
/// use keel_core::container::{Container, ServiceScope};
/// use std::sync::Arc;
///
/// struct Clock;
/// struct Scheduler { clock: Arc<Clock> }
///
/// # async fn run() -> Result<(), keel_core::CoreError> {
/// let container = Container::new();
/// container.register_factory("IClock", ServiceScope::Singleton, |_| Ok(Arc::new(Clock)))?;
/// container.register_async_factory("IScheduler", ServiceScope::Singleton, |c| async move {
///     let clock = c.resolve::<Clock>("IClock").await?;
///     Ok(Arc::new(Scheduler { clock }))
/// })?;
///
/// let scheduler = container.resolve::<Scheduler>("IScheduler").await?;
/// container.dispose().await;
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
    scope: Option<Arc<ScopedServiceManager>>,
    path: ResolutionPath,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("scope_id", &self.scope_id())
            .field("resolution_path", &self.path.path_string())
            .field("registered_services", &self.registered_tokens())
            .finish()
    }
}

impl Container {
    /// Create a new, empty container
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                state: RwLock::new(ContainerState {
                    registry: ServiceRegistry::new(),
                    disposables: DisposalTracker::new(),
                    scopes: HashMap::new(),
                    waiting: HashMap::new(),
                    status: ContainerStatus::Active,
                }),
                stats: InnerStats::default(),
                teardown_finished: Notify::new(),
            }),
            scope: None,
            path: ResolutionPath::new(),
        }
    }

    // ---- registration -------------------------------------------------

    /// Register a synchronous factory
    ///
    /// The factory runs eagerly when the token is resolved. Use
    /// [`Container::register_async_factory`] when the factory needs to resolve
    /// its own dependencies or perform I/O.
    pub fn register_factory<T, F>(
        &self,
        token: impl Into<String>,
        lifetime: ServiceScope,
        factory: F,
    ) -> Result<(), CoreError>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Container) -> Result<Arc<T>, CoreError> + Send + Sync + 'static,
    {
        let erased: ErasedFactory = Arc::new(move |container: Container| -> BoxFuture<Result<Created, CoreError>> {
            let created = factory(&container).map(Created::plain);
            Box::pin(std::future::ready(created))
        });
        self.insert(token.into(), lifetime, std::any::type_name::<T>(), erased)
    }

    /// Register an asynchronous factory
    pub fn register_async_factory<T, F, Fut>(
        &self,
        token: impl Into<String>,
        lifetime: ServiceScope,
        factory: F,
    ) -> Result<(), CoreError>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, CoreError>> + Send + 'static,
    {
        let erased: ErasedFactory = Arc::new(move |container: Container| -> BoxFuture<Result<Created, CoreError>> {
            let future = factory(container);
            Box::pin(async move { future.await.map(Created::plain) })
        });
        self.insert(token.into(), lifetime, std::any::type_name::<T>(), erased)
    }

    /// Register a synchronous factory whose instances are disposed on teardown
    pub fn register_disposable_factory<T, F>(
        &self,
        token: impl Into<String>,
        lifetime: ServiceScope,
        factory: F,
    ) -> Result<(), CoreError>
    where
        T: ?Sized + Disposable + 'static,
        F: Fn(&Container) -> Result<Arc<T>, CoreError> + Send + Sync + 'static,
    {
        let erased: ErasedFactory = Arc::new(move |container: Container| -> BoxFuture<Result<Created, CoreError>> {
            let created = factory(&container).map(Created::disposable);
            Box::pin(std::future::ready(created))
        });
        self.insert(token.into(), lifetime, std::any::type_name::<T>(), erased)
    }

    /// Register an asynchronous factory whose instances are disposed on teardown
    pub fn register_async_disposable_factory<T, F, Fut>(
        &self,
        token: impl Into<String>,
        lifetime: ServiceScope,
        factory: F,
    ) -> Result<(), CoreError>
    where
        T: ?Sized + Disposable + 'static,
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, CoreError>> + Send + 'static,
    {
        let erased: ErasedFactory = Arc::new(move |container: Container| -> BoxFuture<Result<Created, CoreError>> {
            let future = factory(container);
            Box::pin(async move { future.await.map(Created::disposable) })
        });
        self.insert(token.into(), lifetime, std::any::type_name::<T>(), erased)
    }

    /// Register an already constructed singleton
    pub fn register_instance<T>(&self, token: impl Into<String>, instance: Arc<T>) -> Result<(), CoreError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register_factory(token, ServiceScope::Singleton, move |_| Ok(instance.clone()))
    }

    fn insert(
        &self,
        token: String,
        lifetime: ServiceScope,
        type_name: &'static str,
        factory: ErasedFactory,
    ) -> Result<(), CoreError> {
        if token.trim().is_empty() {
            return Err(CoreError::InvalidToken {
                message: "service tokens must be non-empty".to_string(),
            });
        }

        let mut state = self.write_state()?;
        if state.status != ContainerStatus::Active {
            return Err(CoreError::disposed(token, "register"));
        }

        let replaced = state.registry.insert(token.clone(), lifetime, type_name, factory);
        tracing::debug!(
            token = %token,
            lifetime = %lifetime,
            service_type = type_name,
            replaced = replaced.is_some(),
            "Registered service factory"
        );
        Ok(())
    }

    // ---- resolution ---------------------------------------------------

    /// Resolve the service registered under `token`
    ///
    /// `T` must be the type the factory produced (`dyn Trait` for trait-object
    /// registrations).
    pub async fn resolve<T>(&self, token: &str) -> Result<Arc<T>, CoreError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let instance = self.resolve_instance(token).await?;
        instance
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or_else(|| CoreError::ServiceTypeMismatch {
                token: token.to_string(),
                expected: std::any::type_name::<T>().to_string(),
            })
    }

    /// Resolve, reporting failure as a [`ServiceResult`]
    pub async fn resolve_result<T>(&self, token: &str) -> ServiceResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve::<T>(token).await.into()
    }

    /// Try to resolve a service, returning None on any failure
    pub async fn try_resolve<T>(&self, token: &str) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve::<T>(token).await.ok()
    }

    async fn resolve_instance(&self, token: &str) -> Result<Instance, CoreError> {
        self.inner.stats.total_resolutions.fetch_add(1, Ordering::Relaxed);

        if self.path.contains(token) {
            let cycle = self.path.with(token);
            tracing::error!(path = %cycle.path_string(), "Circular dependency detected");
            return Err(CoreError::CircularDependency {
                path: cycle.path_string(),
                cycle_service: token.to_string(),
            });
        }

        let entry = self.lookup(token)?;
        if let Some(scope) = &self.scope {
            scope.ensure_active(token)?;
        }

        match (entry.lifetime, &self.scope) {
            (ServiceScope::Singleton, _) | (ServiceScope::Scoped, None) => self.resolve_singleton(&entry).await,
            (ServiceScope::Scoped, Some(scope)) => self.resolve_scoped(&entry, scope).await,
            (ServiceScope::Transient, _) => {
                self.inner.stats.transient_creations.fetch_add(1, Ordering::Relaxed);
                self.construct(&entry, self.scope.clone(), self.path.with(&entry.token))
                    .await
            }
        }
    }

    fn lookup(&self, token: &str) -> Result<ServiceEntry, CoreError> {
        let state = self.read_state()?;
        if state.status != ContainerStatus::Active {
            return Err(CoreError::disposed(token, "resolve"));
        }
        state
            .registry
            .get(token)
            .cloned()
            .ok_or_else(|| CoreError::not_registered(token))
    }

    async fn resolve_singleton(&self, entry: &ServiceEntry) -> Result<Instance, CoreError> {
        if let Some(instance) = entry.singleton.get() {
            self.inner.stats.singleton_cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(instance.clone());
        }
        self.inner.stats.singleton_cache_misses.fetch_add(1, Ordering::Relaxed);

        // Concurrent callers wait on the same cell, so the factory runs once.
        // Singletons never see the caller's scope.
        let _edges = self.enter_wait(&entry.token)?;
        let cell = entry.singleton.clone();
        let instance = cell
            .get_or_try_init(|| self.construct(entry, None, self.path.with_cell(&entry.token)))
            .await?;
        Ok(instance.clone())
    }

    /// Record that this chain's singletons now wait on `target`
    ///
    /// Following the recorded edges from `target` back to a token on this
    /// chain means another task is waiting on us while we wait on it; that is
    /// reported as a cycle instead of awaiting the other task's cell.
    fn enter_wait(&self, target: &str) -> Result<Option<WaitEdges>, CoreError> {
        let owners = self.path.cells();
        if owners.is_empty() {
            return Ok(None);
        }

        let mut state = self.write_state()?;
        if let Some(err) = self.find_wait_cycle(&state.waiting, target) {
            tracing::error!(error = %err, "Circular dependency detected across concurrent resolutions");
            return Err(err);
        }

        let previous = owners
            .iter()
            .map(|owner| {
                let before = state.waiting.insert(owner.clone(), target.to_string());
                (owner.clone(), before)
            })
            .collect();
        Ok(Some(WaitEdges {
            inner: self.inner.clone(),
            previous,
        }))
    }

    fn find_wait_cycle(&self, waiting: &HashMap<String, String>, target: &str) -> Option<CoreError> {
        let mut chain = vec![target.to_string()];
        let mut current = target;

        while let Some(next) = waiting.get(current) {
            chain.push(next.clone());
            if let Some(start) = self.path.position(next) {
                let mut tokens = self.path.tokens()[start..].to_vec();
                tokens.extend(chain);
                return Some(CoreError::CircularDependency {
                    path: tokens.join(" -> "),
                    cycle_service: next.clone(),
                });
            }
            // Edges of other chains may loop among themselves; they detect that.
            if chain.len() > waiting.len() {
                break;
            }
            current = next.as_str();
        }
        None
    }

    async fn resolve_scoped(
        &self,
        entry: &ServiceEntry,
        scope: &Arc<ScopedServiceManager>,
    ) -> Result<Instance, CoreError> {
        let cell = scope.cell_for(entry)?;
        if let Some(instance) = cell.get() {
            return Ok(instance.clone());
        }

        let instance = cell
            .get_or_try_init(|| async {
                self.inner.stats.scoped_creations.fetch_add(1, Ordering::Relaxed);
                self.construct(entry, Some(scope.clone()), self.path.with(&entry.token))
                    .await
            })
            .await?;
        Ok(instance.clone())
    }

    /// Run the factory and record the result for disposal
    async fn construct(
        &self,
        entry: &ServiceEntry,
        scope: Option<Arc<ScopedServiceManager>>,
        path: ResolutionPath,
    ) -> Result<Instance, CoreError> {
        tracing::debug!(
            token = %entry.token,
            lifetime = %entry.lifetime,
            depth = self.path.depth(),
            "Constructing service"
        );

        let child = Container {
            inner: self.inner.clone(),
            scope: scope.clone(),
            path,
        };
        let created = (entry.factory)(child).await?;

        match created.disposer {
            Some(disposer) => {
                let tracked = match &scope {
                    Some(scope) => scope.track(&entry.token, disposer.clone()),
                    None => self.track_root(&entry.token, disposer.clone()),
                };
                if let Err(err) = tracked {
                    // Teardown started while the factory ran; do not leak the instance.
                    if let Err(dispose_err) = disposer.dispose().await {
                        tracing::warn!(token = %entry.token, error = %dispose_err, "Disposal of orphaned service failed");
                    }
                    return Err(err);
                }
            }
            None => self.ensure_active(&entry.token)?,
        }

        Ok(created.instance)
    }

    fn ensure_active(&self, token: &str) -> Result<(), CoreError> {
        if self.read_state()?.status != ContainerStatus::Active {
            return Err(CoreError::disposed(token, "resolve"));
        }
        Ok(())
    }

    fn track_root(&self, token: &str, disposer: Arc<dyn Disposable>) -> Result<(), CoreError> {
        let mut state = self.write_state()?;
        if state.status != ContainerStatus::Active {
            return Err(CoreError::disposed(token, "resolve"));
        }
        state.disposables.track(token, disposer);
        Ok(())
    }

    // ---- scopes -------------------------------------------------------

    /// Open a new scope; the returned handle resolves scoped tokens per scope
    pub fn create_scope(&self) -> Result<Container, CoreError> {
        let scope = Arc::new(ScopedServiceManager::new());
        {
            let mut state = self.write_state()?;
            if state.status != ContainerStatus::Active {
                return Err(CoreError::disposed(format!("scope:{}", scope.scope_id()), "create"));
            }
            // Scopes whose handles were all dropped disposed themselves.
            state.scopes.retain(|_, open| open.strong_count() > 0);
            state.scopes.insert(scope.scope_id(), Arc::downgrade(&scope));
        }

        tracing::debug!(scope_id = %scope.scope_id(), "Created scope");
        Ok(Container {
            inner: self.inner.clone(),
            scope: Some(scope),
            path: ResolutionPath::new(),
        })
    }

    /// Number of scopes created from this container that are still alive
    pub fn open_scope_count(&self) -> usize {
        self.read_state()
            .map(|state| state.scopes.values().filter(|open| open.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// Identifier of the scope this handle is bound to
    pub fn scope_id(&self) -> Option<ScopeId> {
        self.scope.as_ref().map(|scope| scope.scope_id())
    }

    /// End this handle's scope, disposing its services last-created first
    ///
    /// Does nothing on a handle without a scope or on an already ended scope.
    pub async fn end_scope(&self) -> ServiceResult<()> {
        let Some(scope) = &self.scope else {
            return ServiceResult::ok();
        };

        if let Ok(mut state) = self.inner.state.write() {
            state.scopes.remove(&scope.scope_id());
        }

        let failures = scope.end().await;
        if failures.is_empty() {
            ServiceResult::ok()
        } else {
            CoreError::DisposalFailed { failures }.into()
        }
    }

    // ---- teardown -----------------------------------------------------

    /// Tear the container down
    ///
    /// Open scopes are ended first, then every tracked service is disposed
    /// last-created first. Failures are collected and reported together once
    /// every service has been attempted. The singleton cache and registry are
    /// cleared afterwards. A call made while teardown is running waits for it
    /// to finish; calls after that do nothing.
    pub async fn dispose(&self) -> ServiceResult<()> {
        let (tracked, scopes) = match self.begin_teardown() {
            Ok(Teardown::Finished) => return ServiceResult::ok(),
            Ok(Teardown::InProgress(finished)) => {
                finished.await;
                return ServiceResult::ok();
            }
            Ok(Teardown::Start { tracked, scopes }) => (tracked, scopes),
            Err(err) => return err.into(),
        };

        tracing::info!(
            disposables = tracked.len(),
            open_scopes = scopes.len(),
            "Disposing container"
        );

        let mut failures = Vec::new();
        for scope in scopes {
            failures.extend(scope.end().await);
        }
        failures.extend(dispose_in_reverse(tracked).await);

        let finished = self.write_state().map(|mut state| {
            state.registry.clear();
            state.waiting.clear();
            state.status = ContainerStatus::Disposed;
        });
        self.inner.teardown_finished.notify_waiters();
        if let Err(err) = finished {
            return err.into();
        }

        if failures.is_empty() {
            tracing::info!("Container disposed");
            ServiceResult::ok()
        } else {
            tracing::error!(failures = failures.len(), "Container disposed with failures");
            CoreError::DisposalFailed { failures }.into()
        }
    }

    fn begin_teardown(&self) -> Result<Teardown<'_>, CoreError> {
        let mut state = self.write_state()?;
        match state.status {
            ContainerStatus::Disposed => Ok(Teardown::Finished),
            // Registered under the lock, so the wakeup at the end of teardown is not missed.
            ContainerStatus::Disposing => Ok(Teardown::InProgress(self.inner.teardown_finished.notified())),
            ContainerStatus::Active => {
                state.status = ContainerStatus::Disposing;
                let scopes = state.scopes.drain().filter_map(|(_, open)| open.upgrade()).collect();
                Ok(Teardown::Start {
                    tracked: state.disposables.take(),
                    scopes,
                })
            }
        }
    }

    // ---- introspection ------------------------------------------------

    pub fn status(&self) -> ContainerStatus {
        self.read_state()
            .map(|state| state.status)
            .unwrap_or(ContainerStatus::Disposed)
    }

    /// Whether teardown has started or finished
    pub fn is_disposed(&self) -> bool {
        self.status() != ContainerStatus::Active
    }

    /// Check if a token is registered
    pub fn is_registered(&self, token: &str) -> bool {
        self.read_state()
            .map(|state| state.registry.contains(token))
            .unwrap_or(false)
    }

    /// Registered tokens in sorted order
    pub fn registered_tokens(&self) -> Vec<String> {
        self.read_state()
            .map(|state| state.registry.tokens())
            .unwrap_or_default()
    }

    /// Lifetime of the registration for `token`
    pub fn lifetime_of(&self, token: &str) -> Option<ServiceScope> {
        self.read_state()
            .ok()
            .and_then(|state| state.registry.get(token).map(|entry| entry.lifetime))
    }

    /// Number of services awaiting disposal at container teardown
    pub fn disposable_count(&self) -> usize {
        self.read_state()
            .map(|state| state.disposables.len())
            .unwrap_or(0)
    }

    /// Tokens currently under construction on this handle's resolution chain
    pub fn resolution_path(&self) -> &ResolutionPath {
        &self.path
    }

    /// Get container statistics
    pub fn stats(&self) -> ContainerStats {
        let (registered_services, active_singletons) = self
            .read_state()
            .map(|state| (state.registry.len(), state.registry.constructed_count()))
            .unwrap_or((0, 0));
        let stats = &self.inner.stats;

        ContainerStats {
            total_resolutions: stats.total_resolutions.load(Ordering::Relaxed),
            singleton_cache_hits: stats.singleton_cache_hits.load(Ordering::Relaxed),
            singleton_cache_misses: stats.singleton_cache_misses.load(Ordering::Relaxed),
            transient_creations: stats.transient_creations.load(Ordering::Relaxed),
            scoped_creations: stats.scoped_creations.load(Ordering::Relaxed),
            registered_services,
            active_singletons,
        }
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, ContainerState>, CoreError> {
        self.inner
            .state
            .read()
            .map_err(|_| CoreError::lock("container_state"))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, ContainerState>, CoreError> {
        self.inner
            .state
            .write()
            .map_err(|_| CoreError::lock("container_state"))
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}
