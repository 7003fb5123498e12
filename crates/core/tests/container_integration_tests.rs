//! Integration tests for token registration, lifetimes, cycle detection,
//! scopes and teardown of the service container.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use keel_core::container::{Container, ServiceScope};
use keel_core::{CoreError, Disposable};
use tokio::sync::Notify;

/// Logging capability
trait Logger: Send + Sync {
    fn log(&self, message: &str);
    fn lines(&self) -> Vec<String>;
}

#[derive(Default)]
struct ConsoleLogger {
    lines: Mutex<Vec<String>>,
}

impl Logger for ConsoleLogger {
    fn log(&self, message: &str) {
        self.lines.lock().unwrap().push(message.to_string());
    }

    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

struct Db {
    logger: Arc<dyn Logger>,
}

/// Records its name into a shared log when disposed
#[derive(Debug)]
struct Tracked {
    name: &'static str,
    disposed: Arc<Mutex<Vec<&'static str>>>,
    fail: bool,
}

#[async_trait]
impl Disposable for Tracked {
    async fn dispose(&self) -> Result<(), CoreError> {
        self.disposed.lock().unwrap().push(self.name);
        if self.fail {
            return Err(CoreError::configuration(format!("{} did not shut down", self.name)));
        }
        Ok(())
    }
}

fn tracked_factory(
    name: &'static str,
    disposed: &Arc<Mutex<Vec<&'static str>>>,
    fail: bool,
) -> impl Fn(&Container) -> Result<Arc<Tracked>, CoreError> {
    let disposed = disposed.clone();
    move |_: &Container| Ok(Arc::new(Tracked { name, disposed: disposed.clone(), fail }))
}

#[tokio::test]
async fn test_logger_database_scenario() {
    let container = Container::new();
    container
        .register_factory("ILogger", ServiceScope::Singleton, |_| {
            Ok(Arc::new(ConsoleLogger::default()) as Arc<dyn Logger>)
        })
        .unwrap();
    container
        .register_async_factory("IDatabase", ServiceScope::Singleton, |c| async move {
            let logger = c.resolve::<dyn Logger>("ILogger").await?;
            logger.log("database connected");
            Ok(Arc::new(Db { logger }))
        })
        .unwrap();

    let first = container.resolve::<Db>("IDatabase").await.unwrap();
    let second = container.resolve::<Db>("IDatabase").await.unwrap();
    let logger = container.resolve::<dyn Logger>("ILogger").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first.logger, &logger));
    assert_eq!(logger.lines(), vec!["database connected".to_string()]);
}

#[tokio::test]
async fn test_concurrent_singleton_resolution_constructs_once() {
    let container = Container::new();
    let constructions = Arc::new(AtomicUsize::new(0));
    let counter = constructions.clone();
    container
        .register_async_factory("ISlow", ServiceScope::Singleton, move |_| {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(Arc::new(counter.fetch_add(1, Ordering::SeqCst)))
            }
        })
        .unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let container = container.clone();
            tokio::spawn(async move { container.resolve::<usize>("ISlow").await })
        })
        .collect();
    let resolved: Vec<Arc<usize>> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(constructions.load(Ordering::SeqCst), 1);
    assert!(resolved.iter().all(|instance| Arc::ptr_eq(instance, &resolved[0])));
}

#[tokio::test]
async fn test_transient_returns_fresh_instances() {
    let container = Container::new();
    container
        .register_factory("IRequestId", ServiceScope::Transient, |_| Ok(Arc::new(uuid::Uuid::new_v4())))
        .unwrap();

    let a = container.resolve::<uuid::Uuid>("IRequestId").await.unwrap();
    let b = container.resolve::<uuid::Uuid>("IRequestId").await.unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert_ne!(*a, *b);
}

#[tokio::test]
async fn test_reregistration_overwrites() {
    let container = Container::new();
    container
        .register_factory("IGreeting", ServiceScope::Singleton, |_| Ok(Arc::new("hello")))
        .unwrap();
    container
        .register_factory("IGreeting", ServiceScope::Transient, |_| Ok(Arc::new("bonjour")))
        .unwrap();

    assert_eq!(*container.resolve::<&str>("IGreeting").await.unwrap(), "bonjour");
    assert_eq!(container.lifetime_of("IGreeting"), Some(ServiceScope::Transient));
    assert_eq!(container.registered_tokens(), vec!["IGreeting".to_string()]);
}

#[tokio::test]
async fn test_unregistered_token_is_named() {
    let container = Container::new();
    let err = container.resolve::<String>("IMissing").await.unwrap_err();

    assert!(err.is_not_registered());
    assert!(err.to_string().contains("IMissing"));
    assert!(container.try_resolve::<String>("IMissing").await.is_none());

    let result = container.resolve_result::<String>("IMissing").await;
    assert_eq!(result.error().unwrap().code, "SERVICE_NOT_REGISTERED");
}

#[tokio::test]
async fn test_cycle_reports_full_path() {
    let container = Container::new();
    container
        .register_async_factory("A", ServiceScope::Singleton, |c| async move {
            c.resolve::<String>("B").await
        })
        .unwrap();
    container
        .register_async_factory("B", ServiceScope::Singleton, |c| async move {
            c.resolve::<String>("A").await
        })
        .unwrap();

    let err = tokio::time::timeout(Duration::from_secs(1), container.resolve::<String>("A"))
        .await
        .expect("cycle detection must not hang")
        .unwrap_err();

    assert!(err.is_circular());
    match err {
        CoreError::CircularDependency { path, cycle_service } => {
            assert_eq!(path, "A -> B -> A");
            assert_eq!(cycle_service, "A");
        }
        other => panic!("unexpected error: {other}"),
    }

    // Nothing was cached by the failed attempt.
    assert_eq!(container.stats().active_singletons, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cycle_across_concurrent_resolutions_is_reported() {
    let container = Container::new();
    for (token, dependency) in [("A", "B"), ("B", "A")] {
        container
            .register_async_factory(token, ServiceScope::Singleton, move |c: Container| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                c.resolve::<String>(dependency).await
            })
            .unwrap();
    }

    let (first, second) = (container.clone(), container.clone());
    let a = tokio::spawn(async move { first.resolve::<String>("A").await });
    let b = tokio::spawn(async move { second.resolve::<String>("B").await });

    let (a, b) = tokio::time::timeout(Duration::from_secs(3), async { (a.await.unwrap(), b.await.unwrap()) })
        .await
        .expect("concurrent resolution of a cycle must not hang");

    for result in [a, b] {
        let Err(err) = result else {
            panic!("a cyclic service must not resolve");
        };
        assert!(err.is_circular(), "unexpected error: {err}");
    }
    assert_eq!(container.stats().active_singletons, 0);
}

#[tokio::test]
async fn test_dispose_reverse_order_exactly_once() {
    let disposed = Arc::new(Mutex::new(Vec::new()));
    let container = Container::new();
    container
        .register_disposable_factory("S1", ServiceScope::Singleton, tracked_factory("S1", &disposed, false))
        .unwrap();
    let inner = disposed.clone();
    container
        .register_async_disposable_factory("S2", ServiceScope::Singleton, move |c| {
            let disposed = inner.clone();
            async move {
                c.resolve::<Tracked>("S1").await?;
                Ok(Arc::new(Tracked { name: "S2", disposed, fail: false }))
            }
        })
        .unwrap();

    container.resolve::<Tracked>("S2").await.unwrap();
    assert_eq!(container.disposable_count(), 2);

    assert!(container.dispose().await.is_success());
    assert!(container.dispose().await.is_success());

    assert_eq!(*disposed.lock().unwrap(), vec!["S2", "S1"]);
    assert!(container.is_disposed());
    assert!(container.registered_tokens().is_empty());
}

#[tokio::test]
async fn test_dispose_aggregates_failures_and_continues() {
    let disposed = Arc::new(Mutex::new(Vec::new()));
    let container = Container::new();
    for (name, fail) in [("first", false), ("second", true), ("third", false)] {
        container
            .register_disposable_factory(name, ServiceScope::Singleton, tracked_factory(name, &disposed, fail))
            .unwrap();
        container.resolve::<Tracked>(name).await.unwrap();
    }

    let result = container.dispose().await;

    assert_eq!(*disposed.lock().unwrap(), vec!["third", "second", "first"]);
    let error = result.error().unwrap();
    assert_eq!(error.code, "DISPOSAL_FAILED");
    let failures = error.details.as_ref().unwrap()["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["token"], "second");
}

#[tokio::test]
async fn test_resolve_and_register_after_dispose_fail() {
    let container = Container::new();
    container
        .register_factory("IClock", ServiceScope::Singleton, |_| Ok(Arc::new(0u64)))
        .unwrap();
    container.resolve::<u64>("IClock").await.unwrap();

    assert!(container.dispose().await.is_success());

    let err = container.resolve::<u64>("IClock").await.unwrap_err();
    assert_eq!(err.code(), "CONTAINER_DISPOSED");
    assert!(err.to_string().contains("IClock"));
    assert!(container
        .register_factory("IClock", ServiceScope::Singleton, |_| Ok(Arc::new(1u64)))
        .unwrap_err()
        .is_disposed());
}

#[tokio::test]
async fn test_instance_finished_after_teardown_is_disposed() {
    let disposed = Arc::new(Mutex::new(Vec::new()));
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let container = Container::new();

    let (inner_disposed, inner_started, inner_release) = (disposed.clone(), started.clone(), release.clone());
    container
        .register_async_disposable_factory("ILate", ServiceScope::Singleton, move |_| {
            let (disposed, started, release) = (inner_disposed.clone(), inner_started.clone(), inner_release.clone());
            async move {
                started.notify_one();
                release.notified().await;
                Ok(Arc::new(Tracked { name: "late", disposed, fail: false }))
            }
        })
        .unwrap();

    let resolver = container.clone();
    let pending = tokio::spawn(async move { resolver.resolve::<Tracked>("ILate").await });

    started.notified().await;
    assert!(container.dispose().await.is_success());
    release.notify_one();

    let err = pending.await.unwrap().unwrap_err();
    assert!(err.is_disposed());
    assert_eq!(*disposed.lock().unwrap(), vec!["late"]);
}

#[tokio::test]
async fn test_plain_instance_finished_after_dispose_is_rejected() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let container = Container::new();

    let (inner_started, inner_release) = (started.clone(), release.clone());
    container
        .register_async_factory("IReport", ServiceScope::Singleton, move |_| {
            let (started, release) = (inner_started.clone(), inner_release.clone());
            async move {
                started.notify_one();
                release.notified().await;
                Ok(Arc::new("quarterly".to_string()))
            }
        })
        .unwrap();

    let resolver = container.clone();
    let pending = tokio::spawn(async move { resolver.resolve::<String>("IReport").await });

    started.notified().await;
    assert!(container.dispose().await.is_success());
    release.notify_one();

    let err = pending.await.unwrap().unwrap_err();
    assert!(err.is_disposed());
    assert!(err.to_string().contains("IReport"));
}

#[tokio::test]
async fn test_scoped_instances_per_scope() {
    let container = Container::new();
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    container
        .register_factory("IRequestContext", ServiceScope::Scoped, move |_| {
            Ok(Arc::new(counter.fetch_add(1, Ordering::SeqCst)))
        })
        .unwrap();

    let first_scope = container.create_scope().unwrap();
    let second_scope = container.create_scope().unwrap();

    let a1 = first_scope.resolve::<usize>("IRequestContext").await.unwrap();
    let a2 = first_scope.resolve::<usize>("IRequestContext").await.unwrap();
    let b = second_scope.resolve::<usize>("IRequestContext").await.unwrap();

    assert!(Arc::ptr_eq(&a1, &a2));
    assert!(!Arc::ptr_eq(&a1, &b));
    assert_ne!(first_scope.scope_id(), second_scope.scope_id());
    assert_eq!(created.load(Ordering::SeqCst), 2);
    assert_eq!(container.stats().scoped_creations, 2);
}

#[tokio::test]
async fn test_scoped_dependency_shares_singletons() {
    let container = Container::new();
    container
        .register_factory("ILogger", ServiceScope::Singleton, |_| {
            Ok(Arc::new(ConsoleLogger::default()) as Arc<dyn Logger>)
        })
        .unwrap();
    container
        .register_async_factory("IUnitOfWork", ServiceScope::Scoped, |c| async move {
            let logger = c.resolve::<dyn Logger>("ILogger").await?;
            Ok(Arc::new(Db { logger }))
        })
        .unwrap();

    let scope = container.create_scope().unwrap();
    let work = scope.resolve::<Db>("IUnitOfWork").await.unwrap();
    let logger = container.resolve::<dyn Logger>("ILogger").await.unwrap();

    assert!(Arc::ptr_eq(&work.logger, &logger));
}

#[tokio::test]
async fn test_end_scope_disposes_scope_services_only() {
    let disposed = Arc::new(Mutex::new(Vec::new()));
    let container = Container::new();
    container
        .register_disposable_factory("IPool", ServiceScope::Singleton, tracked_factory("pool", &disposed, false))
        .unwrap();
    container
        .register_disposable_factory("ITransaction", ServiceScope::Scoped, tracked_factory("transaction", &disposed, false))
        .unwrap();
    container
        .register_disposable_factory("ICommand", ServiceScope::Transient, tracked_factory("command", &disposed, false))
        .unwrap();

    let scope = container.create_scope().unwrap();
    scope.resolve::<Tracked>("IPool").await.unwrap();
    scope.resolve::<Tracked>("ITransaction").await.unwrap();
    scope.resolve::<Tracked>("ICommand").await.unwrap();

    assert!(scope.end_scope().await.is_success());
    assert_eq!(*disposed.lock().unwrap(), vec!["command", "transaction"]);

    let err = scope.resolve::<Tracked>("ITransaction").await.unwrap_err();
    assert_eq!(err.code(), "SCOPE_ENDED");

    // Ending twice is a no-op; the root handle still works.
    assert!(scope.end_scope().await.is_success());
    assert!(container.resolve::<Tracked>("IPool").await.is_ok());

    assert!(container.dispose().await.is_success());
    assert_eq!(*disposed.lock().unwrap(), vec!["command", "transaction", "pool"]);
}

#[tokio::test]
async fn test_root_dispose_ends_open_scopes() {
    let disposed = Arc::new(Mutex::new(Vec::new()));
    let container = Container::new();
    container
        .register_disposable_factory("ISession", ServiceScope::Scoped, tracked_factory("session", &disposed, false))
        .unwrap();

    let scope = container.create_scope().unwrap();
    scope.resolve::<Tracked>("ISession").await.unwrap();

    assert!(container.dispose().await.is_success());
    assert_eq!(*disposed.lock().unwrap(), vec!["session"]);
    assert!(scope.resolve::<Tracked>("ISession").await.is_err());
}
