pub mod cache;
pub mod config;
pub mod database;
pub mod events;
pub mod http;
pub mod logger;
pub mod metrics;
pub mod queue;
pub mod storage;

pub use cache::{Cache, InMemoryCache};
pub use config::{ConfigurationProvider, EnvConfigurationProvider, StaticConfigurationProvider};
pub use database::{Database, DatabaseConnectContext, DatabaseConnector, InMemoryDatabase};
pub use events::{Event, EventBus, EventSubscription, InMemoryEventBus};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient, ReqwestHttpClient};
pub use logger::{LogLevel, LogRecord, Logger, MemoryLogger, TracingLogger};
pub use metrics::{InMemoryMetrics, Metrics, MetricsSnapshot};
pub use queue::{InMemoryQueue, Job, Queue};
pub use storage::{FileStorage, InMemoryFileStorage, LocalFileStorage};
