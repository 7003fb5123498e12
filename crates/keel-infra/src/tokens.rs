//! Capability tokens registered by the infrastructure modules.

pub const CONFIGURATION_PROVIDER: &str = "IConfigurationProvider";
pub const LOGGER: &str = "ILogger";
pub const DATABASE: &str = "IDatabase";
pub const CACHE: &str = "ICache";
pub const EVENT_BUS: &str = "IEventBus";
pub const QUEUE: &str = "IQueue";
pub const METRICS: &str = "IMetrics";
pub const HTTP_CLIENT: &str = "IHttpClient";
pub const FILE_STORAGE: &str = "IFileStorage";

/// Every token, in infrastructure configuration order
pub const ALL: [&str; 9] = [
    CONFIGURATION_PROVIDER,
    LOGGER,
    DATABASE,
    CACHE,
    EVENT_BUS,
    QUEUE,
    METRICS,
    HTTP_CLIENT,
    FILE_STORAGE,
];
