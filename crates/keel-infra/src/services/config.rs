use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use keel_core::ConfigError;

/// Prefix of process environment variables read by [`EnvConfigurationProvider`]
pub const ENV_PREFIX: &str = "KEEL_";

/// Well-known configuration keys
pub mod keys {
    pub const DATABASE_URL: &str = "database_url";
    pub const CACHE_DEFAULT_TTL_SECS: &str = "cache_default_ttl_secs";
    pub const HTTP_BASE_URL: &str = "http_base_url";
    pub const HTTP_TIMEOUT_SECS: &str = "http_timeout_secs";
    pub const STORAGE_ROOT: &str = "storage_root";
}

/// Key/value configuration source
pub trait ConfigurationProvider: Send + Sync {
    /// Raw value for `key`
    fn get(&self, key: &str) -> Option<String>;

    /// Value for `key`, failing when unset or blank
    fn require(&self, key: &str) -> Result<String, ConfigError> {
        match self.get(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ConfigError::missing_required(
                key,
                format!("Set {}{} or provide '{}' in configuration", ENV_PREFIX, key.to_uppercase(), key),
            )),
        }
    }

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Optional unsigned integer setting
    fn get_u64(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        parse_setting(key, self.get(key))
    }
}

fn parse_setting<T: FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>, ConfigError> {
    match raw {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::invalid_value(key, value, std::any::type_name::<T>())),
    }
}

/// Reads `KEEL_<KEY>` process environment variables
#[derive(Debug, Clone)]
pub struct EnvConfigurationProvider {
    prefix: String,
}

impl EnvConfigurationProvider {
    pub fn new() -> Self {
        Self::with_prefix(ENV_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Environment variable name backing `key`
    pub fn variable_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.to_uppercase().replace(['.', '-'], "_"))
    }
}

impl Default for EnvConfigurationProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationProvider for EnvConfigurationProvider {
    fn get(&self, key: &str) -> Option<String> {
        env::var(self.variable_name(key)).ok()
    }
}

/// Fixed in-memory configuration
#[derive(Debug, Clone, Default)]
pub struct StaticConfigurationProvider {
    values: HashMap<String, String>,
}

impl StaticConfigurationProvider {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl ConfigurationProvider for StaticConfigurationProvider {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}
