//! Process-wide `tracing` subscriber setup per environment.

use std::io;

use keel_core::Environment;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level: String,
    /// Emit one JSON object per event
    pub json_format: bool,
    /// Multi-line human readable output
    pub pretty_print: bool,
    /// Include file and line number information
    pub include_location: bool,
    /// Directive filter such as "keel_core=debug,keel_infra=info"; overrides `level`
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl LoggingConfig {
    /// JSON output at info level
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
            pretty_print: false,
            include_location: false,
            env_filter: Some("keel_core=info,keel_infra=info".to_string()),
        }
    }

    /// Pretty output at debug level
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            pretty_print: true,
            include_location: true,
            env_filter: Some("keel_core=debug,keel_infra=debug".to_string()),
        }
    }

    /// Errors only
    pub fn test() -> Self {
        Self {
            level: "error".to_string(),
            json_format: false,
            pretty_print: false,
            include_location: false,
            env_filter: None,
        }
    }

    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self::development(),
            Environment::Test => Self::test(),
            Environment::Production => Self::production(),
        }
    }

    /// Set environment filter
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter directives in effect when `RUST_LOG` is unset
    pub fn directives(&self) -> &str {
        self.env_filter.as_deref().unwrap_or(&self.level)
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over the configured directives. Fails if a
/// global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(config.directives()))?;

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(io::stdout)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .json(),
            )
            .try_init()?;
    } else if config.pretty_print {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(io::stdout)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .pretty(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_test_writer())
            .try_init()?;
    }

    tracing::info!(
        target: "keel::logging",
        level = %config.level,
        format = if config.json_format { "json" } else { "text" },
        "Structured logging initialized"
    );
    Ok(())
}
