use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};

/// Severity of a log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Application-facing logging capability
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, fields: &Map<String, Value>);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message, &Map::new());
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message, &Map::new());
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message, &Map::new());
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message, &Map::new());
    }
}

/// Forwards records to the global `tracing` subscriber
#[derive(Debug, Clone)]
pub struct TracingLogger {
    component: String,
}

impl TracingLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self { component: component.into() }
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new("app")
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str, fields: &Map<String, Value>) {
        let component = self.component.as_str();
        // Empty field maps are left out of the event.
        let fields = (!fields.is_empty()).then(|| Value::Object(fields.clone()));

        match level {
            LogLevel::Debug => tracing::debug!(component, fields = ?fields, "{}", message),
            LogLevel::Info => tracing::info!(component, fields = ?fields, "{}", message),
            LogLevel::Warn => tracing::warn!(component, fields = ?fields, "{}", message),
            LogLevel::Error => tracing::error!(component, fields = ?fields, "{}", message),
        }
    }
}

/// One captured record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub fields: Map<String, Value>,
}

/// Captures records in memory for assertions
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Whether any record's message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.records.lock().iter().any(|r| r.message.contains(needle))
    }

    pub fn count_at(&self, level: LogLevel) -> usize {
        self.records.lock().iter().filter(|r| r.level == level).count()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: LogLevel, message: &str, fields: &Map<String, Value>) {
        self.records.lock().push(LogRecord {
            level,
            message: message.to_string(),
            fields: fields.clone(),
        });
    }
}
