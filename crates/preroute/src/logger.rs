//! Structured logging sink used for non-fatal router diagnostics
//!
//! The router never fails on a warning. Duplicate parameter names, a missing
//! catch-all route and swallowed `preload_code`/`warm_route` failures are all
//! reported through a [`Logger`] instead.

use serde::Serialize;
use serde_json::Value;

/// Severity of a [`LogRecord`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// A single diagnostic emitted by the router
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub level: LogLevel,
    /// Component that produced the record, e.g. `"pattern"` or `"router"`
    pub scope: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl LogRecord {
    pub fn new(level: LogLevel, scope: &'static str, message: impl Into<String>) -> Self {
        Self {
            level,
            scope,
            message: message.into(),
            context: None,
        }
    }

    pub fn warn(scope: &'static str, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, scope, message)
    }

    pub fn error(scope: &'static str, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, scope, message)
    }

    /// Attaches structured context to the record
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// Receives router diagnostics
///
/// Any `Fn(&LogRecord)` closure is a logger, which keeps test capture simple:
///
/// ```
/// use preroute::{LogRecord, Logger};
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
/// let logger = move |record: &LogRecord| sink.lock().unwrap().push(record.message.clone());
///
/// logger.log(&LogRecord::warn("test", "hello"));
/// assert_eq!(seen.lock().unwrap().len(), 1);
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, record: &LogRecord);
}

impl<F> Logger for F
where
    F: Fn(&LogRecord) + Send + Sync,
{
    fn log(&self, record: &LogRecord) {
        self(record)
    }
}

/// Forwards records to `tracing` (the default logger)
///
/// Without an installed subscriber this is effectively a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, record: &LogRecord) {
        let context = record.context.as_ref().map(Value::to_string);
        let context = context.as_deref().unwrap_or("");
        match record.level {
            LogLevel::Trace => {
                tracing::trace!(scope = record.scope, context, "{}", record.message)
            }
            LogLevel::Debug => {
                tracing::debug!(scope = record.scope, context, "{}", record.message)
            }
            LogLevel::Info => tracing::info!(scope = record.scope, context, "{}", record.message),
            LogLevel::Warn => tracing::warn!(scope = record.scope, context, "{}", record.message),
            LogLevel::Error => {
                tracing::error!(scope = record.scope, context, "{}", record.message)
            }
        }
    }
}

/// Discards every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _record: &LogRecord) {}
}
