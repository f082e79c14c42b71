use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_logging::{JsonLogger, LogLevel, LogRecord, LogSink};

/// Builder for risk telemetry sinks.
pub struct RiskTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    sinks: Vec<Arc<dyn LogSink>>,
    min_level: LogLevel,
}

impl RiskTelemetryBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            sinks: Vec::new(),
            min_level: LogLevel::Info,
        }
    }

    /// Sets the JSON-lines log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Adds an extra sink.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Drops records below `level`.
    #[must_use]
    pub const fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Builds the telemetry handle.
    pub fn build(self) -> Result<RiskTelemetry> {
        let mut sinks = self.sinks;
        if let Some(path) = self.log_path {
            sinks.push(Arc::new(JsonLogger::new(path)?));
        }
        Ok(RiskTelemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                min_level: self.min_level,
                sinks,
            }),
        })
    }
}

/// Telemetry handle shared across risk components.
#[derive(Clone)]
pub struct RiskTelemetry {
    inner: Arc<TelemetryInner>,
}

struct TelemetryInner {
    module: String,
    min_level: LogLevel,
    sinks: Vec<Arc<dyn LogSink>>,
}

impl fmt::Debug for RiskTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RiskTelemetry")
            .field("module", &self.inner.module)
            .field("min_level", &self.inner.min_level)
            .field("sinks", &self.inner.sinks.len())
            .finish()
    }
}

impl RiskTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> RiskTelemetryBuilder {
        RiskTelemetryBuilder::new(module)
    }

    /// Whether records at `level` reach the sinks.
    #[must_use]
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.inner.min_level && !self.inner.sinks.is_empty()
    }

    /// Logs structured metadata to every sink; the first sink failure is returned.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        if !self.enabled(level) {
            return Ok(());
        }
        let record = LogRecord::new(&self.inner.module, level, message).with_metadata(metadata);
        let mut first_err = None;
        for sink in &self.inner.sinks {
            if let Err(err) = sink.write(&record) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_logging::MemoryLogger;
    use tempfile::tempdir;

    #[test]
    fn telemetry_writes_file_and_memory_sinks() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("risk.log");
        let memory = Arc::new(MemoryLogger::new(8));
        let telemetry = RiskTelemetry::builder("risk")
            .log_path(&path)
            .sink(memory.clone())
            .build()
            .unwrap();
        telemetry
            .log(LogLevel::Info, "risk.evaluation.completed", json!({ "score": 25.0 }))
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("risk.evaluation.completed"));
        let records = memory.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].module, "risk");
        assert_eq!(records[0].metadata["score"], json!(25.0));
    }

    #[test]
    fn records_below_min_level_are_dropped() {
        let memory = Arc::new(MemoryLogger::new(8));
        let telemetry = RiskTelemetry::builder("risk")
            .sink(memory.clone())
            .min_level(LogLevel::Warn)
            .build()
            .unwrap();
        telemetry.log(LogLevel::Info, "quiet", Value::Null).unwrap();
        telemetry.log(LogLevel::Error, "loud", Value::Null).unwrap();
        let messages: Vec<String> = memory.snapshot().into_iter().map(|r| r.message).collect();
        assert_eq!(messages, vec!["loud".to_string()]);
        assert!(!telemetry.enabled(LogLevel::Debug));
    }
}
