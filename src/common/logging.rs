//! Log Event Collection
//!
//! The core never writes to a global logger directly. Every component hands
//! structured [`LogEvent`]s to the [`LogSink`] injected when the database is
//! opened; the sink decides where they go and when.

use std::fmt;

use chrono::{DateTime, Utc};
use log::Level;
use parking_lot::Mutex;

use crate::query::executor::result::DataValue;

/// What part of the pipeline produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// Statement returning rows
    Query,
    /// Statement returning an affected-row count
    Command,
    /// Schema change
    Ddl,
    /// Transaction boundary
    Transaction,
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventCategory::Query => "query",
            EventCategory::Command => "command",
            EventCategory::Ddl => "ddl",
            EventCategory::Transaction => "transaction",
        };
        f.write_str(name)
    }
}

/// A structured log event
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub category: EventCategory,
    pub message: String,
    /// Statement text, when the event concerns one
    pub sql: Option<String>,
    /// Bound parameters rendered as SQL literals
    pub params: Vec<String>,
}

impl LogEvent {
    pub fn new(level: Level, category: EventCategory, message: impl Into<String>) -> Self {
        LogEvent {
            timestamp: Utc::now(),
            level,
            category,
            message: message.into(),
            sql: None,
            params: Vec::new(),
        }
    }

    pub fn with_statement(mut self, sql: &str, params: &[DataValue]) -> Self {
        self.sql = Some(sql.to_string());
        self.params = params.iter().map(|p| p.to_string()).collect();
        self
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)?;
        if let Some(sql) = &self.sql {
            write!(f, ": {}", sql)?;
            if !self.params.is_empty() {
                write!(f, " [{}]", self.params.join(", "))?;
            }
        }
        Ok(())
    }
}

/// Receiver for the events the core emits
pub trait LogSink: Send + Sync {
    fn record(&self, event: LogEvent);

    /// Push buffered events to their destination
    fn flush(&self) {}
}

/// Forwards every event to the `log` facade as soon as it is recorded
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacade;

impl LogSink for LogFacade {
    fn record(&self, event: LogEvent) {
        log::log!(target: "bayun_crud", event.level, "{}", event);
    }
}

/// Buffers events until they are drained or flushed
#[derive(Debug, Default)]
pub struct LogCollector {
    events: Mutex<Vec<LogEvent>>,
}

impl LogCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every buffered event, leaving the buffer empty
    pub fn drain(&self) -> Vec<LogEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Number of buffered events in `category`
    pub fn count(&self, category: EventCategory) -> usize {
        self.events.lock().iter().filter(|e| e.category == category).count()
    }
}

impl LogSink for LogCollector {
    fn record(&self, event: LogEvent) {
        self.events.lock().push(event);
    }

    fn flush(&self) {
        for event in self.drain() {
            LogFacade.record(event);
        }
    }
}
