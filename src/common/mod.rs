// Shared configuration and logging plumbing

pub mod config;
pub mod logging;

pub use self::config::{DatabaseConfig, JournalMode};
pub use self::logging::{EventCategory, LogCollector, LogEvent, LogFacade, LogSink};
