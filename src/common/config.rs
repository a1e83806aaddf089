//! Database Configuration
//!
//! Settings applied to the storage connection when a database is opened.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

fn default_foreign_keys() -> bool {
    true
}

/// Journal mode of the storage engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
    Memory,
}

impl JournalMode {
    /// Returns the pragma value.
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
            Self::Memory => "memory",
        }
    }
}

/// Configuration for one database handle
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database file; `None` opens a private in-memory database
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// How long a statement waits on a locked database before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default)]
    pub journal_mode: JournalMode,
    /// Enforce declared foreign keys
    #[serde(default = "default_foreign_keys")]
    pub foreign_keys: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: JournalMode::default(),
            foreign_keys: true,
        }
    }
}

impl DatabaseConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn file(path: impl AsRef<Path>) -> Self {
        DatabaseConfig {
            path: Some(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
