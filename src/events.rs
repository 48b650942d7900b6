//! Server log channel for host processes
//!
//! Every message the file server wants a host UI to see goes through
//! [`ServerLog`]. Each entry is:
//! - emitted as a `tracing` event at the matching level,
//! - appended to a bounded history (served by `GET /api/logs`),
//! - published to every subscriber of [`ServerLog::subscribe`].
//!
//! Subscribers that fall behind lose the oldest entries; the history is
//! unaffected.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const SUBSCRIBER_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

struct Inner {
    history: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    tx: broadcast::Sender<LogEntry>,
}

/// Cloneable handle to a log channel
#[derive(Clone)]
pub struct ServerLog {
    inner: Arc<Inner>,
}

impl ServerLog {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                history: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
                capacity,
                tx,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.inner.tx.subscribe()
    }

    /// Retained entries, oldest first
    pub fn history(&self) -> Vec<LogEntry> {
        self.inner.history.lock().iter().cloned().collect()
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit(LogLevel::Debug, message.into());
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(LogLevel::Info, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(LogLevel::Warn, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(LogLevel::Error, message.into());
    }

    fn emit(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Debug => tracing::debug!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Warn => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }

        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message,
        };

        if self.inner.capacity > 0 {
            let mut history = self.inner.history.lock();
            while history.len() >= self.inner.capacity {
                history.pop_front();
            }
            history.push_back(entry.clone());
        }

        // No subscribers is fine
        let _ = self.inner.tx.send(entry);
    }
}

impl Default for ServerLog {
    fn default() -> Self {
        Self::new(500)
    }
}

impl fmt::Debug for ServerLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerLog")
            .field("capacity", &self.inner.capacity)
            .field("retained", &self.inner.history.lock().len())
            .finish()
    }
}
