use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

const MAX_LOG_ENTRIES: usize = 100;
const MASK: &str = "****";

static TOKEN_LIKE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z0-9]{32,}\b").expect("token pattern compiles"));

static SECRET_FIELD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)((?:password|token|key|secret|pat|api_key|apikey)"?\s*[:=]\s*"?)([^\s,}"]+)"#)
        .expect("secret field pattern compiles")
});

/// Masks anything that looks like a credential before it reaches a log sink.
pub fn redact_secrets(message: &str) -> String {
    let masked = TOKEN_LIKE_PATTERN.replace_all(message, MASK);
    SECRET_FIELD_PATTERN
        .replace_all(&masked, format!("${{1}}{}", MASK).as_str())
        .to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

/// Shared, bounded buffer of recent log lines. Cloning hands out another handle to the
/// same buffer; every component that logs receives one explicitly.
#[derive(Clone, Default)]
pub struct LogSink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self, source: &str, message: &str) {
        self.add_entry("INFO", source, message);
    }

    pub fn warn(&self, source: &str, message: &str) {
        self.add_entry("WARN", source, message);
    }

    pub fn error(&self, source: &str, message: &str) {
        self.add_entry("ERROR", source, message);
    }

    pub fn add_entry(&self, level: &str, source: &str, message: &str) -> LogEntry {
        let message = redact_secrets(message);
        match level {
            "ERROR" => tracing::error!(source, "{}", message),
            "WARN" => tracing::warn!(source, "{}", message),
            "DEBUG" => tracing::debug!(source, "{}", message),
            _ => tracing::info!(source, "{}", message),
        }

        let entry = LogEntry {
            time: Local::now().format("%H:%M:%S").to_string(),
            level: level.to_string(),
            source: source.to_string(),
            message,
        };
        let mut logs = self.lock();
        logs.push(entry.clone());
        if logs.len() > MAX_LOG_ENTRIES {
            logs.remove(0);
        }
        entry
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
