//! Bounded in-memory error history with aggregate statistics

use super::types::{ErrorKind, ProviderError, Severity};
use crate::provider::ProviderType;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{error, warn};
use uuid::Uuid;

/// Default ring buffer capacity
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Where an error occurred, attached to every log entry
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Provider that produced the failure
    pub provider: Option<ProviderType>,
    /// User on whose behalf the request ran
    pub user_id: Option<String>,
    /// Conversation the request belonged to
    pub conversation_id: Option<String>,
    /// Model that was targeted
    pub model_id: Option<String>,
    /// Logical operation name ("send_message", "stream_message", ...)
    pub operation: Option<String>,
}

/// One recorded error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    /// Unique entry id
    pub id: Uuid,
    /// When the error was recorded
    pub timestamp: DateTime<Utc>,
    /// Canonical kind
    pub kind: ErrorKind,
    /// Severity at the time of logging
    pub severity: Severity,
    /// Error message
    pub message: String,
    /// Whether the error was retryable
    pub retryable: bool,
    /// Provider that produced the failure
    pub provider: Option<String>,
    /// User on whose behalf the request ran
    pub user_id: Option<String>,
    /// Conversation the request belonged to
    pub conversation_id: Option<String>,
    /// Model that was targeted
    pub model_id: Option<String>,
    /// Logical operation name
    pub operation: Option<String>,
    /// Free-form context copied from the error
    pub context: HashMap<String, String>,
}

/// Aggregate view over the retained history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorStats {
    /// Entries currently retained
    pub total: usize,
    /// Count per error kind
    pub by_kind: HashMap<ErrorKind, usize>,
    /// Count per severity
    pub by_severity: HashMap<Severity, usize>,
    /// Count per provider name
    pub by_provider: HashMap<String, usize>,
    /// How many retained errors were retryable
    pub retryable: usize,
}

/// Append-only bounded error history
///
/// Shared across all in-flight conversations; append and eviction happen under
/// one lock so the buffer never exceeds `max_entries`.
#[derive(Debug)]
pub struct ErrorLogger {
    entries: Mutex<VecDeque<ErrorLogEntry>>,
    max_entries: usize,
}

impl ErrorLogger {
    /// Create a logger retaining at most `max_entries` errors
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(max_entries.min(64))),
            max_entries: max_entries.max(1),
        }
    }

    /// Record one error with its context, evicting the oldest entry on overflow
    ///
    /// Also emits a `tracing` event at a level matching the severity.
    pub fn log_error(&self, err: &ProviderError, ctx: &ErrorContext) -> Uuid {
        let entry = ErrorLogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind: err.kind,
            severity: err.severity,
            message: err.message.clone(),
            retryable: err.retryable,
            provider: ctx.provider.map(|p| p.to_string()),
            user_id: ctx.user_id.clone(),
            conversation_id: ctx.conversation_id.clone(),
            model_id: ctx.model_id.clone(),
            operation: ctx.operation.clone(),
            context: err.context.clone(),
        };

        match err.severity {
            Severity::Critical | Severity::High => error!(
                kind = %err.kind,
                provider = ?entry.provider,
                operation = ?entry.operation,
                "{}",
                err.message
            ),
            Severity::Medium | Severity::Low => warn!(
                kind = %err.kind,
                provider = ?entry.provider,
                operation = ?entry.operation,
                "{}",
                err.message
            ),
        }

        let id = entry.id;
        let mut entries = self.entries.lock();
        if entries.len() == self.max_entries {
            entries.pop_front();
        }
        entries.push_back(entry);
        id
    }

    /// The `n` most recent entries, newest last
    pub fn recent(&self, n: usize) -> Vec<ErrorLogEntry> {
        let entries = self.entries.lock();
        entries.iter().rev().take(n).rev().cloned().collect()
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no entries are retained
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Aggregate statistics over the retained history
    pub fn stats(&self) -> ErrorStats {
        let entries = self.entries.lock();
        let mut stats = ErrorStats {
            total: entries.len(),
            ..Default::default()
        };
        for entry in entries.iter() {
            *stats.by_kind.entry(entry.kind).or_default() += 1;
            *stats.by_severity.entry(entry.severity).or_default() += 1;
            if let Some(provider) = &entry.provider {
                *stats.by_provider.entry(provider.clone()).or_default() += 1;
            }
            if entry.retryable {
                stats.retryable += 1;
            }
        }
        stats
    }

    /// Drop all retained entries
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for ErrorLogger {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}
