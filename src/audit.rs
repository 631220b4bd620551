use std::sync::{Arc, Mutex};

use crate::models::AuditEntry;

/// AuditSink
///
/// Append-only destination for navigation records. Recording is fire-and-forget:
/// it returns nothing and must never influence the navigation outcome.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// AuditState
///
/// The shared handle to the configured audit sink.
pub type AuditState = Arc<dyn AuditSink>;

/// TracingAuditSink
///
/// Emits every record as a structured event on the `audit` tracing target, so the
/// log pipeline (JSON in production) ships it with the rest of the request logs.
#[derive(Clone, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) {
        let payload = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => format!("{:?} (serialization failed: {})", entry, e),
        };

        match entry {
            AuditEntry::RouteChange { .. } => {
                tracing::info!(target: "audit", entry = %payload, "Route change");
            }
            AuditEntry::NavigationError { .. } => {
                tracing::warn!(target: "audit", entry = %payload, "Security event");
            }
            AuditEntry::RouterError { .. } => {
                tracing::error!(target: "audit", entry = %payload, "Router error");
            }
        }
    }
}

/// MemoryAuditSink
///
/// Keeps records in memory. Used by tests to assert what was audited.
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: AuditEntry) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}
