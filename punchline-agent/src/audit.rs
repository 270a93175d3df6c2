//! Audit trail for backend calls.
//!
//! Records every completion request with its purpose, latency and outcome so
//! a run can report how many calls it made and how many failed.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::backend::traits::{CompletionRequest, CompletionResponse, LlmBackend, LlmError};

/// Maximum entries in the audit log before pruning.
const MAX_AUDIT_ENTRIES: usize = 10_000;

/// How a backend call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// Backend returned text
    Completed { response_chars: usize, tokens: u32 },
    /// Backend failed in transport or validation
    Failed { error: String },
}

/// An entry in the audit log.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    /// Unique entry ID
    pub entry_id: String,
    /// What the call was for (e.g. `generate_rubric_2`)
    pub purpose: String,
    /// Backend/model that served it
    pub model: String,
    /// Outcome, once known
    pub outcome: Option<CallOutcome>,
    /// When the request was made
    pub requested_at: DateTime<Utc>,
    /// When the response arrived
    pub responded_at: Option<DateTime<Utc>>,
    /// Processing duration in ms
    pub duration_ms: Option<u64>,
}

impl AuditEntry {
    fn new(purpose: &str, model: &str) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            purpose: purpose.to_string(),
            model: model.to_string(),
            outcome: None,
            requested_at: Utc::now(),
            responded_at: None,
            duration_ms: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Some(CallOutcome::Failed { .. }))
    }
}

/// Audit log shared by every stage of a run.
pub struct AuditLog {
    /// Log entries (newest first)
    entries: Arc<RwLock<VecDeque<AuditEntry>>>,
    /// Maximum entries to retain
    max_entries: usize,
    /// Lifetime counters, unaffected by pruning
    requested: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl AuditLog {
    /// Create a new audit log.
    pub fn new() -> Self {
        Self::with_max_entries(MAX_AUDIT_ENTRIES)
    }

    /// Create with custom max entries.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::new())),
            max_entries,
            requested: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Log a request (before processing).
    pub async fn log_request(&self, purpose: &str, model: &str) -> String {
        let entry = AuditEntry::new(purpose, model);
        let entry_id = entry.entry_id.clone();
        self.requested.fetch_add(1, Ordering::Relaxed);

        let mut entries = self.entries.write().await;
        entries.push_front(entry);

        while entries.len() > self.max_entries {
            entries.pop_back();
        }

        entry_id
    }

    /// Update entry with its outcome.
    pub async fn log_outcome(&self, entry_id: &str, outcome: CallOutcome) {
        match outcome {
            CallOutcome::Completed { .. } => self.completed.fetch_add(1, Ordering::Relaxed),
            CallOutcome::Failed { .. } => self.failed.fetch_add(1, Ordering::Relaxed),
        };

        let mut entries = self.entries.write().await;

        if let Some(entry) = entries.iter_mut().find(|e| e.entry_id == entry_id) {
            let now = Utc::now();
            entry.duration_ms = Some((now - entry.requested_at).num_milliseconds().max(0) as u64);
            entry.responded_at = Some(now);
            entry.outcome = Some(outcome);
        }
    }

    /// Call `backend` and record the call.
    pub async fn complete(
        &self,
        backend: &dyn LlmBackend,
        purpose: &str,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        let entry_id = self.log_request(purpose, backend.id()).await;
        let result = backend.complete(request).await;

        let outcome = match &result {
            Ok(response) => CallOutcome::Completed {
                response_chars: response.content.chars().count(),
                tokens: response.usage.total(),
            },
            Err(e) => CallOutcome::Failed {
                error: e.to_string(),
            },
        };
        self.log_outcome(&entry_id, outcome).await;

        result
    }

    /// Get statistics.
    ///
    /// Call counts cover the log's whole lifetime; the average duration only
    /// covers retained entries.
    pub async fn stats(&self) -> AuditStats {
        let entries = self.entries.read().await;

        let durations: Vec<u64> = entries.iter().filter_map(|e| e.duration_ms).collect();
        let avg_duration_ms = if durations.is_empty() {
            0
        } else {
            durations.iter().sum::<u64>() / durations.len() as u64
        };

        AuditStats {
            total_calls: self.requested.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retained: entries.len(),
            avg_duration_ms,
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics from the audit log.
#[derive(Debug, Clone, Default)]
pub struct AuditStats {
    /// Total calls logged
    pub total_calls: usize,
    /// Calls that returned text
    pub completed: usize,
    /// Calls that failed
    pub failed: usize,
    /// Entries still held after pruning
    pub retained: usize,
    /// Average call duration
    pub avg_duration_ms: u64,
}
