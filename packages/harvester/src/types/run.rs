use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one harvester within one orchestrator run.
///
/// Built fresh per invocation and only ever returned, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRunResult {
    pub source: String,
    pub success: bool,
    /// Candidates emitted by the harvester
    pub events_found: usize,
    /// Candidates classified
    pub events_processed: usize,
    /// Candidates persisted (inserted + updated)
    pub events_admitted: usize,
    pub events_inserted: usize,
    pub events_updated: usize,
    /// The harvester substituted its example events
    pub used_fallback: bool,
    pub cancelled: bool,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SourceRunResult {
    pub fn new(source: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            source: source.into(),
            success: false,
            events_found: 0,
            events_processed: 0,
            events_admitted: 0,
            events_inserted: 0,
            events_updated: 0,
            used_fallback: false,
            cancelled: false,
            errors: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    /// Candidates that were classified but did not pass admission.
    pub fn events_rejected(&self) -> usize {
        self.events_processed
            .saturating_sub(self.events_admitted)
            .saturating_sub(self.persistence_failures())
    }

    /// Errors raised while writing admitted candidates.
    pub fn persistence_failures(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| e.starts_with(PERSIST_ERROR_PREFIX))
            .count()
    }
}

/// Prefix of error messages produced by failed writes.
pub const PERSIST_ERROR_PREFIX: &str = "persist";
