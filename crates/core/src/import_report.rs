//! Summary objects returned by one import or reconciliation invocation.
//!
//! Created at the start of an invocation, mutated only by it, returned once.
//! Nothing here is persisted.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::importer::ImportKind;
use crate::types::Timestamp;

/// Outcome of one [`Reconciler`](crate::reconciler::Reconciler) pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyUpdateReport {
    /// Properties carrying a building reference.
    pub total_properties: u64,
    /// Properties whose `property_type` was changed.
    pub updated: u64,
    /// Malformed reference, unknown building, building without a type, or
    /// value already current.
    pub skipped: u64,
    /// Store failures, one per property (or one for the listing query).
    pub errors: u64,
}

/// Outcome of one import invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub kind: ImportKind,
    /// Records handed to the importer.
    pub total: u64,
    /// Primary rows actually inserted.
    pub successful: u64,
    /// Records without an identifier plus rows of rejected primary chunks.
    pub failed: u64,
    /// Primary rows skipped because their identifier already existed.
    pub duplicates: u64,
    /// Detail rows actually inserted.
    pub details_inserted: u64,
    /// Record-level and chunk-level error messages, in the order they
    /// occurred.
    pub errors: Vec<String>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub elapsed_ms: u64,
    /// `successful / elapsed_seconds`; zero when no time elapsed.
    pub throughput_per_sec: f64,
    /// Present for building imports that ran the reconciler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_updates: Option<PropertyUpdateReport>,
}

impl ImportResult {
    pub fn start(kind: ImportKind, total: usize) -> Self {
        let now = Utc::now();
        Self {
            kind,
            total: total as u64,
            successful: 0,
            failed: 0,
            duplicates: 0,
            details_inserted: 0,
            errors: Vec::new(),
            start_time: now,
            end_time: now,
            elapsed_ms: 0,
            throughput_per_sec: 0.0,
            property_updates: None,
        }
    }

    /// Stamp the end time and derive elapsed time and throughput.
    pub fn finish(&mut self) {
        self.end_time = Utc::now();
        let elapsed = (self.end_time - self.start_time).num_milliseconds().max(0);
        self.elapsed_ms = elapsed as u64;
        self.throughput_per_sec = throughput(self.successful, self.elapsed_ms);
    }
}

/// Rows per second, or zero for an instantaneous run.
pub fn throughput(successful: u64, elapsed_ms: u64) -> f64 {
    if elapsed_ms == 0 {
        0.0
    } else {
        successful as f64 / (elapsed_ms as f64 / 1000.0)
    }
}
