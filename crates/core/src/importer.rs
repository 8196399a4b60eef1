//! Batch importer: parse, normalize, split, chunk, and bulk-insert records
//! across a primary and a detail table.
//!
//! The importer is a single sequential worker. Chunk `n + 1` is attempted
//! only after chunk `n` has resolved. A rejected chunk is recorded in the
//! [`ImportResult`] and the run moves on; only input errors are returned as
//! `Err`.
//!
//! Phases, in order: `Idle -> Parsing -> Normalizing -> Splitting ->
//! InsertingPrimary -> ResolvingKeys -> InsertingDetail -> [Reconciling] ->
//! Reporting -> Done`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::dictionaries;
use crate::error::{ImportError, StoreError};
use crate::field_dictionary::FieldDictionary;
use crate::import_report::ImportResult;
use crate::normalizer::normalize;
use crate::parser::{parse_csv, parse_json};
use crate::persistence::{row_id, EntityTable, PersistencePort};
use crate::reconciler::Reconciler;
use crate::splitter::{split, SplitRecord};
use crate::types::{DbId, ExternalRecord, Row};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Rows per bulk-insert statement unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Upper bound on the configurable chunk size.
pub const MAX_CHUNK_SIZE: usize = 1000;

// ---------------------------------------------------------------------------
// Import kind
// ---------------------------------------------------------------------------

/// The two import variants. Each bundles its field dictionary with the
/// tables it writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Properties,
    Buildings,
}

impl ImportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Properties => "properties",
            Self::Buildings => "buildings",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "properties" => Some(Self::Properties),
            "buildings" => Some(Self::Buildings),
            _ => None,
        }
    }

    /// All valid kind values.
    pub const ALL: &'static [&'static str] = &["properties", "buildings"];

    pub fn dictionary(&self) -> &'static FieldDictionary {
        match self {
            Self::Properties => dictionaries::properties(),
            Self::Buildings => dictionaries::buildings(),
        }
    }

    pub fn primary_table(&self) -> EntityTable {
        match self {
            Self::Properties => EntityTable::Properties,
            Self::Buildings => EntityTable::Buildings,
        }
    }

    pub fn detail_table(&self) -> EntityTable {
        match self {
            Self::Properties => EntityTable::PropertyDetails,
            Self::Buildings => EntityTable::BuildingDetails,
        }
    }

    /// Column on the detail table referencing the primary row's `id`.
    pub fn foreign_key(&self) -> &'static str {
        match self {
            Self::Properties => "property_id",
            Self::Buildings => "building_id",
        }
    }
}

impl std::fmt::Display for ImportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// What to do when the store rejects a whole chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkFailurePolicy {
    /// Record one error for the chunk and drop all of its rows.
    #[default]
    Skip,
    /// Split the chunk in halves until the rejected rows are isolated; every
    /// other row is still inserted.
    Bisect,
}

impl ChunkFailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Bisect => "bisect",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "skip" => Some(Self::Skip),
            "bisect" => Some(Self::Bisect),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChunkFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    pub chunk_size: usize,
    pub chunk_failure: ChunkFailurePolicy,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_failure: ChunkFailurePolicy::Skip,
        }
    }
}

/// Validate a chunk size against `1..=MAX_CHUNK_SIZE`.
pub fn validate_chunk_size(size: usize) -> Result<(), ImportError> {
    if size == 0 || size > MAX_CHUNK_SIZE {
        return Err(ImportError::InvalidOptions(format!(
            "chunk size must be between 1 and {MAX_CHUNK_SIZE}, got {size}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Importer state machine. There is no retry state; `Done` is always reached
/// once records have been handed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPhase {
    Idle,
    Parsing,
    Normalizing,
    Splitting,
    InsertingPrimary,
    ResolvingKeys,
    InsertingDetail,
    Reconciling,
    Reporting,
    Done,
}

impl ImportPhase {
    /// Declaration order, which is also transition order.
    pub const ALL: &'static [ImportPhase] = &[
        Self::Idle,
        Self::Parsing,
        Self::Normalizing,
        Self::Splitting,
        Self::InsertingPrimary,
        Self::ResolvingKeys,
        Self::InsertingDetail,
        Self::Reconciling,
        Self::Reporting,
        Self::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Parsing => "parsing",
            Self::Normalizing => "normalizing",
            Self::Splitting => "splitting",
            Self::InsertingPrimary => "inserting_primary",
            Self::ResolvingKeys => "resolving_keys",
            Self::InsertingDetail => "inserting_detail",
            Self::Reconciling => "reconciling",
            Self::Reporting => "reporting",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Chunk bookkeeping
// ---------------------------------------------------------------------------

/// A split record tagged with its 1-based position in the input.
#[derive(Debug)]
struct StagedRecord {
    row_number: usize,
    split: SplitRecord,
}

/// One row queued for a bulk insert.
#[derive(Debug)]
struct PendingRow<'r> {
    row_number: usize,
    identifier: &'r str,
    data: Row,
}

/// Human-readable position of a chunk, used in error messages.
#[derive(Debug, Clone, Copy)]
struct ChunkLabel {
    table: EntityTable,
    index: usize,
    count: usize,
    first_row: usize,
    last_row: usize,
}

impl std::fmt::Display for ChunkLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} chunk {}/{} (rows {}-{})",
            self.table, self.index, self.count, self.first_row, self.last_row
        )
    }
}

/// Result of attempting one chunk.
#[derive(Debug, Default)]
struct ChunkOutcome {
    /// Rows the store reported as inserted.
    inserted: u64,
    /// Indices (into the chunk) of rows the store accepted, whether inserted
    /// or skipped as duplicates.
    accepted: Vec<usize>,
    /// Rows dropped because the store rejected them.
    rejected: u64,
    errors: Vec<String>,
}

// ---------------------------------------------------------------------------
// BatchImporter
// ---------------------------------------------------------------------------

/// Drives one import invocation against a [`PersistencePort`].
pub struct BatchImporter<'a, S: PersistencePort + ?Sized> {
    store: &'a S,
    kind: ImportKind,
    options: ImportOptions,
    reconcile_after_import: bool,
    /// Current [`ImportPhase`], stored as its index in `ImportPhase::ALL`.
    phase: AtomicU8,
}

impl<'a, S: PersistencePort + ?Sized> BatchImporter<'a, S> {
    /// Create an importer with default options. Building imports run the
    /// reconciler afterwards unless disabled.
    pub fn new(store: &'a S, kind: ImportKind) -> Self {
        let importer = Self {
            store,
            kind,
            options: ImportOptions::default(),
            reconcile_after_import: true,
            phase: AtomicU8::new(ImportPhase::Idle as u8),
        };
        importer.enter(ImportPhase::Idle);
        importer
    }

    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_reconciliation(mut self, enabled: bool) -> Self {
        self.reconcile_after_import = enabled;
        self
    }

    /// Parse CSV text and import it.
    pub async fn import_csv(&self, text: &str) -> Result<ImportResult, ImportError> {
        validate_chunk_size(self.options.chunk_size)?;
        self.enter(ImportPhase::Parsing);
        let records = parse_csv(text)?;
        self.import_records(records).await
    }

    /// Parse a CRM JSON export and import it.
    pub async fn import_json(&self, text: &str) -> Result<ImportResult, ImportError> {
        validate_chunk_size(self.options.chunk_size)?;
        self.enter(ImportPhase::Parsing);
        let records = parse_json(text)?;
        self.import_records(records).await
    }

    /// Import already-parsed external records.
    pub async fn import_records(
        &self,
        records: Vec<ExternalRecord>,
    ) -> Result<ImportResult, ImportError> {
        validate_chunk_size(self.options.chunk_size)?;
        if records.is_empty() {
            return Err(ImportError::NoRows);
        }

        let mut result = ImportResult::start(self.kind, records.len());
        tracing::info!(
            kind = %self.kind,
            records = records.len(),
            chunk_size = self.options.chunk_size,
            chunk_failure = %self.options.chunk_failure,
            "Starting import"
        );

        let staged = self.stage(&records, &mut result);
        let accepted = self.insert_primary(&staged, &mut result).await;
        let keys = self.resolve_keys(&accepted, &mut result).await;
        self.insert_details(&accepted, &keys, &mut result).await;

        if self.kind == ImportKind::Buildings && self.reconcile_after_import {
            self.enter(ImportPhase::Reconciling);
            result.property_updates = Some(Reconciler::new(self.store).run().await);
        }

        self.enter(ImportPhase::Reporting);
        result.finish();
        tracing::info!(
            kind = %self.kind,
            total = result.total,
            successful = result.successful,
            failed = result.failed,
            duplicates = result.duplicates,
            details_inserted = result.details_inserted,
            errors = result.errors.len(),
            elapsed_ms = result.elapsed_ms,
            throughput_per_sec = result.throughput_per_sec,
            "Import finished"
        );
        self.enter(ImportPhase::Done);

        Ok(result)
    }

    /// The phase most recently entered: `Idle` before any import, `Done`
    /// after a completed one.
    pub fn phase(&self) -> ImportPhase {
        let idx = usize::from(self.phase.load(Ordering::Relaxed));
        ImportPhase::ALL.get(idx).copied().unwrap_or(ImportPhase::Idle)
    }

    fn enter(&self, phase: ImportPhase) {
        self.phase.store(phase as u8, Ordering::Relaxed);
        tracing::debug!(kind = %self.kind, phase = %phase, "Import phase");
    }

    /// Normalize and split every record. Records without an identifier are
    /// counted as failed and left out of the batch.
    fn stage(&self, records: &[ExternalRecord], result: &mut ImportResult) -> Vec<StagedRecord> {
        let dictionary = self.kind.dictionary();

        self.enter(ImportPhase::Normalizing);
        let normalized: Vec<_> = records.iter().map(|r| normalize(dictionary, r)).collect();

        self.enter(ImportPhase::Splitting);
        let mut staged = Vec::with_capacity(normalized.len());
        for (idx, record) in normalized.into_iter().enumerate() {
            let row_number = idx + 1;
            match split(dictionary, record) {
                Ok(split) => staged.push(StagedRecord { row_number, split }),
                Err(e) => {
                    tracing::debug!(row = row_number, error = %e, "Record skipped");
                    result.failed += 1;
                    result.errors.push(format!("row {row_number}: {e}"));
                }
            }
        }
        staged
    }

    /// Insert primary rows chunk by chunk. Returns, per chunk, the staged
    /// records the store accepted (inserted or already present).
    async fn insert_primary<'r>(
        &self,
        staged: &'r [StagedRecord],
        result: &mut ImportResult,
    ) -> Vec<Vec<&'r StagedRecord>> {
        self.enter(ImportPhase::InsertingPrimary);
        let table = self.kind.primary_table();
        let count = staged.len().div_ceil(self.options.chunk_size);
        let mut accepted_per_chunk = Vec::with_capacity(count);

        for (idx, chunk) in staged.chunks(self.options.chunk_size).enumerate() {
            let rows: Vec<PendingRow<'_>> = chunk
                .iter()
                .map(|s| PendingRow {
                    row_number: s.row_number,
                    identifier: &s.split.identifier,
                    data: s.split.primary.clone(),
                })
                .collect();
            let label = chunk_label(table, idx, count, &rows);
            let outcome = self.insert_chunk(label, &rows).await;

            result.successful += outcome.inserted;
            result.duplicates += (outcome.accepted.len() as u64).saturating_sub(outcome.inserted);
            result.failed += outcome.rejected;
            result.errors.extend(outcome.errors);

            accepted_per_chunk.push(outcome.accepted.iter().map(|&i| &chunk[i]).collect());
        }

        accepted_per_chunk
    }

    /// Re-query the primary table, one query per chunk, to learn the
    /// generated `id` of every accepted record.
    async fn resolve_keys(
        &self,
        accepted: &[Vec<&StagedRecord>],
        result: &mut ImportResult,
    ) -> HashMap<String, DbId> {
        self.enter(ImportPhase::ResolvingKeys);
        let table = self.kind.primary_table();
        let key_field = self.kind.dictionary().identifier().name;
        let count = accepted.len();
        let mut keys = HashMap::new();

        for (idx, chunk) in accepted.iter().enumerate() {
            if chunk.is_empty() {
                continue;
            }
            let mut identifiers: Vec<String> =
                chunk.iter().map(|s| s.split.identifier.clone()).collect();
            identifiers.sort_unstable();
            identifiers.dedup();

            match self.store.find_by_keys(table, key_field, &identifiers).await {
                Ok(rows) => {
                    for row in &rows {
                        let key = row.get(key_field).and_then(|v| v.as_str());
                        if let (Some(key), Some(id)) = (key, row_id(row)) {
                            keys.insert(key.to_string(), id);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        table = %table,
                        chunk = idx + 1,
                        error = %e,
                        "Key resolution failed"
                    );
                    result
                        .errors
                        .push(format!("{table} key resolution for chunk {}/{count}: {e}", idx + 1));
                }
            }
        }

        keys
    }

    /// Attach foreign keys and insert detail rows. Records whose primary row
    /// was rejected or could not be resolved are dropped without a second
    /// error.
    async fn insert_details(
        &self,
        accepted: &[Vec<&StagedRecord>],
        keys: &HashMap<String, DbId>,
        result: &mut ImportResult,
    ) {
        self.enter(ImportPhase::InsertingDetail);
        let table = self.kind.detail_table();
        let foreign_key = self.kind.foreign_key();

        let mut unresolved = 0usize;
        let rows: Vec<PendingRow<'_>> = accepted
            .iter()
            .flatten()
            .filter_map(|s| {
                let Some(&id) = keys.get(&s.split.identifier) else {
                    unresolved += 1;
                    return None;
                };
                let mut data = s.split.detail.clone();
                data.insert(foreign_key.to_string(), serde_json::Value::from(id));
                Some(PendingRow {
                    row_number: s.row_number,
                    identifier: &s.split.identifier,
                    data,
                })
            })
            .collect();

        if unresolved > 0 {
            tracing::debug!(table = %table, unresolved, "Detail rows without a resolved key dropped");
        }

        let count = rows.len().div_ceil(self.options.chunk_size);
        for (idx, chunk) in rows.chunks(self.options.chunk_size).enumerate() {
            let label = chunk_label(table, idx, count, chunk);
            let outcome = self.insert_chunk(label, chunk).await;
            result.details_inserted += outcome.inserted;
            result.errors.extend(outcome.errors);
        }
    }

    /// Attempt one chunk according to the configured failure policy.
    async fn insert_chunk(&self, label: ChunkLabel, rows: &[PendingRow<'_>]) -> ChunkOutcome {
        let mut outcome = ChunkOutcome::default();

        match self.options.chunk_failure {
            ChunkFailurePolicy::Skip => match self.try_insert(label.table, rows).await {
                Ok(inserted) => {
                    outcome.inserted = inserted;
                    outcome.accepted = (0..rows.len()).collect();
                }
                Err(e) => {
                    tracing::warn!(chunk = %label, rows = rows.len(), error = %e, "Chunk rejected");
                    outcome.rejected = rows.len() as u64;
                    outcome.errors.push(format!("{label}: {e}"));
                }
            },
            ChunkFailurePolicy::Bisect => {
                // Depth-first over half-open ranges, left half first.
                let mut pending = vec![(0, rows.len())];
                while let Some((start, end)) = pending.pop() {
                    match self.try_insert(label.table, &rows[start..end]).await {
                        Ok(inserted) => {
                            outcome.inserted += inserted;
                            outcome.accepted.extend(start..end);
                        }
                        Err(e) if end - start == 1 => {
                            let row = &rows[start];
                            tracing::warn!(
                                chunk = %label,
                                row = row.row_number,
                                identifier = row.identifier,
                                error = %e,
                                "Row rejected"
                            );
                            outcome.rejected += 1;
                            outcome.errors.push(format!(
                                "{label}: row {} (identifier {}): {e}",
                                row.row_number, row.identifier
                            ));
                        }
                        Err(e) => {
                            tracing::debug!(chunk = %label, start, end, error = %e, "Bisecting rejected range");
                            let mid = start + (end - start) / 2;
                            pending.push((mid, end));
                            pending.push((start, mid));
                        }
                    }
                }
                outcome.accepted.sort_unstable();
            }
        }

        outcome
    }

    async fn try_insert(&self, table: EntityTable, rows: &[PendingRow<'_>]) -> Result<u64, StoreError> {
        let data: Vec<Row> = rows.iter().map(|r| r.data.clone()).collect();
        self.store.bulk_insert(table, &data).await
    }
}

fn chunk_label(table: EntityTable, idx: usize, count: usize, rows: &[PendingRow<'_>]) -> ChunkLabel {
    ChunkLabel {
        table,
        index: idx + 1,
        count,
        first_row: rows.first().map_or(0, |r| r.row_number),
        last_row: rows.last().map_or(0, |r| r.row_number),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
