//! The persistence port: the narrow storage interface the importer and the
//! reconciler drive.
//!
//! Implementations live outside this crate (`estate-db` provides the
//! PostgreSQL one). Every call is expected to return or fail within the
//! implementation's own timeout policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::{DbId, Row};

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// The four tables the pipeline writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityTable {
    Properties,
    PropertyDetails,
    Buildings,
    BuildingDetails,
}

impl EntityTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Properties => "properties",
            Self::PropertyDetails => "property_details",
            Self::Buildings => "buildings",
            Self::BuildingDetails => "building_details",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "properties" => Some(Self::Properties),
            "property_details" => Some(Self::PropertyDetails),
            "buildings" => Some(Self::Buildings),
            "building_details" => Some(Self::BuildingDetails),
            _ => None,
        }
    }

    /// All valid table names.
    pub const ALL: &'static [&'static str] = &[
        "properties",
        "property_details",
        "buildings",
        "building_details",
    ];
}

impl std::fmt::Display for EntityTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Row filter for [`PersistencePort::find_many`].
#[derive(Debug, Clone, PartialEq)]
pub enum RowFilter {
    /// `column IS NOT NULL`
    IsNotNull(String),
    /// `column = value`
    Equals(String, serde_json::Value),
}

impl RowFilter {
    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self::IsNotNull(column.into())
    }

    pub fn equals(column: impl Into<String>, value: serde_json::Value) -> Self {
        Self::Equals(column.into(), value)
    }

    /// Evaluate the filter against an in-memory row.
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Self::IsNotNull(column) => row.get(column).is_some_and(|v| !v.is_null()),
            Self::Equals(column, value) => row.get(column) == Some(value),
        }
    }
}

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

/// Storage operations required by the pipeline.
///
/// Rows are plain column-to-JSON maps. Every table has a generated `id`
/// column that [`find_by_keys`](Self::find_by_keys) and
/// [`find_many`](Self::find_many) return.
#[async_trait]
pub trait PersistencePort: Send + Sync {
    /// Insert `records` in one statement, skipping any row whose unique key
    /// already exists. Returns the number of rows actually inserted. If any
    /// row is rejected, the whole call fails and nothing is inserted.
    async fn bulk_insert(&self, table: EntityTable, records: &[Row]) -> Result<u64, StoreError>;

    /// Fetch every row whose `key_field` equals one of `keys`.
    async fn find_by_keys(
        &self,
        table: EntityTable,
        key_field: &str,
        keys: &[String],
    ) -> Result<Vec<Row>, StoreError>;

    /// Fetch every row matching `filter`, ordered by `id`.
    async fn find_many(&self, table: EntityTable, filter: &RowFilter)
        -> Result<Vec<Row>, StoreError>;

    /// Apply `patch` to the row with the given `id`. Returns `false` when no
    /// such row exists.
    async fn update_one(&self, table: EntityTable, id: DbId, patch: &Row)
        -> Result<bool, StoreError>;
}

/// Read the generated `id` column from a row returned by the port.
pub fn row_id(row: &Row) -> Option<DbId> {
    row.get("id").and_then(serde_json::Value::as_i64)
}
