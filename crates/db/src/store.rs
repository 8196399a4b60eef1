//! PostgreSQL implementation of the persistence port.
//!
//! Rows travel as JSON. Inserts and updates go through
//! `jsonb_populate_recordset` / `jsonb_populate_record`, so Postgres applies
//! each column's declared type; reads come back as `to_jsonb(t)`.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::Row as _;

use estate_core::error::StoreError;
use estate_core::field_dictionary::is_sql_identifier;
use estate_core::persistence::{EntityTable, PersistencePort, RowFilter};
use estate_core::types::{DbId, Row};

use crate::DbPool;

/// Persistence port backed by a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl PersistencePort for PgStore {
    async fn bulk_insert(&self, table: EntityTable, records: &[Row]) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut columns = BTreeSet::new();
        for record in records {
            for column in record.keys() {
                columns.insert(checked_identifier(column)?);
            }
        }
        let columns = columns.into_iter().collect::<Vec<_>>().join(", ");

        let query = format!(
            "INSERT INTO {table} ({columns}) \
             SELECT {columns} FROM jsonb_populate_recordset(NULL::{table}, $1) \
             ON CONFLICT DO NOTHING"
        );
        let payload = Value::Array(records.iter().cloned().map(Value::Object).collect());

        let result = sqlx::query(&query)
            .bind(payload)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        tracing::debug!(
            table = %table,
            rows = records.len(),
            inserted = result.rows_affected(),
            "Bulk insert"
        );
        Ok(result.rows_affected())
    }

    async fn find_by_keys(
        &self,
        table: EntityTable,
        key_field: &str,
        keys: &[String],
    ) -> Result<Vec<Row>, StoreError> {
        let key_field = checked_identifier(key_field)?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT to_jsonb(t) AS row FROM {table} t \
             WHERE t.{key_field}::text = ANY($1) \
             ORDER BY t.id"
        );
        let rows = sqlx::query(&query)
            .bind(keys)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        decode_rows(rows)
    }

    async fn find_many(
        &self,
        table: EntityTable,
        filter: &RowFilter,
    ) -> Result<Vec<Row>, StoreError> {
        let rows = match filter {
            RowFilter::IsNotNull(column) => {
                let column = checked_identifier(column)?;
                let query = format!(
                    "SELECT to_jsonb(t) AS row FROM {table} t \
                     WHERE t.{column} IS NOT NULL \
                     ORDER BY t.id"
                );
                sqlx::query(&query).fetch_all(&self.pool).await
            }
            RowFilter::Equals(column, value) => {
                let column = checked_identifier(column)?;
                let query = format!(
                    "SELECT to_jsonb(t) AS row FROM {table} t \
                     WHERE to_jsonb(t) -> '{column}' = $1 \
                     ORDER BY t.id"
                );
                sqlx::query(&query)
                    .bind(value.clone())
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(store_error)?;
        decode_rows(rows)
    }

    async fn update_one(
        &self,
        table: EntityTable,
        id: DbId,
        patch: &Row,
    ) -> Result<bool, StoreError> {
        let mut assignments = patch
            .keys()
            .map(|column| checked_identifier(column).map(|c| format!("{c} = p.{c}")))
            .collect::<Result<Vec<_>, _>>()?;
        assignments.push("updated_at = now()".to_string());

        let query = format!(
            "UPDATE {table} AS t SET {} \
             FROM jsonb_populate_record(NULL::{table}, $2) AS p \
             WHERE t.id = $1",
            assignments.join(", ")
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(Value::Object(patch.clone()))
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }
}

/// Column names are interpolated into SQL, so only plain lowercase
/// identifiers are accepted.
fn checked_identifier(name: &str) -> Result<&str, StoreError> {
    if is_sql_identifier(name) {
        Ok(name)
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

fn decode_rows(rows: Vec<PgRow>) -> Result<Vec<Row>, StoreError> {
    rows.into_iter()
        .map(|r| match r.try_get::<Value, _>("row").map_err(store_error)? {
            Value::Object(row) => Ok(row),
            other => Err(StoreError::Rejected(format!(
                "expected a row object, got {other}"
            ))),
        })
        .collect()
}

/// Map a driver error onto the port's error type. Constraint and type
/// violations are rejections; connectivity problems are unavailability.
fn store_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) => StoreError::Rejected(db.message().to_string()),
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
        _ => StoreError::Rejected(e.to_string()),
    }
}
