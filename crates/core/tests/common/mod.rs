//! In-memory [`PersistencePort`] used by the importer and reconciler tests.
//!
//! Each table has one unique key: `external_id` on the primary tables and the
//! foreign-key column on the detail tables. Conflicting rows are skipped, the
//! way `ON CONFLICT DO NOTHING` behaves.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use estate_core::error::StoreError;
use estate_core::persistence::{EntityTable, PersistencePort, RowFilter};
use estate_core::types::{DbId, Row};

type RejectFn = Box<dyn Fn(EntityTable, &Row) -> bool + Send + Sync>;

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<EntityTable, Vec<Row>>>,
    next_id: Mutex<DbId>,
    reject: Option<RejectFn>,
    fail_listing: bool,
    fail_updates: bool,
    fail_key_lookup: Option<String>,
    insert_calls: Mutex<Vec<(EntityTable, usize)>>,
    lookups: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any bulk insert containing a row for which `f` returns true.
    pub fn reject_when(
        mut self,
        f: impl Fn(EntityTable, &Row) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.reject = Some(Box::new(f));
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    /// Fail any `find_by_keys` call whose keys include `identifier`.
    pub fn failing_key_lookup(mut self, identifier: &str) -> Self {
        self.fail_key_lookup = Some(identifier.to_string());
        self
    }

    /// Insert rows directly, bypassing rejection. Returns their ids.
    pub fn seed(&self, table: EntityTable, rows: Vec<Value>) -> Vec<DbId> {
        let mut tables = self.tables.lock().unwrap();
        let stored = tables.entry(table).or_default();
        rows.into_iter()
            .map(|v| {
                let mut row = v.as_object().cloned().unwrap();
                let id = self.allocate_id();
                row.insert("id".into(), Value::from(id));
                stored.push(row);
                id
            })
            .collect()
    }

    pub fn rows(&self, table: EntityTable) -> Vec<Row> {
        self.tables
            .lock()
            .unwrap()
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn find(&self, table: EntityTable, column: &str, value: &str) -> Option<Row> {
        self.rows(table)
            .into_iter()
            .find(|r| r.get(column).and_then(Value::as_str) == Some(value))
    }

    /// `(table, rows)` for every bulk insert attempted, in order.
    pub fn insert_calls(&self) -> Vec<(EntityTable, usize)> {
        self.insert_calls.lock().unwrap().clone()
    }

    /// Number of `find_by_keys` calls against the buildings table.
    pub fn building_lookups(&self) -> usize {
        *self.lookups.lock().unwrap()
    }

    fn allocate_id(&self) -> DbId {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        *next
    }
}

fn unique_key(table: EntityTable) -> &'static str {
    match table {
        EntityTable::Properties | EntityTable::Buildings => "external_id",
        EntityTable::PropertyDetails => "property_id",
        EntityTable::BuildingDetails => "building_id",
    }
}

#[async_trait]
impl PersistencePort for MemoryStore {
    async fn bulk_insert(&self, table: EntityTable, records: &[Row]) -> Result<u64, StoreError> {
        self.insert_calls.lock().unwrap().push((table, records.len()));

        if let Some(reject) = &self.reject {
            if records.iter().any(|r| reject(table, r)) {
                return Err(StoreError::Rejected(format!(
                    "violates check constraint on {table}"
                )));
            }
        }

        let key = unique_key(table);
        let mut tables = self.tables.lock().unwrap();
        let stored = tables.entry(table).or_default();
        let mut inserted = 0;
        for record in records {
            let exists = stored.iter().any(|r| r.get(key) == record.get(key));
            if exists {
                continue;
            }
            let mut row = record.clone();
            row.insert("id".into(), Value::from(self.allocate_id()));
            stored.push(row);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn find_by_keys(
        &self,
        table: EntityTable,
        key_field: &str,
        keys: &[String],
    ) -> Result<Vec<Row>, StoreError> {
        if table == EntityTable::Buildings {
            *self.lookups.lock().unwrap() += 1;
        }
        if let Some(poisoned) = &self.fail_key_lookup {
            if keys.contains(poisoned) {
                return Err(StoreError::Unavailable("read timed out".into()));
            }
        }
        Ok(self
            .rows(table)
            .into_iter()
            .filter(|r| {
                r.get(key_field)
                    .and_then(Value::as_str)
                    .is_some_and(|k| keys.iter().any(|wanted| wanted == k))
            })
            .collect())
    }

    async fn find_many(
        &self,
        table: EntityTable,
        filter: &RowFilter,
    ) -> Result<Vec<Row>, StoreError> {
        if self.fail_listing {
            return Err(StoreError::Unavailable("connection reset".into()));
        }
        Ok(self
            .rows(table)
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect())
    }

    async fn update_one(
        &self,
        table: EntityTable,
        id: DbId,
        patch: &Row,
    ) -> Result<bool, StoreError> {
        if self.fail_updates {
            return Err(StoreError::Unavailable("statement timeout".into()));
        }
        let mut tables = self.tables.lock().unwrap();
        let Some(row) = tables
            .get_mut(&table)
            .and_then(|rows| rows.iter_mut().find(|r| r.get("id") == Some(&Value::from(id))))
        else {
            return Ok(false);
        };
        for (k, v) in patch {
            row.insert(k.clone(), v.clone());
        }
        Ok(true)
    }
}
