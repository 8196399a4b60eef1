//! Post-import reconciliation: copy each building's `property_type` onto the
//! properties that reference it.
//!
//! A pass is idempotent. Running it twice against unchanged data updates
//! nothing the second time.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::StoreError;
use crate::import_report::PropertyUpdateReport;
use crate::persistence::{row_id, EntityTable, PersistencePort, RowFilter};
use crate::reference::reference_id;
use crate::types::Row;

/// Property column holding the building reference object.
pub const BUILDING_REFERENCE_COLUMN: &str = "associated_building";

/// Column copied from building to property.
pub const DERIVED_COLUMN: &str = "property_type";

/// Building column the reference id is matched against.
pub const BUILDING_KEY_COLUMN: &str = "external_id";

/// What a building lookup found.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BuildingType {
    NotFound,
    Untyped,
    Typed(String),
}

/// Why a property was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    MissingId,
    MalformedReference,
    UnknownBuilding,
    UntypedBuilding,
    AlreadyCurrent,
    Vanished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Updated,
    Skipped(SkipReason),
}

/// Runs reconciliation passes against a [`PersistencePort`].
pub struct Reconciler<'a, S: PersistencePort + ?Sized> {
    store: &'a S,
}

impl<'a, S: PersistencePort + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Run one pass. Never fails: a failed listing query yields
    /// `errors = 1` and an otherwise empty report.
    pub async fn run(&self) -> PropertyUpdateReport {
        let mut report = PropertyUpdateReport::default();

        let filter = RowFilter::is_not_null(BUILDING_REFERENCE_COLUMN);
        let properties = match self.store.find_many(EntityTable::Properties, &filter).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list properties for reconciliation");
                report.errors = 1;
                return report;
            }
        };
        report.total_properties = properties.len() as u64;

        let mut buildings: HashMap<String, BuildingType> = HashMap::new();
        for property in &properties {
            match self.reconcile_one(property, &mut buildings).await {
                Ok(Outcome::Updated) => report.updated += 1,
                Ok(Outcome::Skipped(reason)) => {
                    tracing::trace!(property_id = ?row_id(property), ?reason, "Property skipped");
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(property_id = ?row_id(property), error = %e, "Property update failed");
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            total_properties = report.total_properties,
            updated = report.updated,
            skipped = report.skipped,
            errors = report.errors,
            buildings_looked_up = buildings.len(),
            "Reconciliation finished"
        );
        report
    }

    async fn reconcile_one(
        &self,
        property: &Row,
        buildings: &mut HashMap<String, BuildingType>,
    ) -> Result<Outcome, StoreError> {
        let Some(id) = row_id(property) else {
            return Ok(Outcome::Skipped(SkipReason::MissingId));
        };
        let Some(building_ref) = property.get(BUILDING_REFERENCE_COLUMN).and_then(reference_id)
        else {
            return Ok(Outcome::Skipped(SkipReason::MalformedReference));
        };

        let building_type = match buildings.get(&building_ref) {
            Some(cached) => cached.clone(),
            None => {
                let found = self.lookup_building_type(&building_ref).await?;
                buildings.insert(building_ref, found.clone());
                found
            }
        };

        let building_type = match building_type {
            BuildingType::Typed(t) => t,
            BuildingType::NotFound => return Ok(Outcome::Skipped(SkipReason::UnknownBuilding)),
            BuildingType::Untyped => return Ok(Outcome::Skipped(SkipReason::UntypedBuilding)),
        };

        if property.get(DERIVED_COLUMN).and_then(Value::as_str) == Some(building_type.as_str()) {
            return Ok(Outcome::Skipped(SkipReason::AlreadyCurrent));
        }

        let mut patch = Row::new();
        patch.insert(DERIVED_COLUMN.to_string(), Value::String(building_type));
        if self.store.update_one(EntityTable::Properties, id, &patch).await? {
            Ok(Outcome::Updated)
        } else {
            Ok(Outcome::Skipped(SkipReason::Vanished))
        }
    }

    async fn lookup_building_type(&self, building_ref: &str) -> Result<BuildingType, StoreError> {
        let rows = self
            .store
            .find_by_keys(
                EntityTable::Buildings,
                BUILDING_KEY_COLUMN,
                &[building_ref.to_string()],
            )
            .await?;

        let Some(building) = rows.first() else {
            return Ok(BuildingType::NotFound);
        };
        Ok(match building.get(DERIVED_COLUMN).and_then(Value::as_str) {
            Some(t) if !t.trim().is_empty() => BuildingType::Typed(t.to_string()),
            _ => BuildingType::Untyped,
        })
    }
}
