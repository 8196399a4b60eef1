//! Record splitter: one normalized record into a primary row and a detail
//! row.
//!
//! Every canonical field lands in exactly one half. Raw-data fields and all
//! unrecognised external keys are folded into the detail row's `raw_data`
//! object, so no input key is dropped.

use serde_json::Value;

use crate::field_dictionary::{FieldDictionary, TargetEntity, RAW_DATA_COLUMN};
use crate::normalizer::{FieldValue, NormalizedRecord};
use crate::types::{vacant_key, Row};

/// The two halves of one input record, joined by `identifier`.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitRecord {
    /// Trimmed natural key, also present in `primary`.
    pub identifier: String,
    pub primary: Row,
    /// Detail columns plus a `raw_data` object. The foreign key is attached
    /// later, once the primary row's generated ID is known.
    pub detail: Row,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SplitError {
    #[error("missing identifier")]
    MissingIdentifier,
}

/// Split `record` according to the target entity of each field.
///
/// Fails only when the identifier field is absent, null, or blank.
pub fn split(
    dictionary: &FieldDictionary,
    record: NormalizedRecord,
) -> Result<SplitRecord, SplitError> {
    let id_field = dictionary.identifier().name;
    let identifier = match record.fields.get(id_field) {
        Some(FieldValue::Text(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => return Err(SplitError::MissingIdentifier),
    };

    let mut primary = Row::new();
    let mut detail = Row::new();
    let mut raw = record.unrecognized;

    primary.insert(id_field.to_string(), Value::String(identifier.clone()));

    for (name, value) in record.fields {
        if name == id_field {
            continue;
        }
        // The dictionary produced every key in `fields`; anything it cannot
        // classify goes to the overflow bag.
        let target = dictionary
            .target_entity(name)
            .unwrap_or(TargetEntity::RawData);
        match target {
            TargetEntity::Primary => {
                primary.insert(name.to_string(), value.to_json());
            }
            TargetEntity::Detail => {
                detail.insert(name.to_string(), value.to_json());
            }
            TargetEntity::RawData => {
                // The canonical value owns the field name; a shadowed verbatim
                // key already parked there moves to the next free suffix.
                if let Some(displaced) = raw.insert(name.to_string(), value.to_json()) {
                    let key = vacant_key(name, |k| raw.contains_key(k));
                    raw.insert(key, displaced);
                }
            }
        }
    }

    detail.insert(RAW_DATA_COLUMN.to_string(), Value::Object(raw));

    Ok(SplitRecord {
        identifier,
        primary,
        detail,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
