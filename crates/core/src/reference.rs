//! Structured references to other CRM records (owners, creators,
//! territories, buildings).

use serde::{Deserialize, Serialize};

/// A reference to another record, stored as `{ "id", "name", "email" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceObject {
    pub id: String,
    #[serde(rename = "name", default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
}

impl ReferenceObject {
    /// Build a minimal reference from a bare identifier.
    ///
    /// Upstream data frequently carries only the referenced record's ID where
    /// a full reference object is expected; name and email are left empty.
    pub fn from_legacy_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: String::new(),
            email: String::new(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "name": self.display_name,
            "email": self.email,
        })
    }
}

/// Extract the referenced record's ID from a stored reference value.
///
/// Accepts an object whose `id` is a non-empty string or a number, or a bare
/// non-empty string (rows written before references were structured).
/// Returns `None` for anything else.
pub fn reference_id(value: &serde_json::Value) -> Option<String> {
    let id = match value {
        serde_json::Value::Object(obj) => match obj.get("id")? {
            serde_json::Value::String(s) => s.trim().to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return None,
        },
        serde_json::Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}
