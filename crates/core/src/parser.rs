//! Tabular input parsing: CSV uploads and CRM JSON exports into
//! [`ExternalRecord`]s.

use serde_json::Value;

use crate::error::ImportError;
use crate::types::{vacant_key, ExternalRecord};

/// UTF-8 BOM bytes.
const UTF8_BOM: &str = "\u{feff}";

/// Key of the record array in a CRM API response envelope.
const CRM_ENVELOPE_KEY: &str = "data";

/// Parse CSV text with a header row into string-valued records.
///
/// Rows whose cells are all blank are skipped. Rows shorter than the header
/// simply lack the trailing keys. No cell is dropped: a blank header or a
/// cell beyond the header width is keyed `column_<n>` by 1-based position,
/// and a repeated header gets a `__2`, `__3`, ... suffix.
pub fn parse_csv(text: &str) -> Result<Vec<ExternalRecord>, ImportError> {
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);
    if text.trim().is_empty() {
        return Err(ImportError::NoRows);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ImportError::Parse(format!("failed to read CSV headers: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(ImportError::Parse("CSV header row is empty".to_string()));
    }
    let keys = header_keys(&headers);

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        // +2: header is line 1.
        let row = row.map_err(|e| ImportError::Parse(format!("line {}: {e}", idx + 2)))?;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let mut record = ExternalRecord::new();
        for (idx, cell) in row.iter().enumerate() {
            let key = match keys.get(idx) {
                Some(key) => key.clone(),
                None => vacant_key(&positional_key(idx), |k| {
                    record.contains_key(k) || keys.iter().any(|h| h == k)
                }),
            };
            record.insert(key, Value::String(cell.to_string()));
        }
        records.push(record);
    }

    if records.is_empty() {
        return Err(ImportError::NoRows);
    }
    Ok(records)
}

/// One distinct key per header cell.
fn header_keys(headers: &[String]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::with_capacity(headers.len());
    for (idx, header) in headers.iter().enumerate() {
        let base = if header.is_empty() {
            positional_key(idx)
        } else {
            header.clone()
        };
        let key = vacant_key(&base, |k| keys.iter().any(|taken| taken == k));
        keys.push(key);
    }
    keys
}

fn positional_key(idx: usize) -> String {
    format!("column_{}", idx + 1)
}

/// Parse a CRM JSON export: either a top-level array of objects or an API
/// envelope of the form `{ "data": [ ... ] }`.
pub fn parse_json(text: &str) -> Result<Vec<ExternalRecord>, ImportError> {
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);
    if text.trim().is_empty() {
        return Err(ImportError::NoRows);
    }

    let root: Value = serde_json::from_str(text)
        .map_err(|e| ImportError::Parse(format!("invalid JSON: {e}")))?;

    let items = match root {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove(CRM_ENVELOPE_KEY) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(ImportError::Parse(format!(
                    "expected an array of records or an object with a '{CRM_ENVELOPE_KEY}' array"
                )))
            }
        },
        _ => {
            return Err(ImportError::Parse(
                "expected an array of records".to_string(),
            ))
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(obj) => records.push(obj),
            other => {
                return Err(ImportError::Parse(format!(
                    "record {} is not an object (found {})",
                    idx + 1,
                    json_kind(&other)
                )))
            }
        }
    }

    if records.is_empty() {
        return Err(ImportError::NoRows);
    }
    Ok(records)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
