/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// One row of externally supplied tabular data: arbitrary string keys to
/// untyped scalar values, exactly as the parser produced them.
pub type ExternalRecord = serde_json::Map<String, serde_json::Value>;

/// A column-name to JSON-value map as exchanged with the persistence port.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// `base` if `taken` rejects it, else the first free `base__2`, `base__3`, ...
///
/// Used wherever two input values would otherwise land on the same key.
pub fn vacant_key(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}__{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
