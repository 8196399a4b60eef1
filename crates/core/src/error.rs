#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid field dictionary '{dictionary}': {reason}")]
    InvalidDictionary {
        dictionary: &'static str,
        reason: String,
    },
}

/// Errors that abort an import invocation before anything is persisted.
///
/// Record-level, chunk-level and reconciliation defects never surface here;
/// they are absorbed into the [`ImportResult`](crate::import_report::ImportResult).
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Failed to parse input: {0}")]
    Parse(String),

    #[error("Input contains no data rows")]
    NoRows,

    #[error("Invalid import options: {0}")]
    InvalidOptions(String),
}

/// Failure reported by a [`PersistencePort`](crate::persistence::PersistencePort)
/// implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The store rejected the statement (constraint or type violation).
    #[error("{0}")]
    Rejected(String),

    /// The store could not be reached or the call did not complete.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The caller passed a table or column name the store refuses to use.
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),
}
