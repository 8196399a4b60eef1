use estate_core::importer::{
    validate_chunk_size, ChunkFailurePolicy, ImportOptions, DEFAULT_CHUNK_SIZE,
};

/// Default tracing filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "estate_worker=info,estate_core=info,estate_db=info";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub import: ImportOptions,
    /// Run the reconciler right after a building import.
    pub reconcile_after_building_import: bool,
    pub log_format: LogFormat,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                           | Default    |
    /// |-----------------------------------|------------|
    /// | `DATABASE_URL`                    | (required) |
    /// | `DB_MAX_CONNECTIONS`              | `5`        |
    /// | `IMPORT_CHUNK_SIZE`               | `100`      |
    /// | `IMPORT_CHUNK_FAILURE`            | `skip`     |
    /// | `RECONCILE_AFTER_BUILDING_IMPORT` | `true`     |
    /// | `LOG_FORMAT`                      | `text`     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let max_connections: u32 = parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?;
        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                name: "DB_MAX_CONNECTIONS",
                reason: "must be at least 1".into(),
            });
        }

        let chunk_size: usize = parse_or(&lookup, "IMPORT_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        validate_chunk_size(chunk_size).map_err(|e| ConfigError::Invalid {
            name: "IMPORT_CHUNK_SIZE",
            reason: e.to_string(),
        })?;

        let chunk_failure = match lookup("IMPORT_CHUNK_FAILURE") {
            None => ChunkFailurePolicy::default(),
            Some(v) => ChunkFailurePolicy::from_str(v.trim()).ok_or_else(|| {
                ConfigError::Invalid {
                    name: "IMPORT_CHUNK_FAILURE",
                    reason: format!("expected 'skip' or 'bisect', got '{v}'"),
                }
            })?,
        };

        let reconcile_after_building_import =
            parse_or(&lookup, "RECONCILE_AFTER_BUILDING_IMPORT", true)?;

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    reason: format!("expected 'text' or 'json', got '{other}'"),
                })
            }
        };

        Ok(Self {
            database_url,
            max_connections,
            import: ImportOptions {
                chunk_size,
                chunk_failure,
            },
            reconcile_after_building_import,
            log_format,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}
