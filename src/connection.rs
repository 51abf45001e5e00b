//! Opening audit store and source connections from configuration

use crate::config::{AuditConfig, Config, DatabaseType, TargetConfig};
use crate::duckdb_backend::DuckDbBackend;
use crate::error::Result;
use crate::sqlite_backend::SqliteBackend;
use crate::store::{AuditStore, RowSource};
use std::time::Duration;

/// Delay before the first connection retry; doubles on each attempt
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Retry an operation with exponential backoff.
///
/// Only retryable errors (connectivity failures) trigger another attempt;
/// anything else is returned immediately. `max_retries` counts attempts after
/// the first one.
pub fn retry_with_backoff<T, F>(mut operation: F, max_retries: u32, initial_delay: Duration) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut delay = initial_delay;
    let mut attempt = 0;

    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                log::warn!(
                    "{} (attempt {}/{}), retrying in {:?}...",
                    e,
                    attempt,
                    max_retries + 1,
                    delay
                );
                std::thread::sleep(delay);
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Open the audit store, creating its tables if needed
pub fn open_audit_store(config: &AuditConfig, max_retries: u32) -> Result<Box<dyn AuditStore>> {
    let location = config.connection_string.as_str();
    log::debug!("Opening {} audit store at {}", config.db_type, location);

    let store: Box<dyn AuditStore> = match config.db_type {
        DatabaseType::DuckDb => {
            let backend =
                retry_with_backoff(|| DuckDbBackend::open(location), max_retries, INITIAL_RETRY_DELAY)?;
            backend.init_audit_schema()?;
            Box::new(backend)
        }
        DatabaseType::Sqlite => {
            let backend =
                retry_with_backoff(|| SqliteBackend::open(location), max_retries, INITIAL_RETRY_DELAY)?;
            backend.init_audit_schema()?;
            Box::new(backend)
        }
    };

    Ok(store)
}

/// Open the audited database read-only
pub fn open_source(config: &TargetConfig, max_retries: u32) -> Result<Box<dyn RowSource>> {
    let location = config.connection_string.as_str();
    log::debug!("Opening {} source at {}", config.db_type, location);

    let source: Box<dyn RowSource> = match config.db_type {
        DatabaseType::DuckDb => Box::new(retry_with_backoff(
            || DuckDbBackend::open_read_only(location),
            max_retries,
            INITIAL_RETRY_DELAY,
        )?),
        DatabaseType::Sqlite => Box::new(retry_with_backoff(
            || SqliteBackend::open_read_only(location),
            max_retries,
            INITIAL_RETRY_DELAY,
        )?),
    };

    Ok(source)
}

/// The two connections of an audit run
pub struct Connections {
    pub audit: Box<dyn AuditStore>,
    pub target: Box<dyn RowSource>,
}

impl Connections {
    /// Open the source first so a bad target never creates an audit file
    pub fn connect(config: &Config) -> Result<Self> {
        let target = open_source(&config.target, config.connect_retries)?;
        let audit = open_audit_store(&config.audit, config.connect_retries)?;
        Ok(Self { audit, target })
    }
}
