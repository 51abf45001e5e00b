//! Configuration for audit runs
//!
//! Loaded from a JSON file (`./config.json` by default). Every field has a
//! default, so a partial file only overrides what it names.

use crate::error::{AuditError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Default separator placed between key column values
pub const DEFAULT_KEY_SEPARATOR: &str = "|";

/// Database engine behind a connection string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseType {
    #[serde(rename = "duckdb")]
    DuckDb,
    #[serde(rename = "sqlite3", alias = "sqlite")]
    Sqlite,
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseType::DuckDb => write!(f, "duckdb"),
            DatabaseType::Sqlite => write!(f, "sqlite3"),
        }
    }
}

/// Where audit records and run history are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditConfig {
    #[serde(rename = "type")]
    pub db_type: DatabaseType,
    pub connection_string: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            db_type: DatabaseType::DuckDb,
            connection_string: "./audit.duckdb".to_string(),
        }
    }
}

/// A table to audit, optionally with the columns that identify its rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetTable {
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_columns: Option<Vec<String>>,
}

impl TargetTable {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            key_columns: None,
        }
    }

    pub fn with_keys(table_name: impl Into<String>, keys: &[&str]) -> Self {
        Self {
            table_name: table_name.into(),
            key_columns: Some(keys.iter().map(|k| k.to_string()).collect()),
        }
    }
}

/// The database being audited
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
    #[serde(rename = "type")]
    pub db_type: DatabaseType,
    pub connection_string: String,
    /// Allow-list of tables; `None` audits every table in the catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<TargetTable>>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            db_type: DatabaseType::Sqlite,
            connection_string: "./Chinook_Sqlite.sqlite".to_string(),
            tables: None,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub key_separator: String,
    pub audit: AuditConfig,
    pub target: TargetConfig,
    /// Tables scanned concurrently; commits stay sequential
    pub workers: usize,
    pub table_timeout_seconds: Option<u64>,
    /// Extra attempts when a connection cannot be established
    pub connect_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_separator: DEFAULT_KEY_SEPARATOR.to_string(),
            audit: AuditConfig::default(),
            target: TargetConfig::default(),
            workers: 1,
            table_timeout_seconds: None,
            connect_retries: 3,
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// With an explicit path the file must exist. Without one,
    /// `./config.json` is read if present and the defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(AuditError::config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Self::from_file(path)?
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    log::debug!("No {} found, using default configuration", DEFAULT_CONFIG_FILE);
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content).map_err(|e| {
            AuditError::config(format!("Invalid config file {}: {}", path.display(), e))
        })?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Write configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.key_separator.is_empty() {
            return Err(AuditError::config("keySeparator must not be empty"));
        }

        if self.workers == 0 {
            return Err(AuditError::config("workers must be at least 1"));
        }

        if self.table_timeout_seconds == Some(0) {
            return Err(AuditError::config("tableTimeoutSeconds must be greater than 0"));
        }

        if let Some(tables) = &self.target.tables {
            let mut seen = HashSet::new();
            for table in tables {
                if table.table_name.trim().is_empty() {
                    return Err(AuditError::config("tableName must not be empty"));
                }
                if !seen.insert(table.table_name.as_str()) {
                    return Err(AuditError::config(format!(
                        "Table '{}' is listed more than once",
                        table.table_name
                    )));
                }
                if let Some(keys) = &table.key_columns {
                    if keys.iter().any(|k| k.is_empty()) {
                        return Err(AuditError::config(format!(
                            "Table '{}' has an empty key column name",
                            table.table_name
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Key columns configured for a table, if any
    pub fn key_columns(&self, table_name: &str) -> Option<&[String]> {
        self.target
            .tables
            .as_ref()?
            .iter()
            .find(|t| t.table_name == table_name)
            .and_then(|t| t.key_columns.as_deref())
            .filter(|keys| !keys.is_empty())
    }

    /// Table names from the allow-list, in configuration order
    pub fn allowed_tables(&self) -> Option<Vec<String>> {
        self.target
            .tables
            .as_ref()
            .map(|tables| tables.iter().map(|t| t.table_name.clone()).collect())
    }

    pub fn table_timeout(&self) -> Option<Duration> {
        self.table_timeout_seconds.map(Duration::from_secs)
    }
}
