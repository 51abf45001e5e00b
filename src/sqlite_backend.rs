//! SQLite backend for the audit store and row source roles

use crate::error::{AuditError, Result};
use crate::row::{ColumnValue, Row};
use crate::store::{quote_ident, AuditRecord, AuditStore, HistoryRecord, RowSource, AUDIT_SCHEMA};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;

/// Location string for a private in-memory database
pub const IN_MEMORY: &str = ":memory:";

/// A SQLite connection
pub struct SqliteBackend {
    connection: Connection,
    location: String,
    read_only: bool,
}

impl SqliteBackend {
    /// Open (or create) a database for reading and writing
    pub fn open(location: &str) -> Result<Self> {
        let connection = if location == IN_MEMORY {
            Connection::open_in_memory()
        } else {
            Connection::open(Path::new(location))
        }
        .map_err(|e| {
            AuditError::connectivity(format!("Failed to open SQLite database '{}': {}", location, e))
        })?;

        Ok(Self {
            connection,
            location: location.to_string(),
            read_only: false,
        })
    }

    /// Open an existing database without write access
    pub fn open_read_only(location: &str) -> Result<Self> {
        if location == IN_MEMORY {
            return Self::open(location);
        }

        let connection = Connection::open_with_flags(
            Path::new(location),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            AuditError::connectivity(format!("Failed to open SQLite database '{}': {}", location, e))
        })?;

        Ok(Self {
            connection,
            location: location.to_string(),
            read_only: true,
        })
    }

    /// Create the audit and history tables if they are missing
    pub fn init_audit_schema(&self) -> Result<()> {
        self.connection
            .execute_batch(AUDIT_SCHEMA)
            .map_err(|e| AuditError::query(format!("Failed to create audit schema: {}", e)))
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Reopen the same database file.
    ///
    /// In-memory databases are private to their connection and cannot be
    /// shared with another worker.
    fn reopen(&self) -> Result<Self> {
        if self.location == IN_MEMORY {
            return Err(AuditError::config(
                "An in-memory SQLite database cannot be shared between workers; use workers = 1",
            ));
        }

        if self.read_only {
            Self::open_read_only(&self.location)
        } else {
            Self::open(&self.location)
        }
    }
}

impl AuditStore for SqliteBackend {
    fn is_empty(&self) -> Result<bool> {
        let count: i64 = self
            .connection
            .query_row("SELECT COUNT(*) FROM audit", [], |row| row.get(0))
            .map_err(|e| AuditError::query(format!("Failed to count audit records: {}", e)))?;
        Ok(count == 0)
    }

    fn read_records(&self, table: &str) -> Result<Vec<AuditRecord>> {
        let mut stmt = self
            .connection
            .prepare(
                "SELECT TableName, PrimaryKey, RowHash, Modified FROM audit \
                 WHERE TableName = ?1 ORDER BY rowid",
            )
            .map_err(|e| AuditError::query(format!("Failed to prepare audit query: {}", e)))?;

        let records = stmt
            .query_map(params![table], |row| {
                Ok(AuditRecord {
                    table_name: row.get(0)?,
                    identity: row.get(1)?,
                    fingerprint: row.get(2)?,
                    dump: None,
                    modified: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                })
            })
            .map_err(|e| {
                AuditError::query(format!("Failed to read audit records for '{}': {}", table, e))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn commit_records(&mut self, records: &[AuditRecord]) -> Result<()> {
        let tx = self
            .connection
            .transaction()
            .map_err(|e| AuditError::commit(format!("Failed to begin transaction: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO audit (TableName, PrimaryKey, RowHash, RowDump, Modified) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(|e| AuditError::commit(format!("Failed to prepare insert: {}", e)))?;

            for record in records {
                stmt.execute(params![
                    record.table_name,
                    record.identity,
                    record.fingerprint,
                    record.dump,
                    record.modified
                ])
                .map_err(|e| {
                    AuditError::commit(format!(
                        "Failed to write audit record for table '{}' (key {}): {}",
                        record.table_name,
                        record.working_key(),
                        e
                    ))
                })?;
            }
        }

        tx.commit()
            .map_err(|e| AuditError::commit(format!("Failed to commit transaction: {}", e)))
    }

    fn append_history(&mut self, records: &[HistoryRecord]) -> Result<()> {
        let tx = self
            .connection
            .transaction()
            .map_err(|e| AuditError::commit(format!("Failed to begin transaction: {}", e)))?;

        {
            let mut stmt = tx
                .prepare("INSERT INTO history (ExecutionTimestamp, \"Key\", \"Value\") VALUES (?1, ?2, ?3)")
                .map_err(|e| AuditError::commit(format!("Failed to prepare insert: {}", e)))?;

            for record in records {
                stmt.execute(params![record.execution_timestamp, record.key, record.value])
                    .map_err(|e| {
                        AuditError::commit(format!("Failed to write history '{}': {}", record.key, e))
                    })?;
            }
        }

        tx.commit()
            .map_err(|e| AuditError::commit(format!("Failed to commit history: {}", e)))
    }

    fn read_history(&self) -> Result<Vec<HistoryRecord>> {
        let mut stmt = self
            .connection
            .prepare("SELECT ExecutionTimestamp, \"Key\", \"Value\" FROM history ORDER BY rowid")
            .map_err(|e| AuditError::query(format!("Failed to prepare history query: {}", e)))?;

        let records = stmt
            .query_map([], |row| {
                Ok(HistoryRecord {
                    execution_timestamp: row.get(0)?,
                    key: row.get(1)?,
                    value: row.get(2)?,
                })
            })
            .map_err(|e| AuditError::query(format!("Failed to read history: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn try_clone_store(&self) -> Result<Box<dyn AuditStore>> {
        Ok(Box::new(self.reopen()?))
    }
}

impl RowSource for SqliteBackend {
    fn list_tables(&self) -> Result<Vec<String>> {
        log::debug!("Listing tables from SQLite database {}", self.location);

        let mut stmt = self
            .connection
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type='table' \
                 AND name NOT LIKE 'sqlite_%' \
                 ORDER BY name",
            )
            .map_err(|e| AuditError::query(format!("Failed to prepare table listing: {}", e)))?;

        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| AuditError::query(format!("Failed to list tables: {}", e)))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(tables)
    }

    fn count_rows(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count: i64 = self
            .connection
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| AuditError::query(format!("Failed to count rows in table '{}': {}", table, e)))?;
        Ok(count.max(0) as u64)
    }

    fn for_each_row(&self, table: &str, visit: &mut dyn FnMut(Row) -> Result<()>) -> Result<u64> {
        let sql = format!("SELECT * FROM {}", quote_ident(table));
        let mut stmt = self
            .connection
            .prepare(&sql)
            .map_err(|e| AuditError::query(format!("Failed to query table '{}': {}", table, e)))?;

        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let mut rows = stmt
            .query([])
            .map_err(|e| AuditError::query(format!("Failed to query table '{}': {}", table, e)))?;

        let mut visited = 0u64;
        while let Some(row) = rows
            .next()
            .map_err(|e| AuditError::query(format!("Failed to read row from '{}': {}", table, e)))?
        {
            let mut data = Row::with_capacity(columns.len());
            for (idx, column) in columns.iter().enumerate() {
                data.insert(column.clone(), column_value(row.get_ref(idx)?));
            }
            visit(data)?;
            visited += 1;
        }

        Ok(visited)
    }

    fn try_clone_source(&self) -> Result<Box<dyn RowSource>> {
        Ok(Box::new(self.reopen()?))
    }
}

/// Convert a SQLite value into a column value
fn column_value(value: ValueRef<'_>) -> ColumnValue {
    match value {
        ValueRef::Null => ColumnValue::Null,
        ValueRef::Integer(i) => ColumnValue::Integer(i),
        ValueRef::Real(f) => ColumnValue::Float(f),
        ValueRef::Text(s) => ColumnValue::from_text_bytes(s),
        ValueRef::Blob(b) => ColumnValue::Binary(b.to_vec()),
    }
}
