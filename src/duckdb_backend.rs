//! DuckDB backend for the audit store and row source roles

use crate::error::{AuditError, Result};
use crate::row::{ColumnValue, Row};
use crate::store::{quote_ident, AuditRecord, AuditStore, HistoryRecord, RowSource, AUDIT_SCHEMA};
use chrono::{DateTime, NaiveDate, NaiveTime};
use duckdb::types::{TimeUnit, ValueRef};
use duckdb::{params, AccessMode, Connection};
use std::path::Path;

/// Location string for a private in-memory database
pub const IN_MEMORY: &str = ":memory:";

/// A DuckDB connection
pub struct DuckDbBackend {
    connection: Connection,
    location: String,
}

impl DuckDbBackend {
    /// Open (or create) a database for reading and writing
    pub fn open(location: &str) -> Result<Self> {
        let connection = if location == IN_MEMORY {
            Connection::open_in_memory()
        } else {
            Connection::open(Path::new(location))
        }
        .map_err(|e| {
            AuditError::connectivity(format!("Failed to open DuckDB database '{}': {}", location, e))
        })?;

        Self::from_connection(connection, location)
    }

    /// Open an existing database without write access
    pub fn open_read_only(location: &str) -> Result<Self> {
        if location == IN_MEMORY {
            return Self::open(location);
        }

        if !Path::new(location).exists() {
            return Err(AuditError::connectivity(format!(
                "DuckDB database not found: {}",
                location
            )));
        }

        let config = duckdb::Config::default().access_mode(AccessMode::ReadOnly)?;
        let connection = Connection::open_with_flags(Path::new(location), config).map_err(|e| {
            AuditError::connectivity(format!("Failed to open DuckDB database '{}': {}", location, e))
        })?;

        Self::from_connection(connection, location)
    }

    /// Wrap an existing connection
    pub fn from_connection(connection: Connection, location: &str) -> Result<Self> {
        connection.execute_batch("SET enable_progress_bar=false")?;
        Ok(Self {
            connection,
            location: location.to_string(),
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

    fn column_names(&self, table: &str) -> Result<Vec<String>> {
        let sql = format!("DESCRIBE {}", quote_ident(table));
        let mut stmt = self.connection.prepare(&sql).map_err(|e| {
            AuditError::query(format!("Failed to describe table '{}': {}", table, e))
        })?;

        let columns = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| AuditError::query(format!("Failed to describe table '{}': {}", table, e)))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(columns)
    }
}

impl AuditStore for DuckDbBackend {
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
                 WHERE TableName = ? ORDER BY rowid",
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
                     VALUES (?, ?, ?, ?, ?)",
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

        // Dropping an uncommitted transaction rolls it back
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
                .prepare("INSERT INTO history (ExecutionTimestamp, \"Key\", \"Value\") VALUES (?, ?, ?)")
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
        let connection = self.connection.try_clone().map_err(|e| {
            AuditError::connectivity(format!("Failed to clone DuckDB connection: {}", e))
        })?;
        Ok(Box::new(Self {
            connection,
            location: self.location.clone(),
        }))
    }
}

impl RowSource for DuckDbBackend {
    fn list_tables(&self) -> Result<Vec<String>> {
        log::debug!("Listing tables from DuckDB database {}", self.location);

        let mut stmt = self
            .connection
            .prepare(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = 'main' AND table_type = 'BASE TABLE' \
                 ORDER BY table_name",
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
        let columns = self.column_names(table)?;

        let sql = format!("SELECT * FROM {}", quote_ident(table));
        let mut stmt = self
            .connection
            .prepare(&sql)
            .map_err(|e| AuditError::query(format!("Failed to query table '{}': {}", table, e)))?;
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
                let value = column_value(row.get_ref(idx)?).map_err(|e| {
                    AuditError::serialization(format!(
                        "table '{}', column '{}': {}",
                        table, column, e
                    ))
                })?;
                data.insert(column.clone(), value);
            }
            visit(data)?;
            visited += 1;
        }

        Ok(visited)
    }

    fn try_clone_source(&self) -> Result<Box<dyn RowSource>> {
        let connection = self.connection.try_clone().map_err(|e| {
            AuditError::connectivity(format!("Failed to clone DuckDB connection: {}", e))
        })?;
        Ok(Box::new(Self {
            connection,
            location: self.location.clone(),
        }))
    }
}

/// Convert a DuckDB value into a column value
fn column_value(value: ValueRef<'_>) -> std::result::Result<ColumnValue, String> {
    let converted = match value {
        ValueRef::Null => ColumnValue::Null,
        ValueRef::Boolean(b) => ColumnValue::Bool(b),
        ValueRef::TinyInt(i) => ColumnValue::Integer(i as i64),
        ValueRef::SmallInt(i) => ColumnValue::Integer(i as i64),
        ValueRef::Int(i) => ColumnValue::Integer(i as i64),
        ValueRef::BigInt(i) => ColumnValue::Integer(i),
        ValueRef::UTinyInt(i) => ColumnValue::Integer(i as i64),
        ValueRef::USmallInt(i) => ColumnValue::Integer(i as i64),
        ValueRef::UInt(i) => ColumnValue::Integer(i as i64),
        ValueRef::UBigInt(i) => i64::try_from(i)
            .map(ColumnValue::Integer)
            .unwrap_or_else(|_| ColumnValue::Text(i.to_string())),
        ValueRef::HugeInt(i) => i64::try_from(i)
            .map(ColumnValue::Integer)
            .unwrap_or_else(|_| ColumnValue::Text(i.to_string())),
        ValueRef::Float(f) => ColumnValue::Float(f as f64),
        ValueRef::Double(f) => ColumnValue::Float(f),
        ValueRef::Decimal(d) => ColumnValue::Text(d.to_string()),
        ValueRef::Text(s) => ColumnValue::from_text_bytes(s),
        ValueRef::Blob(b) => ColumnValue::Binary(b.to_vec()),
        ValueRef::Date32(days) => ColumnValue::Text(format_date(days)),
        ValueRef::Time64(unit, t) => ColumnValue::Text(format_time(to_micros(unit, t))),
        ValueRef::Timestamp(unit, ts) => ColumnValue::Text(format_timestamp(to_micros(unit, ts))),
        other => return Err(format!("unsupported value type {:?}", other.data_type())),
    };
    Ok(converted)
}

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

/// Days from 0001-01-01 to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn format_date(days: i32) -> String {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| days.to_string())
}

fn format_time(micros: i64) -> String {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    u32::try_from(secs)
        .ok()
        .and_then(|s| NaiveTime::from_num_seconds_from_midnight_opt(s, nanos))
        .map(|t| t.format("%H:%M:%S%.f").to_string())
        .unwrap_or_else(|| micros.to_string())
}

fn format_timestamp(micros: i64) -> String {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(secs, nanos)
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S%.f").to_string())
        .unwrap_or_else(|| micros.to_string())
}
