//! Audit store and row source interfaces
//!
//! Both roles are implemented by every backend, so any engine can be the
//! audited source, the audit store, or both.

use crate::error::Result;
use crate::hash::Fingerprint;
use crate::row::Row;
use serde::{Deserialize, Serialize};

/// Schema of the audit store, shared by all backends
pub const AUDIT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS audit (
    TableName VARCHAR,
    PrimaryKey VARCHAR,
    RowHash VARCHAR,
    RowDump VARCHAR,
    Modified VARCHAR
);
CREATE TABLE IF NOT EXISTS history (
    ExecutionTimestamp VARCHAR,
    "Key" VARCHAR,
    "Value" VARCHAR
);
"#;

/// Last known state of one row identity in one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub table_name: String,
    /// Joined key column values; `None` for keyless tables
    pub identity: Option<String>,
    pub fingerprint: Fingerprint,
    /// Canonical row dump; omitted on the first run and in working sets
    pub dump: Option<String>,
    /// UTC commit time, `YYYY-MM-DD HH:MM:SS`; empty until committed
    pub modified: String,
}

impl AuditRecord {
    /// Key used to match this record against current rows
    pub fn working_key(&self) -> &str {
        self.identity.as_deref().unwrap_or(&self.fingerprint)
    }
}

/// One metric of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub execution_timestamp: String,
    pub key: String,
    pub value: String,
}

/// Durable audit log
pub trait AuditStore: Send {
    /// True when no audit record has ever been committed
    fn is_empty(&self) -> Result<bool>;

    /// All records for a table in append order, without dumps
    fn read_records(&self, table: &str) -> Result<Vec<AuditRecord>>;

    /// Write every record in a single transaction.
    ///
    /// Either all records are committed or none are.
    fn commit_records(&mut self, records: &[AuditRecord]) -> Result<()>;

    /// Append history rows in a single transaction
    fn append_history(&mut self, records: &[HistoryRecord]) -> Result<()>;

    /// All history rows in append order
    fn read_history(&self) -> Result<Vec<HistoryRecord>>;

    /// Open another handle on the same store for a parallel worker
    fn try_clone_store(&self) -> Result<Box<dyn AuditStore>>;
}

/// The database being audited
pub trait RowSource: Send {
    /// User tables in the source catalog, sorted by name
    fn list_tables(&self) -> Result<Vec<String>>;

    fn count_rows(&self, table: &str) -> Result<u64>;

    /// Stream every row of a table through `visit`.
    ///
    /// Stops at the first error returned by `visit`. Returns the number of
    /// rows visited.
    fn for_each_row(&self, table: &str, visit: &mut dyn FnMut(Row) -> Result<()>) -> Result<u64>;

    /// Open another handle on the same source for a parallel worker
    fn try_clone_source(&self) -> Result<Box<dyn RowSource>>;
}

/// Quote an identifier for use in SQL
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
