//! Per-table batch of changed rows, committed in one transaction

use crate::error::Result;
use crate::store::{AuditRecord, AuditStore};
use chrono::{DateTime, Utc};

/// Timestamp format for audit and history rows
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current UTC time at second precision
pub fn timestamp_now() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Changed rows of one table awaiting commit
#[derive(Debug)]
pub struct TableBatch {
    table: String,
    keep_dumps: bool,
    records: Vec<AuditRecord>,
}

impl TableBatch {
    /// Start an empty batch. Without `keep_dumps` (the first run) row dumps
    /// are dropped as records are pushed.
    pub fn new(table: impl Into<String>, keep_dumps: bool) -> Self {
        Self {
            table: table.into(),
            keep_dumps,
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, mut record: AuditRecord) {
        if !self.keep_dumps {
            record.dump = None;
        }
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Commit every record in one transaction.
    ///
    /// Each record is stamped with `modified`. Returns the number of records
    /// written.
    pub fn commit(self, store: &mut dyn AuditStore, modified: &str) -> Result<usize> {
        if self.records.is_empty() {
            log::debug!("No changes to commit for table '{}'", self.table);
            return Ok(0);
        }

        let records: Vec<AuditRecord> = self
            .records
            .into_iter()
            .map(|mut record| {
                record.modified = modified.to_string();
                record
            })
            .collect();

        store.commit_records(&records)?;
        log::debug!("Committed {} audit records for table '{}'", records.len(), self.table);

        Ok(records.len())
    }
}
