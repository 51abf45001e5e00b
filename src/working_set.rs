//! Per-table working set of previously audited rows

use crate::error::Result;
use crate::store::{AuditRecord, AuditStore};
use std::collections::HashMap;

/// Previously audited rows of one table, keyed by identity or fingerprint.
///
/// Entries are removed as current rows match them; whatever remains after a
/// scan was not observed in that scan.
#[derive(Debug, Default)]
pub struct WorkingSet {
    table: String,
    entries: HashMap<String, AuditRecord>,
}

impl WorkingSet {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            entries: HashMap::new(),
        }
    }

    /// Load the working set for a table from the audit store
    pub fn load(store: &dyn AuditStore, table: &str) -> Result<Self> {
        let records = store.read_records(table)?;
        let loaded = records.len();
        let working_set = Self::from_records(table, records);

        log::debug!(
            "Loaded {} audit records for table '{}' ({} distinct keys)",
            loaded,
            table,
            working_set.len()
        );

        Ok(working_set)
    }

    /// Build from records in append order; later records replace earlier ones
    pub fn from_records(table: impl Into<String>, records: Vec<AuditRecord>) -> Self {
        let mut working_set = Self::new(table);
        for record in records {
            working_set.insert(record);
        }
        working_set
    }

    pub fn insert(&mut self, record: AuditRecord) {
        self.entries.insert(record.working_key().to_string(), record);
    }

    pub fn get(&self, key: &str) -> Option<&AuditRecord> {
        self.entries.get(key)
    }

    /// Mark a key as seen
    pub fn remove(&mut self, key: &str) -> Option<AuditRecord> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries not matched by any row so far, sorted by key
    pub fn unseen(&self) -> Vec<&AuditRecord> {
        let mut leftovers: Vec<&AuditRecord> = self.entries.values().collect();
        leftovers.sort_by(|a, b| a.working_key().cmp(b.working_key()));
        leftovers
    }

    /// Log the entries left after a scan and return how many there are
    pub fn report_unseen(&self) -> u64 {
        let unseen = self.unseen();
        if !unseen.is_empty() {
            log::debug!(
                "{} previously audited rows of '{}' were not seen in this scan",
                unseen.len(),
                self.table
            );
            for record in &unseen {
                log::trace!("Not seen in '{}': {}", self.table, record.working_key());
            }
        }
        unseen.len() as u64
    }
}
