//! Row classification against a table's working set

use crate::config::Config;
use crate::error::{AuditError, Result};
use crate::hash::canonicalize;
use crate::metrics::RunMetrics;
use crate::row::Row;
use crate::store::AuditRecord;
use crate::working_set::WorkingSet;

/// How rows of one table are identified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePlan {
    pub table: String,
    /// Empty for keyless tables
    pub key_columns: Vec<String>,
    pub separator: String,
}

impl TablePlan {
    pub fn keyless(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key_columns: Vec::new(),
            separator: crate::config::DEFAULT_KEY_SEPARATOR.to_string(),
        }
    }

    pub fn keyed(table: impl Into<String>, key_columns: &[&str], separator: &str) -> Self {
        Self {
            table: table.into(),
            key_columns: key_columns.iter().map(|k| k.to_string()).collect(),
            separator: separator.to_string(),
        }
    }

    /// Plan for a table as configured
    pub fn from_config(config: &Config, table: &str) -> Self {
        Self {
            table: table.to_string(),
            key_columns: config.key_columns(table).map(|k| k.to_vec()).unwrap_or_default(),
            separator: config.key_separator.clone(),
        }
    }

    pub fn has_key(&self) -> bool {
        !self.key_columns.is_empty()
    }

    /// Join the key column values of a row.
    ///
    /// Returns `None` for keyless tables. Fails when a key column is missing
    /// from the row or when every key component is empty.
    pub fn identity(&self, row: &Row) -> Result<Option<String>> {
        if !self.has_key() {
            return Ok(None);
        }

        let mut parts = Vec::with_capacity(self.key_columns.len());
        for column in &self.key_columns {
            let value = row.get(column).ok_or_else(|| {
                AuditError::config(format!(
                    "Key column '{}' not found in table '{}'",
                    column, self.table
                ))
            })?;
            parts.push(value.key_text());
        }

        if parts.iter().all(|p| p.is_empty()) {
            return Err(AuditError::config(format!(
                "Empty primary key for table '{}' (key columns: {})",
                self.table,
                self.key_columns.join(", ")
            )));
        }

        Ok(Some(parts.join(&self.separator)))
    }
}

/// Outcome of classifying one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub record: AuditRecord,
    pub changed: bool,
}

/// Classify a row as changed or unchanged.
///
/// An unchanged row removes its entry from the working set. A changed row
/// leaves any entry under its key in place.
pub fn classify(
    plan: &TablePlan,
    row: &Row,
    working_set: &mut WorkingSet,
    metrics: &mut RunMetrics,
) -> Result<Classification> {
    metrics.record_processed();

    let identity = plan.identity(row)?;
    let canonical = canonicalize(row).map_err(|e| match e {
        AuditError::Serialization { message } => AuditError::serialization(format!(
            "table '{}'{}: {}",
            plan.table,
            identity
                .as_deref()
                .map(|id| format!(", row '{}'", id))
                .unwrap_or_default(),
            message
        )),
        other => other,
    })?;

    let record = AuditRecord {
        table_name: plan.table.clone(),
        identity,
        fingerprint: canonical.fingerprint,
        dump: Some(canonical.dump),
        modified: String::new(),
    };

    let key = record.working_key();
    let unchanged = working_set
        .get(key)
        .map(|previous| previous.fingerprint == record.fingerprint)
        .unwrap_or(false);

    if unchanged {
        working_set.remove(key);
        log::trace!("{}: '{}' unchanged", plan.table, key);
        return Ok(Classification {
            record,
            changed: false,
        });
    }

    log::trace!("{}: '{}' changed", plan.table, key);
    metrics.record_changed(&plan.table);
    Ok(Classification {
        record,
        changed: true,
    })
}
