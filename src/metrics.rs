//! Run metrics, summaries and run history

use crate::error::Result;
use crate::store::{AuditStore, HistoryRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const KEY_DATABASE_CHANGES: &str = "Database changes";
pub const KEY_ROWS_PROCESSED: &str = "Rows processed";
pub const KEY_EXECUTION_TIME: &str = "Execution time";

/// Counters for one run (or one worker's share of it)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunMetrics {
    pub rows_processed: u64,
    pub rows_changed: u64,
    pub table_changes: BTreeMap<String, u64>,
    /// Working-set entries left over after each table's scan
    pub table_unseen: BTreeMap<String, u64>,
    pub elapsed: Duration,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table so it shows up with zero changes
    pub fn start_table(&mut self, table: &str) {
        self.table_changes.entry(table.to_string()).or_insert(0);
    }

    pub fn record_processed(&mut self) {
        self.rows_processed += 1;
    }

    pub fn record_changed(&mut self, table: &str) {
        self.rows_changed += 1;
        *self.table_changes.entry(table.to_string()).or_insert(0) += 1;
    }

    pub fn record_unseen(&mut self, table: &str, unseen: u64) {
        self.table_unseen.insert(table.to_string(), unseen);
    }

    pub fn changes_for(&self, table: &str) -> u64 {
        self.table_changes.get(table).copied().unwrap_or(0)
    }

    /// Fold another partial into this one
    pub fn merge(&mut self, other: RunMetrics) {
        self.rows_processed += other.rows_processed;
        self.rows_changed += other.rows_changed;
        for (table, changes) in other.table_changes {
            *self.table_changes.entry(table).or_insert(0) += changes;
        }
        self.table_unseen.extend(other.table_unseen);
    }
}

/// Per-table line of a summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub table: String,
    pub changes: u64,
    pub unseen: u64,
}

/// Result of an audit run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub rows_processed: u64,
    pub database_changes: u64,
    /// Sorted by table name
    pub tables: Vec<TableSummary>,
    pub elapsed_seconds: f64,
    pub execution_time: String,
    /// Set when history was persisted
    pub execution_timestamp: Option<String>,
}

impl Summary {
    pub fn from_metrics(metrics: &RunMetrics) -> Self {
        let tables = metrics
            .table_changes
            .iter()
            .map(|(table, changes)| TableSummary {
                table: table.clone(),
                changes: *changes,
                unseen: metrics.table_unseen.get(table).copied().unwrap_or(0),
            })
            .collect();

        Self {
            rows_processed: metrics.rows_processed,
            database_changes: metrics.rows_changed,
            tables,
            elapsed_seconds: metrics.elapsed.as_secs_f64(),
            execution_time: format_duration(metrics.elapsed),
            execution_timestamp: None,
        }
    }

    pub fn changes_for(&self, table: &str) -> Option<u64> {
        self.tables.iter().find(|t| t.table == table).map(|t| t.changes)
    }
}

/// History rows for one run, all sharing `timestamp`
pub fn history_records(metrics: &RunMetrics, timestamp: &str) -> Vec<HistoryRecord> {
    let entry = |key: String, value: String| HistoryRecord {
        execution_timestamp: timestamp.to_string(),
        key,
        value,
    };

    let mut records: Vec<HistoryRecord> = metrics
        .table_changes
        .iter()
        .map(|(table, changes)| entry(format!("Table {}", table), changes.to_string()))
        .collect();

    records.push(entry(
        KEY_DATABASE_CHANGES.to_string(),
        metrics.rows_changed.to_string(),
    ));
    records.push(entry(
        KEY_ROWS_PROCESSED.to_string(),
        metrics.rows_processed.to_string(),
    ));
    records.push(entry(
        KEY_EXECUTION_TIME.to_string(),
        format_duration(metrics.elapsed),
    ));

    records
}

/// Summarize a run and optionally append its history
pub fn finish(
    metrics: &RunMetrics,
    history_store: Option<&mut dyn AuditStore>,
    timestamp: &str,
) -> Result<Summary> {
    let mut summary = Summary::from_metrics(metrics);

    if let Some(store) = history_store {
        let records = history_records(metrics, timestamp);
        store.append_history(&records)?;
        log::debug!("Saved {} history records at {}", records.len(), timestamp);
        summary.execution_timestamp = Some(timestamp.to_string());
    }

    log::info!("{} {}", KEY_DATABASE_CHANGES, summary.database_changes);
    log::info!("{} {}", KEY_ROWS_PROCESSED, summary.rows_processed);
    log::info!("{} {}", KEY_EXECUTION_TIME, summary.execution_time);

    Ok(summary)
}

/// Human-readable duration, e.g. `1.204s` or `350.2ms`
pub fn format_duration(duration: Duration) -> String {
    format!("{:?}", duration)
}
