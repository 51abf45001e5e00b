//! # rowaudit
//!
//! Hash-based row-level change audit for relational databases. Every row of
//! the audited tables is fingerprinted and compared with the last recorded
//! fingerprint for the same row; new or changed rows are appended to an
//! audit log, one transaction per table.

pub mod auditor;
pub mod batch;
pub mod cli;
pub mod commands;
pub mod config;
pub mod connection;
pub mod diff;
pub mod duckdb_backend;
pub mod error;
pub mod hash;
pub mod metrics;
pub mod output;
pub mod progress;
pub mod row;
pub mod sqlite_backend;
pub mod store;
pub mod working_set;

pub use auditor::{Auditor, CancellationToken, RunOptions};
pub use config::Config;
pub use error::{AuditError, Result};
pub use metrics::Summary;
