//! Audit run controller: loads, scans and commits every table of a run

use crate::batch::{timestamp_now, TableBatch};
use crate::config::Config;
use crate::diff::{classify, TablePlan};
use crate::error::{AuditError, Result};
use crate::metrics::{finish, RunMetrics, Summary};
use crate::progress::ProgressReporter;
use crate::store::{AuditStore, RowSource};
use crate::working_set::WorkingSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Cloneable flag for stopping a run between tables or rows
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with `Cancelled` once cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(AuditError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Per-run knobs, usually taken from config and overridden on the command line
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub save_history: bool,
    pub workers: usize,
    pub table_timeout: Option<Duration>,
    pub show_progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            save_history: false,
            workers: 1,
            table_timeout: None,
            show_progress: false,
        }
    }
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            save_history: false,
            workers: config.workers.max(1),
            table_timeout: config.table_timeout(),
            show_progress: true,
        }
    }
}

/// Outcome of scanning one table, not yet committed
#[derive(Debug)]
pub struct TableScan {
    pub table: String,
    pub batch: TableBatch,
    pub metrics: RunMetrics,
}

/// Tables audited by a run: the allow-list when configured, else the catalog
pub fn tables_to_audit(config: &Config, source: &dyn RowSource) -> Result<Vec<String>> {
    match config.allowed_tables() {
        Some(tables) => Ok(tables),
        None => source.list_tables(),
    }
}

pub struct Auditor<'a> {
    config: &'a Config,
    options: RunOptions,
    cancel: CancellationToken,
    progress: ProgressReporter,
}

impl<'a> Auditor<'a> {
    pub fn new(config: &'a Config, options: RunOptions) -> Self {
        let progress = ProgressReporter::new(options.show_progress);
        Self {
            config,
            options,
            cancel: CancellationToken::new(),
            progress,
        }
    }

    /// Share a cancellation token with the caller
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Audit every table and return the run summary.
    ///
    /// Each table is committed in its own transaction. A failure aborts the
    /// run; tables committed before it stay in the store.
    pub fn run(&self, store: &mut dyn AuditStore, source: &dyn RowSource) -> Result<Summary> {
        let started = Instant::now();

        let first_run = store.is_empty()?;
        if first_run {
            log::info!("Audit store is empty, recording fingerprints without row dumps");
        }

        let tables = tables_to_audit(self.config, source)?;
        log::debug!("Auditing {} tables", tables.len());

        let mut metrics = RunMetrics::new();

        if self.options.workers > 1 && tables.len() > 1 {
            let mut slots = self
                .scan_parallel(&tables, &*store, source, first_run)?
                .into_iter();
            while let Some(slot) = slots.next() {
                let scan = match slot {
                    Some(scan) => scan?,
                    // Never scanned because a later table already failed
                    None => {
                        return Err(slots
                            .by_ref()
                            .flatten()
                            .find_map(Result::err)
                            .unwrap_or(AuditError::Cancelled))
                    }
                };
                self.cancel.check()?;
                self.commit_scan(scan, store, &mut metrics)?;
            }
        } else {
            for table in &tables {
                self.cancel.check()?;
                let scan = self.scan_table(table, &*store, source, first_run)?;
                self.commit_scan(scan, store, &mut metrics)?;
            }
        }

        metrics.elapsed = started.elapsed();
        let history_store = if self.options.save_history {
            Some(store)
        } else {
            None
        };
        finish(&metrics, history_store, &timestamp_now())
    }

    /// Load the working set of a table and classify every current row.
    ///
    /// On the first run changed rows are collected without their dumps.
    pub fn scan_table(
        &self,
        table: &str,
        store: &dyn AuditStore,
        source: &dyn RowSource,
        first_run: bool,
    ) -> Result<TableScan> {
        let plan = TablePlan::from_config(self.config, table);
        let mut working_set = WorkingSet::load(store, table)?;

        let total_rows = source.count_rows(table)?;
        let pb = self.progress.table_bar(table, total_rows);

        let started = Instant::now();
        let check_deadline = |started: Instant| -> Result<()> {
            match self.options.table_timeout {
                Some(limit) if started.elapsed() >= limit => Err(AuditError::Timeout {
                    table: table.to_string(),
                    seconds: limit.as_secs(),
                }),
                _ => Ok(()),
            }
        };

        let mut metrics = RunMetrics::new();
        metrics.start_table(table);
        let mut batch = TableBatch::new(table, !first_run);

        let scanned = source.for_each_row(table, &mut |row| {
            self.cancel.check()?;
            check_deadline(started)?;

            let classification = classify(&plan, &row, &mut working_set, &mut metrics)?;
            if classification.changed {
                batch.push(classification.record);
            }
            pb.inc(1);
            Ok(())
        });
        pb.finish_and_clear();

        let scanned = scanned?;
        check_deadline(started)?;

        metrics.record_unseen(table, working_set.report_unseen());

        log::debug!(
            "Scanned {} rows of '{}', {} changed",
            scanned,
            table,
            batch.len()
        );

        Ok(TableScan {
            table: table.to_string(),
            batch,
            metrics,
        })
    }

    /// Scan tables on a worker pool, each worker with its own connections.
    ///
    /// Results come back in table order. After a failure, workers stop taking
    /// new tables and the slots they never reached stay `None`.
    fn scan_parallel(
        &self,
        tables: &[String],
        store: &dyn AuditStore,
        source: &dyn RowSource,
        first_run: bool,
    ) -> Result<Vec<Option<Result<TableScan>>>> {
        let workers = self.options.workers.min(tables.len());
        log::debug!("Scanning {} tables with {} workers", tables.len(), workers);

        let mut connections = Vec::with_capacity(workers);
        for _ in 0..workers {
            connections.push((store.try_clone_store()?, source.try_clone_source()?));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| AuditError::config(format!("Failed to start worker pool: {}", e)))?;

        let next = AtomicUsize::new(0);
        let failed = AtomicBool::new(false);
        let slots: Mutex<Vec<Option<Result<TableScan>>>> =
            Mutex::new(tables.iter().map(|_| None).collect());

        pool.scope(|scope| {
            for (worker_store, worker_source) in connections {
                let next = &next;
                let failed = &failed;
                let slots = &slots;
                scope.spawn(move |_| loop {
                    if failed.load(Ordering::SeqCst) {
                        break;
                    }
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(table) = tables.get(index) else {
                        break;
                    };

                    let result = self.scan_table(
                        table,
                        worker_store.as_ref(),
                        worker_source.as_ref(),
                        first_run,
                    );
                    if result.is_err() {
                        failed.store(true, Ordering::SeqCst);
                    }
                    if let Ok(mut slots) = slots.lock() {
                        slots[index] = Some(result);
                    }
                });
            }
        });

        slots
            .into_inner()
            .map_err(|_| AuditError::query("A scan worker panicked"))
    }

    fn commit_scan(
        &self,
        scan: TableScan,
        store: &mut dyn AuditStore,
        metrics: &mut RunMetrics,
    ) -> Result<()> {
        let TableScan {
            table,
            batch,
            metrics: table_metrics,
        } = scan;

        let written = batch.commit(store, &timestamp_now())?;
        log::debug!("Table {} changes {}", table, written);

        metrics.merge(table_metrics);
        Ok(())
    }
}
