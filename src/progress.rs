//! Progress reporting utilities

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Progress reporter for audit runs.
///
/// Hands out one bar per table scan. When disabled every bar is hidden, so
/// callers never branch on whether progress is shown.
#[derive(Clone)]
pub struct ProgressReporter {
    multi: Option<MultiProgress>,
}

impl ProgressReporter {
    pub fn new(show_progress: bool) -> Self {
        if show_progress {
            Self {
                multi: Some(MultiProgress::new()),
            }
        } else {
            Self::new_minimal()
        }
    }

    /// Create minimal progress reporter (no progress bars)
    pub fn new_minimal() -> Self {
        Self { multi: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.multi.is_some()
    }

    /// Bar for scanning a table with a known row count
    pub fn table_bar(&self, table: &str, total_rows: u64) -> ProgressBar {
        match &self.multi {
            Some(multi) => multi.add(create_progress_bar(total_rows, table)),
            None => ProgressBar::hidden(),
        }
    }
}

/// Create a progress bar with known total
fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} ({per_sec}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}
