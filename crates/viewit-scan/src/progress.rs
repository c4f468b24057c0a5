//! Scan progress reporting.

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Progress information during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Regular files inspected so far.
    pub files_inspected: u64,
    /// Files classified as tracked items.
    pub items_found: u64,
    /// Total bytes of the items found.
    pub bytes_found: u64,
    /// Roots fully walked or abandoned.
    pub roots_done: usize,
    /// Most recent path inspected.
    pub current_path: PathBuf,
    /// Number of warnings and root failures.
    pub errors_count: u64,
    /// Time elapsed since scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            files_inspected: 0,
            items_found: 0,
            bytes_found: 0,
            roots_done: 0,
            current_path: PathBuf::new(),
            errors_count: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate scan rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_inspected as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Running counters with timing, owned by one scan.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    start_time: Instant,
    files_inspected: u64,
    items_found: u64,
    bytes_found: u64,
    roots_done: usize,
    errors_count: u64,
    current_path: PathBuf,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            files_inspected: 0,
            items_found: 0,
            bytes_found: 0,
            roots_done: 0,
            errors_count: 0,
            current_path: PathBuf::new(),
        }
    }

    /// Record an inspected file; returns the running total.
    pub fn record_file(&mut self, path: &std::path::Path) -> u64 {
        self.files_inspected += 1;
        self.current_path = path.to_path_buf();
        self.files_inspected
    }

    pub fn record_item(&mut self, size: u64) {
        self.items_found += 1;
        self.bytes_found += size;
    }

    pub fn record_root(&mut self) {
        self.roots_done += 1;
    }

    pub fn record_error(&mut self) {
        self.errors_count += 1;
    }

    pub fn files_inspected(&self) -> u64 {
        self.files_inspected
    }

    pub fn items_found(&self) -> u64 {
        self.items_found
    }

    pub fn bytes_found(&self) -> u64 {
        self.bytes_found
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> ScanProgress {
        ScanProgress {
            files_inspected: self.files_inspected,
            items_found: self.items_found,
            bytes_found: self.bytes_found,
            roots_done: self.roots_done,
            current_path: self.current_path.clone(),
            errors_count: self.errors_count,
            elapsed: self.start_time.elapsed(),
        }
    }
}
