//! Lazy media scanner over a list of roots.

use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use viewit_core::{Item, PathTree, ScanConfig, ScanError, ScanStrategy, ScanWarning};

use crate::builder::TreeBuilder;
use crate::classify::{Classifier, SignatureClassifier};
use crate::progress::{ProgressTracker, ScanProgress};
use crate::walk::{Candidate, EntryFilter, ExternalWalk, NativeWalk, RootWalk, WalkStep};

/// Capacity of the channel returned by [`ImageScanner::spawn`].
pub const EVENT_CHANNEL_SIZE: usize = 256;

const PROGRESS_CHANNEL_SIZE: usize = 100;

/// One element of a scan's output.
#[derive(Debug)]
pub enum ScanEvent {
    /// A tracked media file.
    Item(Item),
    /// An entry was skipped; the walk continues.
    Warning(ScanWarning),
    /// A root could not be walked (further). Other roots continue.
    RootFailed { root: PathBuf, error: ScanError },
    /// Every root has been processed. Always the last event.
    Completed(ScanSummary),
    /// The scan worker died before completing.
    Aborted(ScanError),
}

/// A root whose walk failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedRoot {
    pub root: PathBuf,
    pub message: String,
}

/// Outcome of a finished scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Tracked items emitted.
    pub items_found: u64,
    /// Total size of the emitted items.
    pub bytes_found: u64,
    /// Regular files looked at.
    pub files_inspected: u64,
    /// Roots walked to the end.
    pub roots_scanned: usize,
    /// Roots that failed.
    pub failed_roots: Vec<FailedRoot>,
    /// Entries skipped along the way.
    pub warnings: Vec<ScanWarning>,
    /// Strategy actually used ([`ScanStrategy::Native`] or [`ScanStrategy::External`]).
    pub strategy: ScanStrategy,
    /// Wall-clock duration of the scan.
    pub duration: Duration,
}

impl ScanSummary {
    fn new(strategy: ScanStrategy) -> Self {
        Self {
            items_found: 0,
            bytes_found: 0,
            files_inspected: 0,
            roots_scanned: 0,
            failed_roots: Vec::new(),
            warnings: Vec::new(),
            strategy,
            duration: Duration::ZERO,
        }
    }

    /// Check if any root failed.
    pub fn has_failures(&self) -> bool {
        !self.failed_roots.is_empty()
    }

    /// Check if there were any warnings during scanning.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Scanner producing [`Item`]s from the roots of a [`ScanConfig`].
#[derive(Clone)]
pub struct ImageScanner {
    config: Arc<ScanConfig>,
    classifier: Arc<dyn Classifier>,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl ImageScanner {
    /// Create a scanner classifying files by signature.
    pub fn new(config: ScanConfig) -> Self {
        Self::with_classifier(config, SignatureClassifier)
    }

    /// Create a scanner with a custom classifier.
    pub fn with_classifier(config: ScanConfig, classifier: impl Classifier + 'static) -> Self {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_SIZE);
        Self {
            config: Arc::new(config),
            classifier: Arc::new(classifier),
            progress_tx,
        }
    }

    /// Configuration this scanner walks.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Strategy a scan started now would use.
    pub fn resolved_strategy(&self) -> ScanStrategy {
        resolve_strategy(&self.config)
    }

    /// Start a scan on the calling thread.
    ///
    /// The returned iterator does the walking as it is advanced. It yields
    /// each event once and ends with [`ScanEvent::Completed`].
    pub fn iter(&self) -> ScanIter {
        let strategy = self.resolved_strategy();
        tracing::debug!(?strategy, roots = self.config.roots.len(), "starting scan");
        ScanIter {
            config: Arc::clone(&self.config),
            classifier: Arc::clone(&self.classifier),
            progress_tx: self.progress_tx.clone(),
            filter: EntryFilter::from_config(&self.config),
            roots: self.config.roots.clone().into_iter(),
            current: None,
            tracker: ProgressTracker::new(),
            summary: ScanSummary::new(strategy),
            finished: false,
        }
    }

    /// Run a scan on a blocking worker, streaming events through a channel.
    ///
    /// Must be called within a tokio runtime. Dropping the receiver stops
    /// the worker at its next event.
    pub fn spawn(&self) -> mpsc::Receiver<ScanEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let scanner = self.clone();

        tokio::spawn(async move {
            let worker_tx = tx.clone();
            let result = tokio::task::spawn_blocking(move || {
                for event in scanner.iter() {
                    if worker_tx.blocking_send(event).is_err() {
                        tracing::debug!("scan receiver dropped, stopping worker");
                        break;
                    }
                }
            })
            .await;

            if let Err(err) = result {
                tracing::error!(error = %err, "scan worker failed");
                let _ = tx
                    .send(ScanEvent::Aborted(ScanError::Aborted {
                        message: err.to_string(),
                    }))
                    .await;
            }
        });

        rx
    }

    /// Scan synchronously into a tree rooted at the roots' common ancestor.
    pub fn scan_tree(&self) -> Result<(PathTree, ScanSummary), ScanError> {
        TreeBuilder::for_roots(&self.config.roots).build(self.iter())
    }
}

impl std::fmt::Debug for ImageScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageScanner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn resolve_strategy(config: &ScanConfig) -> ScanStrategy {
    match config.strategy {
        ScanStrategy::Auto
            if !config.follow_symlinks && which::which(&config.external.program).is_ok() =>
        {
            ScanStrategy::External
        }
        ScanStrategy::Auto => ScanStrategy::Native,
        strategy => strategy,
    }
}

/// Lazy, single-use sequence of [`ScanEvent`]s.
pub struct ScanIter {
    config: Arc<ScanConfig>,
    classifier: Arc<dyn Classifier>,
    progress_tx: broadcast::Sender<ScanProgress>,
    filter: Result<EntryFilter, ScanError>,
    roots: std::vec::IntoIter<PathBuf>,
    current: Option<(PathBuf, RootWalk)>,
    tracker: ProgressTracker,
    summary: ScanSummary,
    finished: bool,
}

impl ScanIter {
    fn open_root(&self, root: &Path) -> Result<RootWalk, ScanError> {
        let filter = match &self.filter {
            Ok(filter) => filter,
            Err(err) => {
                return Err(ScanError::InvalidConfig {
                    message: err.to_string(),
                });
            }
        };
        let root = root.canonicalize().map_err(|e| ScanError::io(root, e))?;
        tracing::debug!(root = %root.display(), "walking root");

        match self.summary.strategy {
            ScanStrategy::External => ExternalWalk::spawn(
                &root,
                &self.config.external,
                filter,
                self.config.follow_symlinks,
            )
            .map(RootWalk::External),
            _ => NativeWalk::open(&root, &self.config, filter).map(RootWalk::Native),
        }
    }

    fn root_failed(&mut self, root: PathBuf, error: ScanError) -> ScanEvent {
        tracing::warn!(root = %root.display(), %error, "root walk failed");
        self.tracker.record_error();
        self.tracker.record_root();
        self.summary.failed_roots.push(FailedRoot {
            root: root.clone(),
            message: error.to_string(),
        });
        self.publish_progress();
        ScanEvent::RootFailed { root, error }
    }

    fn classify(&mut self, candidate: Candidate) -> Option<Item> {
        let inspected = self.tracker.record_file(&candidate.path);
        let interval = self.config.progress_interval;
        if interval > 0 && inspected % interval == 0 {
            self.publish_progress();
        }

        let kind = self.classifier.classify(&self.config.scope, &candidate.path);
        if !kind.is_tracked() {
            return None;
        }
        self.tracker.record_item(candidate.size);
        Some(Item::new(candidate.path, candidate.size, candidate.modified, kind))
    }

    fn publish_progress(&self) {
        // No subscribers is fine
        let _ = self.progress_tx.send(self.tracker.snapshot());
    }

    fn complete(&mut self) -> ScanEvent {
        self.finished = true;
        let mut summary = std::mem::replace(&mut self.summary, ScanSummary::new(ScanStrategy::Native));
        summary.items_found = self.tracker.items_found();
        summary.bytes_found = self.tracker.bytes_found();
        summary.files_inspected = self.tracker.files_inspected();
        summary.duration = self.tracker.elapsed();
        self.publish_progress();

        tracing::info!(
            items = summary.items_found,
            roots = summary.roots_scanned,
            failed = summary.failed_roots.len(),
            warnings = summary.warnings.len(),
            "scan complete"
        );
        ScanEvent::Completed(summary)
    }
}

impl Iterator for ScanIter {
    type Item = ScanEvent;

    fn next(&mut self) -> Option<ScanEvent> {
        loop {
            if self.finished {
                return None;
            }

            let step = match self.current.as_mut() {
                Some((_, walk)) => walk.next(),
                None => {
                    let Some(root) = self.roots.next() else {
                        return Some(self.complete());
                    };
                    match self.open_root(&root) {
                        Ok(walk) => self.current = Some((root, walk)),
                        Err(error) => return Some(self.root_failed(root, error)),
                    }
                    continue;
                }
            };

            match step {
                Some(WalkStep::File(candidate)) => {
                    if let Some(item) = self.classify(candidate) {
                        return Some(ScanEvent::Item(item));
                    }
                }
                Some(WalkStep::Skipped(warning)) => {
                    tracing::warn!(path = %warning.path.display(), "{}", warning.message);
                    self.tracker.record_error();
                    self.summary.warnings.push(warning.clone());
                    return Some(ScanEvent::Warning(warning));
                }
                Some(WalkStep::Failed(error)) => {
                    let root = self.current.take().map(|(root, _)| root).unwrap_or_default();
                    return Some(self.root_failed(root, error));
                }
                None => {
                    self.current = None;
                    self.summary.roots_scanned += 1;
                    self.tracker.record_root();
                    self.publish_progress();
                }
            }
        }
    }
}

impl FusedIterator for ScanIter {}

impl std::fmt::Debug for ScanIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanIter")
            .field("strategy", &self.summary.strategy)
            .field("remaining_roots", &self.roots.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
