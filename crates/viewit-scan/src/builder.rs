//! Folding a scan's event stream into a [`PathTree`].

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use viewit_core::path::{common_ancestor, parent_dir};
use viewit_core::{PathTree, ScanError};

use crate::scanner::{ScanEvent, ScanSummary};

/// Builds a tree incrementally as scan events arrive.
///
/// The tree can be read between events, so a consumer may refresh its view
/// while the scan is still running.
#[derive(Debug)]
pub struct TreeBuilder {
    tree: PathTree,
    summary: Option<ScanSummary>,
}

impl TreeBuilder {
    /// Build into a tree rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            tree: PathTree::new(base),
            summary: None,
        }
    }

    /// Build into a tree rooted at the deepest directory shared by `roots`.
    ///
    /// Roots are canonicalized the same way the scanner does, so item paths
    /// always land below the tree root. Roots that cannot be canonicalized
    /// will fail during the scan and do not take part.
    pub fn for_roots(roots: &[PathBuf]) -> Self {
        let dirs: Vec<PathBuf> = roots
            .iter()
            .filter_map(|root| root.canonicalize().ok())
            .map(|root| {
                if root.is_file() {
                    parent_dir(&root).map(Path::to_path_buf).unwrap_or(root)
                } else {
                    root
                }
            })
            .collect();
        let base = common_ancestor(dirs.iter().map(PathBuf::as_path))
            .filter(|base| !base.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(std::path::MAIN_SEPARATOR_STR));
        Self::new(base)
    }

    /// Tree built so far.
    pub fn tree(&self) -> &PathTree {
        &self.tree
    }

    /// Summary, once the scan has completed.
    pub fn summary(&self) -> Option<&ScanSummary> {
        self.summary.as_ref()
    }

    /// Apply one event. Returns `true` once the scan has completed.
    pub fn apply(&mut self, event: ScanEvent) -> Result<bool, ScanError> {
        match event {
            ScanEvent::Item(item) => {
                self.tree.insert_item(item)?;
                Ok(false)
            }
            // Already logged and recorded in the summary by the scanner.
            ScanEvent::Warning(_) | ScanEvent::RootFailed { .. } => Ok(false),
            ScanEvent::Completed(summary) => {
                self.summary = Some(summary);
                Ok(true)
            }
            ScanEvent::Aborted(error) => Err(error),
        }
    }

    /// Consume a synchronous event sequence.
    pub fn build(
        mut self,
        events: impl IntoIterator<Item = ScanEvent>,
    ) -> Result<(PathTree, ScanSummary), ScanError> {
        for event in events {
            if self.apply(event)? {
                break;
            }
        }
        self.finish()
    }

    /// Consume events from a background scan.
    pub async fn build_async(
        mut self,
        mut events: mpsc::Receiver<ScanEvent>,
    ) -> Result<(PathTree, ScanSummary), ScanError> {
        while let Some(event) = events.recv().await {
            if self.apply(event)? {
                break;
            }
        }
        self.finish()
    }

    fn finish(self) -> Result<(PathTree, ScanSummary), ScanError> {
        match self.summary {
            Some(summary) => Ok((self.tree, summary)),
            None => Err(ScanError::Aborted {
                message: "event stream ended before completion".to_string(),
            }),
        }
    }
}
