//! Media scanning engine for viewit.
//!
//! This crate walks a list of root directories, classifies every regular
//! file by its content and emits the tracked ones as a lazy stream of
//! [`ScanEvent`]s that a [`TreeBuilder`] folds into a [`PathTree`].
//!
//! # Overview
//!
//! - **Two strategies**: an in-process jwalk walk, or a delegated external
//!   search program (`find` by default) when it is installed
//! - **Lazy emission**: items arrive while the walk is still running
//! - **Per-root fault containment**: a root that cannot be walked is
//!   reported and skipped, other roots continue
//! - **Progress updates** via broadcast channels
//!
//! # Example
//!
//! ```rust,no_run
//! use viewit_scan::{ImageScanner, ScanConfig};
//!
//! let config = ScanConfig::new(["/sdcard/DCIM", "/sdcard/Pictures"]);
//! let scanner = ImageScanner::new(config);
//! let (tree, summary) = scanner.scan_tree().unwrap();
//!
//! println!("Found {} items", summary.items_found);
//! for (_, child) in tree.root().children() {
//!     println!("{}: {}", child.collapsed_label(), child.all_items_count());
//! }
//! ```
//!
//! # Background scanning
//!
//! ```rust,no_run
//! use viewit_scan::{ImageScanner, ScanConfig, TreeBuilder};
//!
//! # async fn run() -> Result<(), viewit_scan::ScanError> {
//! let config = ScanConfig::new(["/sdcard"]);
//! let scanner = ImageScanner::new(config.clone());
//! let events = scanner.spawn();
//!
//! let (tree, _summary) = TreeBuilder::for_roots(&config.roots)
//!     .build_async(events)
//!     .await?;
//! println!("{} items", tree.root().all_items_count());
//! # Ok(())
//! # }
//! ```

mod builder;
mod classify;
mod progress;
mod scanner;
mod walk;

pub use builder::TreeBuilder;
pub use classify::{read_signature, Classifier, SignatureClassifier};
pub use progress::ScanProgress;
pub use scanner::{
    FailedRoot, ImageScanner, ScanEvent, ScanIter, ScanSummary, EVENT_CHANNEL_SIZE,
};

// Re-export core types for convenience
pub use viewit_core::{
    ExternalSearch, ImageKind, Item, NodeId, NodeRef, PathTree, ScanConfig, ScanError,
    ScanStrategy, ScanWarning, TreeError, WarningKind,
};
