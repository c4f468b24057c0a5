//! Core types for viewit.
//!
//! This crate provides the data structures shared by the scanner and its
//! consumers: discovered media [`Item`]s, path-segment helpers and the
//! [`PathTree`] index that mirrors the directory layout of a scan.
//!
//! # Example
//!
//! ```rust
//! use std::time::SystemTime;
//! use viewit_core::{ImageKind, Item, PathTree};
//!
//! let mut tree = PathTree::new("/root");
//! tree.insert_item(Item::new("/root/a/b/x.jpg", 10, SystemTime::UNIX_EPOCH, ImageKind::Jpeg))
//!     .unwrap();
//! tree.insert_item(Item::new("/root/a/c/y.png", 20, SystemTime::UNIX_EPOCH, ImageKind::Png))
//!     .unwrap();
//!
//! assert_eq!(tree.root().all_items_count(), 2);
//! assert_eq!(tree.find("/root/a").unwrap().child_count(), 2);
//! ```

mod config;
mod error;
mod item;
mod node;
pub mod path;
mod tree;

pub use config::{ExternalSearch, ScanConfig, ScanConfigBuilder, ScanStrategy};
pub use error::{ScanError, ScanWarning, TreeError, WarningKind};
pub use item::{ImageKind, Item, SIGNATURE_LEN};
pub use node::{Descendants, NodeId, NodeRef};
pub use tree::{PathTree, DEFAULT_THUMBNAIL_LIMIT};
