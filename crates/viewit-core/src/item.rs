//! Discovered media items and their classification.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Number of leading bytes needed to recognise every supported format.
pub const SIGNATURE_LEN: usize = 16;

/// Media kind detected from a file's content.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
    Bmp,
    /// Not a tracked item. Never stored in a tree.
    Unknown,
}

impl ImageKind {
    /// Match the magic number at the start of a file.
    pub fn from_signature(header: &[u8]) -> Self {
        match header {
            [0xFF, 0xD8, 0xFF, ..] => ImageKind::Jpeg,
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => ImageKind::Png,
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => ImageKind::Gif,
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => ImageKind::Webp,
            [b'B', b'M', ..] => ImageKind::Bmp,
            _ => ImageKind::Unknown,
        }
    }

    /// Whether items of this kind belong in a tree.
    pub fn is_tracked(self) -> bool {
        self != ImageKind::Unknown
    }

    /// MIME type for tracked kinds.
    pub fn mime_type(self) -> Option<&'static str> {
        match self {
            ImageKind::Jpeg => Some("image/jpeg"),
            ImageKind::Png => Some("image/png"),
            ImageKind::Gif => Some("image/gif"),
            ImageKind::Webp => Some("image/webp"),
            ImageKind::Bmp => Some("image/bmp"),
            ImageKind::Unknown => None,
        }
    }
}

/// A discovered file of a recognised media kind.
///
/// Two items are equal when they share a path; size, timestamp and kind are
/// metadata captured at scan time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Length in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified_at: SystemTime,
    /// Detected media kind.
    pub kind: ImageKind,
}

impl Item {
    /// Create a new item.
    pub fn new(
        path: impl Into<PathBuf>,
        size: u64,
        modified_at: SystemTime,
        kind: ImageKind,
    ) -> Self {
        Self {
            path: path.into(),
            size,
            modified_at,
            kind,
        }
    }

    /// Directory holding this item.
    pub fn parent_dir(&self) -> Option<&Path> {
        crate::path::parent_dir(&self.path)
    }

    /// File name for display.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Whether this item may be stored in a tree.
    pub fn is_tracked(&self) -> bool {
        self.kind.is_tracked()
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Item {}
