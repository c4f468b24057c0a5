//! Content-based classification of candidate files.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use viewit_core::{ImageKind, SIGNATURE_LEN};

/// Decides whether a file is a tracked media item.
///
/// `scope` is the opaque identifier the scan was started with; it carries
/// context only and is never used to reach the filesystem.
pub trait Classifier: Send + Sync {
    /// Classify the file at `path`. Returns [`ImageKind::Unknown`] for
    /// anything that should not be tracked, including unreadable files.
    fn classify(&self, scope: &str, path: &Path) -> ImageKind;
}

impl<F> Classifier for F
where
    F: Fn(&str, &Path) -> ImageKind + Send + Sync,
{
    fn classify(&self, scope: &str, path: &Path) -> ImageKind {
        self(scope, path)
    }
}

/// Classifies files by the magic number in their first bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureClassifier;

impl Classifier for SignatureClassifier {
    fn classify(&self, _scope: &str, path: &Path) -> ImageKind {
        read_signature(path)
            .map(|header| ImageKind::from_signature(&header))
            .unwrap_or(ImageKind::Unknown)
    }
}

/// Read up to [`SIGNATURE_LEN`] leading bytes of a file.
pub fn read_signature(path: &Path) -> io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(SIGNATURE_LEN);
    File::open(path)?
        .take(SIGNATURE_LEN as u64)
        .read_to_end(&mut header)?;
    Ok(header)
}
