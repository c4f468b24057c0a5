//! Path-segment helpers.
//!
//! Paths are compared component-wise, so a directory written with or
//! without a trailing separator (`/root/a/` vs `/root/a`) names the same
//! node.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use compact_str::CompactString;

use crate::error::TreeError;

/// Return the segment of `path` immediately following `dir`.
///
/// For `dir = /root/a` and `path = /root/a/b/x.jpg` this is `b`, and the
/// same holds for `dir = /root/a/`. Fails when `path` is not a strict
/// descendant of `dir`.
pub fn sub_dir<'a>(dir: &Path, path: &'a Path) -> Result<&'a OsStr, TreeError> {
    segments(dir, path)?
        .into_iter()
        .next()
        .ok_or_else(|| not_descendant(dir, path))
}

/// Split the part of `path` below `dir` into its segments.
///
/// Returns an empty list when both name the same directory. `.` and `..`
/// below `dir` are rejected rather than resolved.
pub fn segments<'a>(dir: &Path, path: &'a Path) -> Result<Vec<&'a OsStr>, TreeError> {
    let rest = path
        .strip_prefix(dir)
        .map_err(|_| not_descendant(dir, path))?;

    rest.components()
        .map(|component| match component {
            Component::Normal(segment) => Ok(segment),
            _ => Err(not_descendant(dir, path)),
        })
        .collect()
}

/// Directory containing `path`, or `None` for a bare root or relative name.
pub fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|parent| !parent.as_os_str().is_empty())
}

/// Deepest directory shared by every path in `paths`.
pub fn common_ancestor<'a, I>(paths: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut paths = paths.into_iter();
    let mut ancestor = paths.next()?.to_path_buf();

    for path in paths {
        while !path.starts_with(&ancestor) {
            if !ancestor.pop() {
                return None;
            }
        }
    }

    Some(ancestor)
}

/// Key under which a child segment is stored.
pub(crate) fn segment_key(segment: &OsStr) -> CompactString {
    CompactString::new(segment.to_string_lossy())
}

fn not_descendant(dir: &Path, path: &Path) -> TreeError {
    TreeError::NotDescendant {
        dir: dir.to_path_buf(),
        path: path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_dir() {
        let segment = sub_dir(Path::new("/root/a"), Path::new("/root/a/b/x.jpg")).unwrap();
        assert_eq!(segment, "b");
    }

    #[test]
    fn test_sub_dir_trailing_separator() {
        let segment = sub_dir(Path::new("/root/a/"), Path::new("/root/a/b/x.jpg")).unwrap();
        assert_eq!(segment, "b");

        let segment = sub_dir(Path::new("/"), Path::new("/root/a")).unwrap();
        assert_eq!(segment, "root");
    }

    #[test]
    fn test_sub_dir_not_descendant() {
        assert!(sub_dir(Path::new("/root/a"), Path::new("/other/b")).is_err());
        // Sibling that merely shares a string prefix
        assert!(sub_dir(Path::new("/root/a"), Path::new("/root/ab/x.jpg")).is_err());
        // Same directory has no next segment
        assert!(sub_dir(Path::new("/root/a"), Path::new("/root/a")).is_err());
    }

    #[test]
    fn test_segments() {
        let parts = segments(Path::new("/root"), Path::new("/root/a/b/c")).unwrap();
        assert_eq!(parts, vec!["a", "b", "c"]);

        assert!(segments(Path::new("/root"), Path::new("/root")).unwrap().is_empty());
        assert!(segments(Path::new("/root"), Path::new("/root/a/../b")).is_err());
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir(Path::new("/root/a/x.jpg")), Some(Path::new("/root/a")));
        assert_eq!(parent_dir(Path::new("x.jpg")), None);
        assert_eq!(parent_dir(Path::new("/")), None);
    }

    #[test]
    fn test_common_ancestor() {
        let paths = [
            Path::new("/sdcard/DCIM/Camera"),
            Path::new("/sdcard/Pictures"),
            Path::new("/sdcard/DCIM/Screenshots"),
        ];
        assert_eq!(
            common_ancestor(paths.iter().copied()),
            Some(PathBuf::from("/sdcard"))
        );

        assert_eq!(common_ancestor(std::iter::empty()), None);
        assert_eq!(
            common_ancestor([Path::new("/a/b")]),
            Some(PathBuf::from("/a/b"))
        );
    }
}
