//! Per-root walkers: the in-process jwalk walk and the external search.

use std::io::{BufRead, BufReader, Split};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use globset::GlobSet;
use jwalk::{DirEntryIter, Parallelism, WalkDir};

use viewit_core::{ExternalSearch, ScanConfig, ScanError, ScanWarning, WarningKind};

/// A regular file found under a root, not yet classified.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

impl Candidate {
    /// Stat `path`, keeping it only when it is a regular file. Links are
    /// resolved only when `follow_symlinks` is set.
    fn stat(path: PathBuf, follow_symlinks: bool) -> Option<WalkStep> {
        let metadata = if follow_symlinks {
            std::fs::metadata(&path)
        } else {
            std::fs::symlink_metadata(&path)
        };
        match metadata {
            Ok(metadata) if metadata.is_file() => Some(WalkStep::File(Candidate {
                size: metadata.len(),
                modified: metadata.modified().unwrap_or(UNIX_EPOCH),
                path,
            })),
            Ok(_) => None,
            Err(err) => Some(WalkStep::Skipped(ScanWarning::metadata_error(&path, &err))),
        }
    }
}

/// One step of a root walk.
#[derive(Debug)]
pub(crate) enum WalkStep {
    /// A regular file to classify.
    File(Candidate),
    /// An entry that could not be read; the walk goes on.
    Skipped(ScanWarning),
    /// The rest of this root cannot be walked.
    Failed(ScanError),
}

/// Name-based filtering shared by both walkers so they agree on results.
#[derive(Debug, Clone)]
pub(crate) struct EntryFilter {
    ignore: GlobSet,
    include_hidden: bool,
    max_depth: Option<usize>,
}

impl EntryFilter {
    pub fn from_config(config: &ScanConfig) -> Result<Self, ScanError> {
        Ok(Self {
            ignore: config.ignore_set()?,
            include_hidden: config.include_hidden,
            max_depth: config.max_depth.map(|depth| depth as usize),
        })
    }

    fn is_ignored(&self, name: &std::ffi::OsStr) -> bool {
        !self.ignore.is_empty() && self.ignore.is_match(name)
    }

    /// Whether a file found at `path` under `root` passes every filter.
    fn accepts(&self, root: &Path, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(root) else {
            return false;
        };
        let mut depth = 0;
        for component in relative.components() {
            let name = component.as_os_str();
            if !self.include_hidden && name.to_string_lossy().starts_with('.') {
                return false;
            }
            if self.is_ignored(name) {
                return false;
            }
            depth += 1;
        }
        self.max_depth.is_none_or(|max| depth <= max)
    }
}

/// Walker for a single root.
pub(crate) enum RootWalk {
    Native(NativeWalk),
    External(ExternalWalk),
}

impl Iterator for RootWalk {
    type Item = WalkStep;

    fn next(&mut self) -> Option<WalkStep> {
        match self {
            RootWalk::Native(walk) => walk.next(),
            RootWalk::External(walk) => walk.next(),
        }
    }
}

/// In-process walk backed by jwalk.
pub(crate) enum NativeWalk {
    /// The root itself is a file.
    Single(Option<PathBuf>, bool),
    Dir(DirEntryIter<((), ())>),
}

impl NativeWalk {
    pub fn open(root: &Path, config: &ScanConfig, filter: &EntryFilter) -> Result<Self, ScanError> {
        let metadata = std::fs::metadata(root).map_err(|e| ScanError::io(root, e))?;
        if metadata.is_file() {
            return Ok(NativeWalk::Single(
                Some(root.to_path_buf()),
                config.follow_symlinks,
            ));
        }
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory {
                path: root.to_path_buf(),
            });
        }
        // Fail the root up front when its listing is unreadable; errors
        // deeper down only skip the affected entry.
        std::fs::read_dir(root).map_err(|e| ScanError::io(root, e))?;

        let parallelism = match config.threads {
            0 => Parallelism::RayonDefaultPool {
                busy_timeout: std::time::Duration::from_millis(100),
            },
            n => Parallelism::RayonNewPool(n),
        };

        let mut walker = WalkDir::new(root)
            .parallelism(parallelism)
            .sort(true)
            .skip_hidden(!config.include_hidden)
            .follow_links(config.follow_symlinks)
            .min_depth(1)
            .max_depth(filter.max_depth.unwrap_or(usize::MAX));

        if !filter.ignore.is_empty() {
            let ignore = Arc::new(filter.ignore.clone());
            walker = walker.process_read_dir(move |depth, _path, _state, children| {
                // `None` is the root entry itself, which is never filtered
                if depth.is_none() {
                    return;
                }
                children.retain(|entry| {
                    entry
                        .as_ref()
                        .map(|entry| !ignore.is_match(entry.file_name()))
                        .unwrap_or(true)
                });
            });
        }

        Ok(NativeWalk::Dir(walker.into_iter()))
    }
}

impl Iterator for NativeWalk {
    type Item = WalkStep;

    fn next(&mut self) -> Option<WalkStep> {
        let entries = match self {
            NativeWalk::Single(path, follow) => {
                let follow = *follow;
                return path.take().and_then(|path| Candidate::stat(path, follow));
            }
            NativeWalk::Dir(entries) => entries,
        };

        for entry in entries.by_ref() {
            let mut entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    return Some(WalkStep::Skipped(ScanWarning::new(
                        path,
                        err.to_string(),
                        WarningKind::ReadError,
                    )));
                }
            };

            if let Some(err) = entry.read_children_error.take() {
                let path = entry.path();
                let warning = match err.io_error() {
                    Some(io) => ScanWarning::from_io(path, io),
                    None => ScanWarning::new(path, err.to_string(), WarningKind::ReadError),
                };
                return Some(WalkStep::Skipped(warning));
            }

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            return Some(match entry.metadata() {
                Ok(metadata) => WalkStep::File(Candidate {
                    size: metadata.len(),
                    modified: metadata.modified().unwrap_or(UNIX_EPOCH),
                    path,
                }),
                Err(err) => WalkStep::Skipped(ScanWarning::new(
                    path,
                    err.to_string(),
                    WarningKind::MetadataError,
                )),
            });
        }
        None
    }
}

/// Walk delegated to an external program printing one path per line.
pub(crate) struct ExternalWalk {
    root: PathBuf,
    program: String,
    filter: EntryFilter,
    follow_symlinks: bool,
    child: Child,
    lines: Split<BufReader<ChildStdout>>,
    finished: bool,
}

impl ExternalWalk {
    pub fn spawn(
        root: &Path,
        search: &ExternalSearch,
        filter: &EntryFilter,
        follow_symlinks: bool,
    ) -> Result<Self, ScanError> {
        let metadata = std::fs::metadata(root).map_err(|e| ScanError::io(root, e))?;
        if !metadata.is_dir() && !metadata.is_file() {
            return Err(ScanError::NotADirectory {
                path: root.to_path_buf(),
            });
        }

        let mut child = Command::new(&search.program)
            .args(search.args_for(root, follow_symlinks))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ScanError::ExternalSearch {
                program: search.program.clone(),
                message: e.to_string(),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| ScanError::ExternalSearch {
            program: search.program.clone(),
            message: "stdout not captured".to_string(),
        })?;

        Ok(Self {
            root: root.to_path_buf(),
            program: search.program.clone(),
            filter: filter.clone(),
            follow_symlinks,
            child,
            lines: BufReader::new(stdout).split(b'\n'),
            finished: false,
        })
    }

    fn finish(&mut self) -> Option<WalkStep> {
        self.finished = true;
        match self.child.wait() {
            Ok(status) if status.success() => None,
            Ok(status) => Some(WalkStep::Skipped(ScanWarning::new(
                &self.root,
                format!("{} exited with {status}", self.program),
                WarningKind::ExternalSearch,
            ))),
            Err(err) => Some(WalkStep::Skipped(ScanWarning::from_io(&self.root, &err))),
        }
    }
}

impl Iterator for ExternalWalk {
    type Item = WalkStep;

    fn next(&mut self) -> Option<WalkStep> {
        if self.finished {
            return None;
        }
        loop {
            match self.lines.next() {
                Some(Ok(line)) => {
                    if line.is_empty() {
                        continue;
                    }
                    let path = path_from_bytes(line);
                    if !self.filter.accepts(&self.root, &path) {
                        continue;
                    }
                    if let Some(step) = Candidate::stat(path, self.follow_symlinks) {
                        return Some(step);
                    }
                }
                Some(Err(err)) => {
                    self.finished = true;
                    if let Err(kill_err) = self.child.kill() {
                        tracing::debug!(
                            program = %self.program,
                            error = %kill_err,
                            "failed to stop search"
                        );
                    }
                    if let Err(wait_err) = self.child.wait() {
                        tracing::debug!(
                            program = %self.program,
                            error = %wait_err,
                            "failed to reap search"
                        );
                    }
                    return Some(WalkStep::Failed(ScanError::io(&self.root, err)));
                }
                None => return self.finish(),
            }
        }
    }
}

impl Drop for ExternalWalk {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(std::ffi::OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    let line = String::from_utf8_lossy(&bytes);
    PathBuf::from(line.trim_end_matches('\r'))
}
