//! Scan configuration types.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Placeholder replaced by the root path in [`ExternalSearch::args`].
pub const ROOT_PLACEHOLDER: &str = "{root}";

/// How roots are walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStrategy {
    /// Use the external search program when it is installed.
    #[default]
    Auto,
    /// Walk directories in-process.
    Native,
    /// Always delegate to the external search program.
    External,
}

/// External program that lists candidate files, one path per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSearch {
    /// Program name or path.
    pub program: String,
    /// Arguments; `{root}` is replaced by the root being walked.
    pub args: Vec<String>,
    /// Arguments placed before `args` when symbolic links are followed.
    #[serde(default = "default_follow_args")]
    pub follow_args: Vec<String>,
}

impl ExternalSearch {
    /// Arguments for walking `root`.
    pub fn args_for(&self, root: &Path, follow_symlinks: bool) -> Vec<String> {
        let root = root.to_string_lossy();
        let follow: &[String] = if follow_symlinks { &self.follow_args } else { &[] };
        follow
            .iter()
            .chain(&self.args)
            .map(|arg| arg.replace(ROOT_PLACEHOLDER, &root))
            .collect()
    }
}

fn default_follow_args() -> Vec<String> {
    vec!["-L".to_string()]
}

impl Default for ExternalSearch {
    fn default() -> Self {
        Self {
            program: "find".to_string(),
            args: vec![
                ROOT_PLACEHOLDER.to_string(),
                "-type".to_string(),
                "f".to_string(),
            ],
            follow_args: default_follow_args(),
        }
    }
}

/// Configuration for scanning operations.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root directories to walk, in order.
    pub roots: Vec<PathBuf>,

    /// Opaque scope handed to the classifier (e.g. an application id).
    #[builder(default)]
    #[serde(default)]
    pub scope: String,

    /// Walking strategy.
    #[builder(default)]
    #[serde(default)]
    pub strategy: ScanStrategy,

    /// External search program used by [`ScanStrategy::External`].
    #[builder(default)]
    #[serde(default)]
    pub external: ExternalSearch,

    /// Follow symbolic links.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Include hidden files (starting with .).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Maximum depth below each root (None = unlimited).
    #[builder(default)]
    #[serde(default)]
    pub max_depth: Option<u32>,

    /// File or directory names to skip (glob syntax).
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Number of threads for the native walk (0 = auto-detect).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,

    /// Files inspected between progress updates.
    #[builder(default = "256")]
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

fn default_true() -> bool {
    true
}

fn default_progress_interval() -> u64 {
    256
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.roots {
            Some(ref roots) if roots.is_empty() => {
                return Err("At least one root is required".to_string());
            }
            Some(ref roots) => {
                if roots.iter().any(|root| root.as_os_str().is_empty()) {
                    return Err("Root path cannot be empty".to_string());
                }
            }
            None => return Err("Roots are required".to_string()),
        }
        if let Some(ref patterns) = self.ignore_patterns {
            compile_patterns(patterns).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a simple config for scanning a set of roots.
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            scope: String::new(),
            strategy: ScanStrategy::Auto,
            external: ExternalSearch::default(),
            follow_symlinks: false,
            include_hidden: true,
            max_depth: None,
            ignore_patterns: Vec::new(),
            threads: 0,
            progress_interval: default_progress_interval(),
        }
    }

    /// Compile the ignore patterns.
    pub fn ignore_set(&self) -> Result<GlobSet, ScanError> {
        compile_patterns(&self.ignore_patterns)
    }

    /// Check if hidden files should be skipped.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }
}

fn compile_patterns(patterns: &[String]) -> Result<GlobSet, ScanError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ScanError::InvalidConfig {
            message: format!("Bad ignore pattern `{pattern}`: {e}"),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ScanError::InvalidConfig {
        message: e.to_string(),
    })
}
