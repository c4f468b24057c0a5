//! viewit - browse the images on a device grouped by directory.
//!
//! Usage:
//!   viewit summary [ROOTS]...           Scan and show the directory tree
//!   viewit find PATH [--root ROOT]...   Show one directory of a scan
//!   viewit export [ROOTS]... [-o FILE]  Export scan results to JSON
//!   viewit --help                       Show help

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use itertools::Itertools;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use viewit_core::DEFAULT_THUMBNAIL_LIMIT;
use viewit_scan::{
    ImageScanner, Item, NodeRef, PathTree, ScanConfig, ScanStrategy, ScanSummary, TreeBuilder,
};

#[derive(Parser)]
#[command(
    name = "viewit",
    version,
    about = "Browse the images on a device grouped by directory",
    long_about = "viewit scans one or more roots for image files, identified by \
                  their content, and groups them by the directories that hold them."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan and show the directory tree
    Summary {
        /// Roots to scan
        #[arg(default_value = ".")]
        roots: Vec<PathBuf>,

        #[command(flatten)]
        scan: ScanArgs,

        /// Maximum depth to display
        #[arg(short, long, default_value = "3")]
        depth: usize,

        /// Number of thumbnails to list per directory
        #[arg(short = 'n', long, default_value_t = DEFAULT_THUMBNAIL_LIMIT)]
        thumbnails: usize,
    },

    /// Show the items and subdirectories of one directory
    Find {
        /// Directory to show
        path: PathBuf,

        /// Roots to scan, may be repeated
        #[arg(short, long = "root", default_value = ".")]
        roots: Vec<PathBuf>,

        #[command(flatten)]
        scan: ScanArgs,
    },

    /// Export scan results to JSON
    Export {
        /// Roots to scan
        #[arg(default_value = ".")]
        roots: Vec<PathBuf>,

        #[command(flatten)]
        scan: ScanArgs,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// How roots are walked
    #[arg(short, long, default_value = "auto")]
    strategy: StrategyArg,

    /// Skip hidden files and directories
    #[arg(long)]
    no_hidden: bool,

    /// Names to skip (glob syntax), may be repeated
    #[arg(short, long)]
    ignore: Vec<String>,

    /// Follow symbolic links
    #[arg(short = 'L', long)]
    follow_symlinks: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum StrategyArg {
    #[default]
    Auto,
    Native,
    External,
}

impl From<StrategyArg> for ScanStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Auto => ScanStrategy::Auto,
            StrategyArg::Native => ScanStrategy::Native,
            StrategyArg::External => ScanStrategy::External,
        }
    }
}

impl ScanArgs {
    fn config(&self, roots: Vec<PathBuf>) -> Result<ScanConfig> {
        ScanConfig::builder()
            .roots(roots)
            .strategy(self.strategy)
            .include_hidden(!self.no_hidden)
            .ignore_patterns(self.ignore.clone())
            .follow_symlinks(self.follow_symlinks)
            .build()
            .map_err(|e| eyre!("Invalid scan options: {e}"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Summary {
            roots,
            scan,
            depth,
            thumbnails,
        } => run_summary(scan.config(roots)?, depth, thumbnails).await?,
        Command::Find { path, roots, scan } => run_find(&path, scan.config(roots)?).await?,
        Command::Export {
            roots,
            scan,
            output,
        } => run_export(scan.config(roots)?, output).await?,
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// Scan in the background while folding events into a tree.
async fn scan(config: ScanConfig) -> Result<(PathTree, ScanSummary)> {
    let scanner = ImageScanner::new(config.clone());

    eprintln!(
        "Scanning {} ({:?})...",
        config.roots.iter().map(|root| root.display()).join(", "),
        scanner.resolved_strategy()
    );

    let mut progress = scanner.subscribe();
    tokio::spawn(async move {
        while let Ok(update) = progress.recv().await {
            tracing::debug!(
                files = update.files_inspected,
                items = update.items_found,
                rate = update.files_per_second(),
                "scan progress"
            );
        }
    });

    let events = scanner.spawn();
    let (tree, summary) = TreeBuilder::for_roots(&config.roots)
        .build_async(events)
        .await
        .context("Scan failed")?;

    for failed in &summary.failed_roots {
        eprintln!("Could not scan {}: {}", failed.root.display(), failed.message);
    }
    Ok((tree, summary))
}

/// Scan and print the grouped directory tree.
async fn run_summary(config: ScanConfig, max_depth: usize, thumbnails: usize) -> Result<()> {
    let (tree, summary) = scan(config).await?;
    let root = tree.root();

    println!();
    println!("{}", "─".repeat(60));
    println!(
        " {} - {} images, {}",
        tree.root_dir().display(),
        root.all_items_count(),
        format_size(root.all_items_size())
    );
    println!(
        " {} files inspected in {} root(s)",
        summary.files_inspected, summary.roots_scanned
    );
    println!(
        " Scanned in {:.2}s ({:?})",
        summary.duration.as_secs_f64(),
        summary.strategy
    );
    println!("{}", "─".repeat(60));
    println!();

    print_items(root, 0, thumbnails);
    for (_, child) in root.children() {
        print_node(child, 0, max_depth, thumbnails);
    }

    if summary.has_warnings() {
        println!();
        println!("{} warning(s) during scan", summary.warnings.len());
    }

    Ok(())
}

/// Scan and print a single directory.
async fn run_find(path: &Path, config: ScanConfig) -> Result<()> {
    let path = path.canonicalize().context("Invalid path")?;
    let (tree, _) = scan(config).await?;

    let node = tree
        .find(&path)
        .ok_or_else(|| eyre!("No images under {}", path.display()))?;

    println!();
    println!(
        " {} - {} images, {}",
        node.directory().display(),
        node.all_items_count(),
        format_size(node.all_items_size())
    );
    println!();

    for item in node.items() {
        println!(
            "   {:<40} {:>10} {:>5} {}",
            truncate(&item.file_name(), 40),
            format_size(item.size),
            item.kind,
            format_time(item.modified_at)
        );
    }
    for (_, child) in node.children() {
        println!(
            " ▸ {:<40} {:>6} images",
            truncate(&child.collapsed_label(), 40),
            child.all_items_count()
        );
    }

    Ok(())
}

/// Export scan results to JSON.
async fn run_export(config: ScanConfig, output: Option<PathBuf>) -> Result<()> {
    let (tree, summary) = scan(config).await?;

    let export = Export {
        summary: &summary,
        tree: ExportNode::from_node(tree.root()),
    };
    let json = serde_json::to_string_pretty(&export)?;

    match output {
        Some(output_path) => {
            std::fs::write(&output_path, json)
                .with_context(|| format!("Cannot write {}", output_path.display()))?;
            eprintln!("Exported to {}", output_path.display());
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct Export<'a> {
    summary: &'a ScanSummary,
    tree: ExportNode<'a>,
}

/// Serializable view of a node, with single-child chains collapsed.
#[derive(Serialize)]
struct ExportNode<'a> {
    label: String,
    directory: &'a Path,
    total_items: usize,
    items: &'a [Item],
    children: Vec<ExportNode<'a>>,
}

impl<'a> ExportNode<'a> {
    fn from_node(node: NodeRef<'a>) -> Self {
        let target = node.non_empty_child();
        Self {
            label: node.collapsed_label(),
            directory: target.directory(),
            total_items: node.all_items_count(),
            items: target.items(),
            children: target.children().map(|(_, child)| Self::from_node(child)).collect(),
        }
    }
}

/// Print a directory, collapsed through wrapper directories, and its children.
fn print_node(node: NodeRef<'_>, depth: usize, max_depth: usize, thumbnails: usize) {
    let indent = "  ".repeat(depth);
    let target = node.non_empty_child();

    println!(
        "{}▼ {:<40} {:>6} images {:>10}  {}",
        indent,
        truncate(&format!("{}/", node.collapsed_label()), 40),
        node.all_items_count(),
        format_size(node.all_items_size()),
        newest(node).map(format_time).unwrap_or_default()
    );
    print_items(target, depth + 1, thumbnails);

    if depth + 1 < max_depth {
        for (_, child) in target.children() {
            print_node(child, depth + 1, max_depth, thumbnails);
        }
    } else if target.child_count() > 0 {
        let indent = "  ".repeat(depth + 1);
        println!("{}  ... and {} more directories", indent, target.child_count());
    }
}

/// Print the thumbnail names for a node.
fn print_items(node: NodeRef<'_>, depth: usize, thumbnails: usize) {
    let preview = node.thumbnail_items(thumbnails);
    if preview.is_empty() {
        return;
    }
    let indent = "  ".repeat(depth);
    println!(
        "{}  {}",
        indent,
        truncate(&preview.iter().map(|item| item.file_name()).join(", "), 72)
    );
}

fn newest(node: NodeRef<'_>) -> Option<SystemTime> {
    node.iter_items().map(|item| item.modified_at).max()
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format("%Y-%m-%d %H:%M").to_string()
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to max length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len == 0 {
        String::new()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
