use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use viewit_scan::{
    ImageKind, ImageScanner, Item, ScanConfig, ScanError, ScanEvent, ScanStrategy, TreeBuilder,
    WarningKind,
};

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00";

/// Layout:
///
/// ```text
/// root/
///   cover.png
///   readme.txt
///   DCIM/Camera/2023/{a.jpg, b.jpg}
///   DCIM/Screenshots/s.png
///   Pictures/.hidden/secret.gif
///   Pictures/cache/tmp.jpg
///   Pictures/fake.jpg            (text content)
/// ```
fn create_media_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    fs::create_dir_all(root.join("DCIM/Camera/2023")).unwrap();
    fs::create_dir_all(root.join("DCIM/Screenshots")).unwrap();
    fs::create_dir_all(root.join("Pictures/.hidden")).unwrap();
    fs::create_dir_all(root.join("Pictures/cache")).unwrap();

    fs::write(root.join("cover.png"), PNG).unwrap();
    fs::write(root.join("readme.txt"), "hello").unwrap();
    fs::write(root.join("DCIM/Camera/2023/a.jpg"), JPEG).unwrap();
    fs::write(root.join("DCIM/Camera/2023/b.jpg"), JPEG).unwrap();
    fs::write(root.join("DCIM/Screenshots/s.png"), PNG).unwrap();
    fs::write(root.join("Pictures/.hidden/secret.gif"), GIF).unwrap();
    fs::write(root.join("Pictures/cache/tmp.jpg"), JPEG).unwrap();
    fs::write(root.join("Pictures/fake.jpg"), "plain text").unwrap();

    temp
}

fn canonical(temp: &TempDir) -> PathBuf {
    temp.path().canonicalize().unwrap()
}

fn config(roots: Vec<PathBuf>, strategy: ScanStrategy) -> ScanConfig {
    ScanConfig::builder()
        .roots(roots)
        .strategy(strategy)
        .build()
        .unwrap()
}

fn items(events: impl IntoIterator<Item = ScanEvent>) -> Vec<Item> {
    events
        .into_iter()
        .filter_map(|event| match event {
            ScanEvent::Item(item) => Some(item),
            _ => None,
        })
        .collect()
}

fn relative_paths(root: &Path, items: &[Item]) -> BTreeSet<String> {
    items
        .iter()
        .map(|item| {
            item.path
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

fn find_available() -> bool {
    which::which("find").is_ok()
}

/// Scan `root` with both strategies, applying `configure` to each config.
fn scan_both(
    root: &Path,
    configure: impl Fn(&mut ScanConfig),
) -> (BTreeSet<String>, BTreeSet<String>) {
    let scan = |strategy| {
        let mut config = config(vec![root.to_path_buf()], strategy);
        configure(&mut config);
        let events: Vec<ScanEvent> = ImageScanner::new(config).iter().collect();
        let Some(ScanEvent::Completed(summary)) = events.last() else {
            panic!("scan must end with a completion event");
        };
        assert_eq!(summary.strategy, strategy);
        relative_paths(root, &items(events))
    };
    (scan(ScanStrategy::Native), scan(ScanStrategy::External))
}

#[test]
fn test_native_scan_classifies_by_content() {
    let temp = create_media_tree();
    let root = canonical(&temp);
    let scanner = ImageScanner::new(config(vec![root.clone()], ScanStrategy::Native));

    let found = items(scanner.iter());
    assert_eq!(
        relative_paths(&root, &found),
        BTreeSet::from([
            "cover.png".to_string(),
            "DCIM/Camera/2023/a.jpg".to_string(),
            "DCIM/Camera/2023/b.jpg".to_string(),
            "DCIM/Screenshots/s.png".to_string(),
            "Pictures/.hidden/secret.gif".to_string(),
            "Pictures/cache/tmp.jpg".to_string(),
        ])
    );

    let cover = found.iter().find(|item| item.path.ends_with("cover.png")).unwrap();
    assert_eq!(cover.kind, ImageKind::Png);
    assert_eq!(cover.size, PNG.len() as u64);
}

#[test]
fn test_scan_tree_layout() {
    let temp = create_media_tree();
    let root = canonical(&temp);
    let scanner = ImageScanner::new(config(vec![root.clone()], ScanStrategy::Native));

    let (tree, summary) = scanner.scan_tree().unwrap();
    assert_eq!(tree.root_dir(), root);
    assert_eq!(summary.items_found, 6);
    assert_eq!(summary.files_inspected, 8);
    assert_eq!(tree.root().all_items_count(), 6);
    assert_eq!(tree.root().items().len(), 1);

    let dcim = tree.root().child("DCIM").unwrap();
    let camera = dcim.child("Camera").unwrap();
    assert_eq!(camera.collapsed_label(), "Camera/2023");
    assert_eq!(camera.non_empty_child().items().len(), 2);

    let year = tree.find(root.join("DCIM/Camera/2023")).unwrap();
    assert_eq!(year.parent().unwrap().id(), camera.id());
}

#[test]
fn test_hidden_and_ignore_filters() {
    let temp = create_media_tree();
    let root = canonical(&temp);
    let config = ScanConfig::builder()
        .roots(vec![root.clone()])
        .strategy(ScanStrategy::Native)
        .include_hidden(false)
        .ignore_patterns(vec!["cache".to_string()])
        .build()
        .unwrap();

    let found = items(ImageScanner::new(config).iter());
    let paths = relative_paths(&root, &found);
    assert_eq!(paths.len(), 4);
    assert!(!paths.contains("Pictures/.hidden/secret.gif"));
    assert!(!paths.contains("Pictures/cache/tmp.jpg"));
}

#[test]
fn test_failed_root_does_not_stop_others() {
    let temp = create_media_tree();
    let root = canonical(&temp);
    let missing = root.join("does-not-exist");
    let scanner = ImageScanner::new(config(
        vec![missing.clone(), root.join("DCIM")],
        ScanStrategy::Native,
    ));

    let events: Vec<ScanEvent> = scanner.iter().collect();
    assert!(matches!(
        &events[0],
        ScanEvent::RootFailed { root, error: ScanError::NotFound { .. } } if *root == missing
    ));
    let Some(ScanEvent::Completed(summary)) = events.last() else {
        panic!("scan must end with a completion event");
    };
    assert_eq!(summary.failed_roots.len(), 1);
    assert_eq!(summary.roots_scanned, 1);
    assert_eq!(summary.items_found, 3);
    assert!(summary.has_failures());
    assert_eq!(items(events).len(), 3);
}

#[test]
fn test_multiple_roots_share_tree() {
    let temp = create_media_tree();
    let root = canonical(&temp);
    let roots = vec![root.join("DCIM/Camera"), root.join("DCIM/Screenshots")];
    let scanner = ImageScanner::new(config(roots, ScanStrategy::Native));

    let (tree, summary) = scanner.scan_tree().unwrap();
    assert_eq!(tree.root_dir(), root.join("DCIM"));
    assert_eq!(summary.roots_scanned, 2);
    assert_eq!(tree.root().child_count(), 2);
    assert_eq!(tree.root().all_items_count(), 3);
}

#[test]
fn test_file_root() {
    let temp = create_media_tree();
    let root = canonical(&temp);
    let scanner = ImageScanner::new(config(vec![root.join("cover.png")], ScanStrategy::Native));

    let (tree, summary) = scanner.scan_tree().unwrap();
    assert_eq!(summary.items_found, 1);
    assert_eq!(tree.root_dir(), root);
    assert_eq!(tree.root().items().len(), 1);
}

#[test]
fn test_rescan_same_root_twice_duplicates() {
    let temp = create_media_tree();
    let root = canonical(&temp);
    let scanner = ImageScanner::new(config(vec![root.clone(), root.clone()], ScanStrategy::Native));

    let (tree, summary) = scanner.scan_tree().unwrap();
    assert_eq!(summary.items_found, 12);
    assert_eq!(tree.root().all_items_count(), 12);
}

#[test]
fn test_external_matches_native() {
    if !find_available() {
        eprintln!("skipping: `find` not installed");
        return;
    }
    let temp = create_media_tree();
    let root = canonical(&temp);

    let (native, external) = scan_both(&root, |_| {});
    assert_eq!(native.len(), 6);
    assert_eq!(native, external);

    let (native, external) = scan_both(&root, |config| {
        config.include_hidden = false;
        config.ignore_patterns = vec!["cache".to_string()];
    });
    assert_eq!(native.len(), 4);
    assert_eq!(native, external);

    let (native, external) = scan_both(&root, |config| config.max_depth = Some(3));
    assert_eq!(
        native,
        BTreeSet::from([
            "cover.png".to_string(),
            "DCIM/Screenshots/s.png".to_string(),
            "Pictures/.hidden/secret.gif".to_string(),
            "Pictures/cache/tmp.jpg".to_string(),
        ])
    );
    assert_eq!(native, external);

    let (native, external) = scan_both(&root, |config| config.max_depth = Some(1));
    assert_eq!(native, BTreeSet::from(["cover.png".to_string()]));
    assert_eq!(native, external);
}

#[test]
fn test_root_matching_ignore_pattern_is_walked() {
    if !find_available() {
        eprintln!("skipping: `find` not installed");
        return;
    }
    let temp = TempDir::new().unwrap();
    let root = canonical(&temp).join("cache");
    fs::create_dir_all(root.join("nested/cache")).unwrap();
    fs::write(root.join("a.png"), PNG).unwrap();
    fs::write(root.join("nested/cache/b.png"), PNG).unwrap();

    let (native, external) = scan_both(&root, |config| {
        config.ignore_patterns = vec!["cache".to_string()];
    });
    assert_eq!(native, BTreeSet::from(["a.png".to_string()]));
    assert_eq!(native, external);
}

#[cfg(unix)]
#[test]
fn test_follow_symlinks_matches_native() {
    if !find_available() {
        eprintln!("skipping: `find` not installed");
        return;
    }
    let temp = TempDir::new().unwrap();
    let base = canonical(&temp);
    let root = base.join("root");
    fs::create_dir_all(&root).unwrap();
    fs::create_dir_all(base.join("other")).unwrap();
    fs::write(root.join("real.png"), PNG).unwrap();
    fs::write(base.join("other/b.png"), PNG).unwrap();
    std::os::unix::fs::symlink(base.join("other/b.png"), root.join("link.png")).unwrap();

    let (native, external) = scan_both(&root, |config| config.follow_symlinks = true);
    assert_eq!(
        native,
        BTreeSet::from(["link.png".to_string(), "real.png".to_string()])
    );
    assert_eq!(native, external);

    let (native, external) = scan_both(&root, |config| config.follow_symlinks = false);
    assert_eq!(native, BTreeSet::from(["real.png".to_string()]));
    assert_eq!(native, external);
}

#[cfg(unix)]
#[test]
fn test_unreadable_subdirectory_is_a_warning() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let root = canonical(&temp);
    fs::create_dir_all(root.join("ok")).unwrap();
    fs::create_dir_all(root.join("locked")).unwrap();
    fs::write(root.join("ok/a.png"), PNG).unwrap();
    fs::write(root.join("locked/b.png"), PNG).unwrap();

    let locked = root.join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read_dir(&locked).is_ok() {
        // Permission bits are not enforced (running as root)
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        eprintln!("skipping: directory permissions are not enforced");
        return;
    }

    let mut runs = vec![ScanStrategy::Native];
    if find_available() {
        runs.push(ScanStrategy::External);
    }
    let results: Vec<(ScanStrategy, Vec<ScanEvent>)> = runs
        .into_iter()
        .map(|strategy| {
            let scanner = ImageScanner::new(config(vec![root.clone()], strategy));
            (strategy, scanner.iter().collect())
        })
        .collect();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    for (strategy, events) in results {
        let warnings: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                ScanEvent::Warning(warning) => Some(warning.clone()),
                _ => None,
            })
            .collect();
        assert!(!warnings.is_empty(), "{strategy:?} reported no warning");
        if strategy == ScanStrategy::Native {
            assert!(warnings.iter().any(|warning| {
                warning.path == locked && warning.kind == WarningKind::PermissionDenied
            }));
        }

        let Some(ScanEvent::Completed(summary)) = events.last() else {
            panic!("scan must end with a completion event");
        };
        assert_eq!(summary.roots_scanned, 1);
        assert!(!summary.has_failures());
        assert!(summary.has_warnings());

        assert_eq!(
            relative_paths(&root, &items(events)),
            BTreeSet::from(["ok/a.png".to_string()])
        );
    }
}

#[test]
fn test_missing_relative_root_does_not_fail_scan() {
    let temp = create_media_tree();
    let root = canonical(&temp);
    let scanner = ImageScanner::new(config(
        vec![PathBuf::from("no-such-relative-dir"), root.clone()],
        ScanStrategy::Native,
    ));

    let (tree, summary) = scanner.scan_tree().unwrap();
    assert_eq!(tree.root_dir(), root);
    assert_eq!(summary.failed_roots.len(), 1);
    assert_eq!(summary.roots_scanned, 1);
    assert_eq!(tree.root().all_items_count(), 6);
}

#[test]
fn test_external_missing_program_fails_root() {
    let temp = create_media_tree();
    let root = canonical(&temp);
    let mut config = config(vec![root], ScanStrategy::External);
    config.external.program = "viewit-no-such-program".to_string();

    let events: Vec<ScanEvent> = ImageScanner::new(config).iter().collect();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[0],
        ScanEvent::RootFailed { error: ScanError::ExternalSearch { .. }, .. }
    ));
    assert!(matches!(&events[1], ScanEvent::Completed(_)));
}

#[tokio::test]
async fn test_spawn_streams_into_builder() {
    let temp = create_media_tree();
    let root = canonical(&temp);
    let config = config(vec![root.clone()], ScanStrategy::Native);
    let scanner = ImageScanner::new(config.clone());

    let events = scanner.spawn();
    let (tree, summary) = TreeBuilder::for_roots(&config.roots)
        .build_async(events)
        .await
        .unwrap();

    assert_eq!(summary.items_found, 6);
    assert_eq!(tree.root().all_items_count(), 6);
    assert!(tree.find(root.join("DCIM/Screenshots")).is_some());
}

#[tokio::test]
async fn test_spawn_empty_scan_completes() {
    let temp = TempDir::new().unwrap();
    let scanner = ImageScanner::new(config(vec![canonical(&temp)], ScanStrategy::Native));

    let mut events = scanner.spawn();
    let first = events.recv().await.unwrap();
    assert!(matches!(first, ScanEvent::Completed(ref s) if s.items_found == 0));
    assert!(events.recv().await.is_none());
}
