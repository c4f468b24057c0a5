//! Path-keyed tree of discovered items.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::error::TreeError;
use crate::item::Item;
use crate::node::{DirNode, NodeId, NodeRef};
use crate::path::{self, segment_key};

/// Number of items a consumer samples for a directory preview.
pub const DEFAULT_THUMBNAIL_LIMIT: usize = 9;

const ROOT: NodeId = NodeId(0);

/// Hierarchical index of items mirroring the directory layout.
///
/// Nodes are stored in an arena owned by the tree. Every node records its
/// parent's [`NodeId`]; children are keyed by a single path segment and kept
/// in insertion order. Only directories that hold items, or have
/// descendants that do, get a node (until items are removed, see
/// [`PathTree::prune`]).
#[derive(Debug, Clone)]
pub struct PathTree {
    nodes: Vec<DirNode>,
    version: u64,
}

impl PathTree {
    /// Create an empty tree rooted at `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            nodes: vec![DirNode::new(directory.into(), None)],
            version: 0,
        }
    }

    /// Create a single-node tree holding `items`.
    ///
    /// Every item must be tracked and live directly in `directory`.
    pub fn leaf(
        directory: impl Into<PathBuf>,
        items: impl IntoIterator<Item = Item>,
    ) -> Result<Self, TreeError> {
        let mut tree = Self::new(directory);
        for item in items {
            check_tracked(&item)?;
            let parent = item
                .parent_dir()
                .ok_or_else(|| TreeError::NoParent {
                    path: item.path.clone(),
                })?;
            if parent != tree.root_dir() {
                return Err(TreeError::NotDescendant {
                    dir: tree.root_dir().to_path_buf(),
                    path: item.path.clone(),
                });
            }
            tree.nodes[ROOT.0].items.push(item);
        }
        Ok(tree)
    }

    /// Root node.
    pub fn root(&self) -> NodeRef<'_> {
        NodeRef::new(self, ROOT)
    }

    /// Directory of the root node.
    pub fn root_dir(&self) -> &Path {
        &self.nodes[ROOT.0].directory
    }

    /// Node by id, if it exists.
    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_>> {
        (id.0 < self.nodes.len()).then(|| NodeRef::new(self, id))
    }

    /// Number of directory nodes, including the root.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Counter bumped on every mutation.
    ///
    /// Consumers caching derived data (thumbnails, counts) compare this to
    /// decide whether the cache is stale.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Node whose directory is exactly `path`.
    ///
    /// Walks one segment per level, so the cost is bounded by the depth of
    /// `path` below the root.
    pub fn find(&self, path: impl AsRef<Path>) -> Option<NodeRef<'_>> {
        self.find_id(path.as_ref()).map(|id| NodeRef::new(self, id))
    }

    /// Graft or merge `subtree` at the position of its root directory.
    ///
    /// Missing intermediate directories are created. A subtree rooted at
    /// this tree's root is merged into the root.
    pub fn add(&mut self, mut subtree: PathTree) -> Result<NodeId, TreeError> {
        let target = self.ensure_node(subtree.root_dir())?;
        self.merge_from(target, &mut subtree, ROOT);
        self.version += 1;
        Ok(target)
    }

    /// Fold `other` into this tree.
    ///
    /// Both trees must share a root directory. Items already present are
    /// kept first; no de-duplication takes place.
    pub fn merge(&mut self, mut other: PathTree) -> Result<(), TreeError> {
        if other.root_dir() != self.root_dir() {
            return Err(TreeError::RootMismatch {
                root: self.root_dir().to_path_buf(),
                other: other.root_dir().to_path_buf(),
            });
        }
        self.merge_from(ROOT, &mut other, ROOT);
        self.version += 1;
        Ok(())
    }

    /// Store `item` in the node for its parent directory, creating the node
    /// path when needed.
    pub fn insert_item(&mut self, item: Item) -> Result<NodeId, TreeError> {
        check_tracked(&item)?;
        let parent = item.parent_dir().ok_or_else(|| TreeError::NoParent {
            path: item.path.clone(),
        })?;
        let id = match self.find_id(parent) {
            Some(id) => id,
            None => {
                let parent = parent.to_path_buf();
                self.ensure_node(&parent)?
            }
        };
        self.nodes[id.0].items.push(item);
        self.version += 1;
        Ok(id)
    }

    /// Remove the first item stored under `path`.
    ///
    /// Nodes left without items are kept.
    pub fn remove_item(&mut self, path: impl AsRef<Path>) -> Option<Item> {
        let path = path.as_ref();
        let id = self.find_id(path::parent_dir(path)?)?;
        let items = &mut self.nodes[id.0].items;
        let index = items.iter().position(|item| item.path == path)?;
        let removed = items.remove(index);
        self.version += 1;
        Some(removed)
    }

    /// Drop every node whose subtree holds no items. The root is kept.
    ///
    /// Returns the number of nodes removed. Previously issued [`NodeId`]s
    /// are invalid afterwards.
    pub fn prune(&mut self) -> usize {
        // Children are always allocated after their parent, so a reverse
        // sweep sees every child before its parent.
        let mut totals: Vec<usize> = self.nodes.iter().map(|node| node.items.len()).collect();
        for index in (1..self.nodes.len()).rev() {
            if let Some(parent) = self.nodes[index].parent {
                totals[parent.0] += totals[index];
            }
        }

        let mut remap: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        let mut kept = Vec::with_capacity(self.nodes.len());
        for (index, mut node) in std::mem::take(&mut self.nodes).into_iter().enumerate() {
            if index != ROOT.0 && totals[index] == 0 {
                continue;
            }
            node.parent = node.parent.and_then(|parent| remap[parent.0]);
            remap[index] = Some(NodeId(kept.len()));
            kept.push(node);
        }

        for node in &mut kept {
            let children = std::mem::take(&mut node.children);
            node.children = children
                .into_iter()
                .filter_map(|(segment, id)| remap[id.0].map(|id| (segment, id)))
                .collect();
        }

        let removed = remap.len() - kept.len();
        self.nodes = kept;
        if removed > 0 {
            self.version += 1;
        }
        removed
    }

    pub(crate) fn node(&self, id: NodeId) -> &DirNode {
        &self.nodes[id.0]
    }

    fn find_id(&self, path: &Path) -> Option<NodeId> {
        let segments = path::segments(self.root_dir(), path).ok()?;
        segments.into_iter().try_fold(ROOT, |id, segment| {
            self.nodes[id.0]
                .children
                .get(segment_key(segment).as_str())
                .copied()
        })
    }

    /// Descend from the root toward `directory`, creating missing nodes.
    fn ensure_node(&mut self, directory: &Path) -> Result<NodeId, TreeError> {
        let root_dir = self.root_dir().to_path_buf();
        let segments = path::segments(&root_dir, directory)?;
        Ok(segments
            .into_iter()
            .fold(ROOT, |id, segment| self.child_or_insert(id, segment)))
    }

    fn child_or_insert(&mut self, parent: NodeId, segment: &OsStr) -> NodeId {
        let key = segment_key(segment);
        if let Some(&id) = self.nodes[parent.0].children.get(key.as_str()) {
            return id;
        }
        let directory = self.nodes[parent.0].directory.join(segment);
        let id = self.push_node(directory, parent);
        self.nodes[parent.0].children.insert(key, id);
        id
    }

    fn push_node(&mut self, directory: PathBuf, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(DirNode::new(directory, Some(parent)));
        id
    }

    /// Move the contents of `other`'s `source` node into `target`.
    ///
    /// Items and children are taken out of `other` before being applied, so
    /// nothing is iterated while it is mutated.
    fn merge_from(&mut self, target: NodeId, other: &mut PathTree, source: NodeId) {
        let items = std::mem::take(&mut other.nodes[source.0].items);
        let children = std::mem::take(&mut other.nodes[source.0].children);
        self.nodes[target.0].items.extend(items);

        for (segment, child) in children {
            let existing = self.nodes[target.0].children.get(segment.as_str()).copied();
            let slot = match existing {
                Some(id) => id,
                None => {
                    let directory = std::mem::take(&mut other.nodes[child.0].directory);
                    let id = self.push_node(directory, target);
                    self.nodes[target.0].children.insert(segment, id);
                    id
                }
            };
            self.merge_from(slot, other, child);
        }
    }
}

fn check_tracked(item: &Item) -> Result<(), TreeError> {
    if item.is_tracked() {
        Ok(())
    } else {
        Err(TreeError::UntrackedItem {
            path: item.path.clone(),
        })
    }
}
