//! Directory nodes and read-only views into a [`PathTree`].

use std::fmt;
use std::path::{Path, PathBuf};

use compact_str::CompactString;
use indexmap::IndexMap;

use crate::item::Item;
use crate::tree::PathTree;

/// Identifier of a node within one [`PathTree`].
///
/// Ids are stable across insertions and merges and invalidated by
/// [`PathTree::prune`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in the tree's arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// One directory in the tree.
#[derive(Debug, Clone)]
pub(crate) struct DirNode {
    pub(crate) directory: PathBuf,
    pub(crate) parent: Option<NodeId>,
    pub(crate) items: Vec<Item>,
    pub(crate) children: IndexMap<CompactString, NodeId>,
}

impl DirNode {
    pub(crate) fn new(directory: PathBuf, parent: Option<NodeId>) -> Self {
        Self {
            directory,
            parent,
            items: Vec::new(),
            children: IndexMap::new(),
        }
    }
}

/// Borrowed view of a single node.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a PathTree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub(crate) fn new(tree: &'a PathTree, id: NodeId) -> Self {
        Self { tree, id }
    }

    fn node(&self) -> &'a DirNode {
        self.tree.node(self.id)
    }

    /// Id of this node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Directory this node represents.
    pub fn directory(&self) -> &'a Path {
        &self.node().directory
    }

    /// Items stored directly in this directory.
    pub fn items(&self) -> &'a [Item] {
        &self.node().items
    }

    /// Owning node, `None` for the root.
    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.node().parent.map(|id| NodeRef::new(self.tree, id))
    }

    /// Immediate subdirectories keyed by segment, in insertion order.
    pub fn children(&self) -> impl Iterator<Item = (&'a str, NodeRef<'a>)> + 'a {
        let tree = self.tree;
        self.node()
            .children
            .iter()
            .map(move |(segment, id)| (segment.as_str(), NodeRef::new(tree, *id)))
    }

    /// Child under a single path segment.
    pub fn child(&self, segment: &str) -> Option<NodeRef<'a>> {
        self.node()
            .children
            .get(segment)
            .map(|id| NodeRef::new(self.tree, *id))
    }

    /// Number of immediate subdirectories.
    pub fn child_count(&self) -> usize {
        self.node().children.len()
    }

    /// Number of ancestors between this node and the root.
    pub fn depth(&self) -> usize {
        std::iter::successors(self.parent(), |node| node.parent()).count()
    }

    /// This node followed by all of its descendants, depth-first.
    pub fn descendants(&self) -> Descendants<'a> {
        Descendants {
            tree: self.tree,
            stack: vec![self.id],
        }
    }

    /// All items in this subtree: own items first, then each child's in order.
    pub fn iter_items(&self) -> impl Iterator<Item = &'a Item> + 'a {
        self.descendants().flat_map(|node| node.items().iter())
    }

    /// Collect every item in this subtree.
    pub fn all_items(&self) -> Vec<&'a Item> {
        self.iter_items().collect()
    }

    /// Total number of items in this subtree.
    pub fn all_items_count(&self) -> usize {
        self.descendants().map(|node| node.items().len()).sum()
    }

    /// Total byte size of the items in this subtree.
    pub fn all_items_size(&self) -> u64 {
        self.iter_items().map(|item| item.size).sum()
    }

    /// Up to `limit` items sampled own-items-first, depth-first.
    ///
    /// Stops visiting nodes as soon as `limit` items are collected.
    pub fn thumbnail_items(&self, limit: usize) -> Vec<&'a Item> {
        self.iter_items().take(limit).collect()
    }

    /// Deepest node reached through directories that hold no items and
    /// exactly one subdirectory.
    pub fn non_empty_child(&self) -> NodeRef<'a> {
        let mut current = *self;
        loop {
            if !current.items().is_empty() {
                return current;
            }
            let mut children = current.children();
            match (children.next(), children.next()) {
                (Some((_, only)), None) => current = only,
                _ => return current,
            }
        }
    }

    /// Label for the collapsed chain starting at this node, relative to the
    /// parent directory (e.g. `Photos/Camera/2023`).
    pub fn collapsed_label(&self) -> String {
        let target = self.non_empty_child();
        self.parent()
            .and_then(|parent| target.directory().strip_prefix(parent.directory()).ok())
            .unwrap_or_else(|| target.directory())
            .to_string_lossy()
            .into_owned()
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("directory", &self.directory())
            .field("items", &self.items().len())
            .field("children", &self.child_count())
            .finish()
    }
}

/// Pre-order iterator over a subtree.
pub struct Descendants<'a> {
    tree: &'a PathTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.node(id);
        self.stack.extend(node.children.values().rev().copied());
        Some(NodeRef::new(self.tree, id))
    }
}

impl fmt::Debug for Descendants<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descendants")
            .field("pending", &self.stack.len())
            .finish()
    }
}
