//! File tree domain model.
//!
//! The file tree is the canonical in-memory representation of a project's
//! files. It is the source of truth mounted into the sandbox and persisted
//! through the remote project service. Consumers only ever observe complete
//! trees: mutation goes through [`FileTreeModel`], which swaps in a new
//! snapshot atomically while previously handed-out snapshots stay valid.

use crate::error::{CodevError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A single node in the file tree.
///
/// The wire shape matches agent-delivered payloads:
/// `{"file": {"contents": "..."}}` for leaves and
/// `{"directory": {"children": {...}}}` for directories. Observed payloads
/// are flat, but nested directories are supported for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileNode {
    /// A file leaf with its full contents.
    File { contents: String },
    /// A directory containing a nested tree.
    Directory { children: FileTree },
}

impl FileNode {
    /// Creates a file leaf from anything string-like.
    pub fn file(contents: impl Into<String>) -> Self {
        Self::File {
            contents: contents.into(),
        }
    }

    /// Returns the file contents if this node is a leaf.
    pub fn contents(&self) -> Option<&str> {
        match self {
            Self::File { contents } => Some(contents),
            Self::Directory { .. } => None,
        }
    }
}

/// Mapping from entry name to [`FileNode`].
///
/// Entry order is preserved for display; it carries no semantic meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct FileTree(pub IndexMap<String, FileNode>);

impl FileTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a `/`-separated path to a node.
    ///
    /// Returns `None` when any segment is missing or when a file leaf is
    /// traversed as if it were a directory.
    pub fn get(&self, path: &str) -> Option<&FileNode> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let first = segments.next()?;
        let mut node = self.0.get(first)?;
        for segment in segments {
            match node {
                FileNode::Directory { children } => node = children.0.get(segment)?,
                FileNode::File { .. } => return None,
            }
        }
        Some(node)
    }

    /// Creates or overwrites a single file leaf at `path`, creating
    /// intermediate directories as needed. Sibling entries are untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if an intermediate segment already resolves to a
    /// file leaf.
    pub fn set_file(&mut self, path: &str, contents: impl Into<String>) -> Result<()> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let (leaf, dirs) = segments
            .split_last()
            .ok_or_else(|| CodevError::internal("empty file path"))?;

        let mut current = &mut self.0;
        for segment in dirs {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| FileNode::Directory {
                    children: FileTree::new(),
                });
            match entry {
                FileNode::Directory { children } => current = &mut children.0,
                FileNode::File { .. } => {
                    return Err(CodevError::internal(format!(
                        "path segment '{}' in '{}' is a file, not a directory",
                        segment, path
                    )));
                }
            }
        }

        current.insert(leaf.to_string(), FileNode::file(contents));
        Ok(())
    }

    /// Returns the number of top-level entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over top-level entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FileNode)> {
        self.0.iter()
    }
}

/// Owner of the current file tree snapshot.
///
/// Mutations build a fresh tree and swap it in atomically; any snapshot
/// previously obtained via [`FileTreeModel::snapshot`] remains valid and
/// unchanged, so concurrent readers (sandbox mount, persistence) never
/// observe a partial tree.
#[derive(Debug, Clone, Default)]
pub struct FileTreeModel {
    current: Arc<FileTree>,
}

impl FileTreeModel {
    /// Creates a model with an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a model seeded with an existing tree.
    pub fn from_tree(tree: FileTree) -> Self {
        Self {
            current: Arc::new(tree),
        }
    }

    /// Returns an immutable snapshot of the current tree.
    pub fn snapshot(&self) -> Arc<FileTree> {
        Arc::clone(&self.current)
    }

    /// Resolves a path against the current snapshot.
    pub fn get(&self, path: &str) -> Option<FileNode> {
        self.current.get(path).cloned()
    }

    /// Creates or overwrites one file leaf and publishes a new snapshot.
    ///
    /// # Returns
    ///
    /// The new snapshot, for callers that want to hand it directly to a
    /// consumer (e.g. a sandbox mount) without re-reading the model.
    pub fn set_file(&mut self, path: &str, contents: impl Into<String>) -> Result<Arc<FileTree>> {
        let mut next = (*self.current).clone();
        next.set_file(path, contents)?;
        self.current = Arc::new(next);
        Ok(self.snapshot())
    }

    /// Wholesale atomic swap, used when the agent proposes a new tree.
    ///
    /// Paths present before but absent from `tree` are gone afterwards.
    pub fn replace(&mut self, tree: FileTree) {
        self.current = Arc::new(tree);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with(entries: &[(&str, &str)]) -> FileTree {
        let mut tree = FileTree::new();
        for (path, contents) in entries {
            tree.set_file(path, *contents).unwrap();
        }
        tree
    }

    #[test]
    fn test_set_file_last_write_wins() {
        let mut model = FileTreeModel::new();
        model.set_file("index.js", "v1").unwrap();
        model.set_file("other.js", "untouched").unwrap();
        model.set_file("index.js", "v2").unwrap();

        assert_eq!(model.get("index.js"), Some(FileNode::file("v2")));
        assert_eq!(model.get("other.js"), Some(FileNode::file("untouched")));
    }

    #[test]
    fn test_replace_drops_absent_paths() {
        let mut model = FileTreeModel::from_tree(tree_with(&[("old.js", "x")]));
        model.replace(tree_with(&[("new.js", "y")]));

        assert_eq!(model.get("new.js"), Some(FileNode::file("y")));
        assert_eq!(model.get("old.js"), None);
    }

    #[test]
    fn test_snapshot_survives_later_writes() {
        let mut model = FileTreeModel::new();
        model.set_file("a.js", "1").unwrap();
        let snapshot = model.snapshot();

        model.set_file("a.js", "2").unwrap();
        model.set_file("b.js", "3").unwrap();

        assert_eq!(snapshot.get("a.js"), Some(&FileNode::file("1")));
        assert_eq!(snapshot.get("b.js"), None);
        assert_eq!(model.get("a.js"), Some(FileNode::file("2")));
    }

    #[test]
    fn test_nested_paths_create_directories() {
        let mut tree = FileTree::new();
        tree.set_file("src/lib/util.js", "export {}").unwrap();

        assert_eq!(
            tree.get("src/lib/util.js"),
            Some(&FileNode::file("export {}"))
        );
        assert!(matches!(
            tree.get("src"),
            Some(FileNode::Directory { .. })
        ));
        assert_eq!(tree.get("src/missing.js"), None);
    }

    #[test]
    fn test_set_file_through_leaf_fails() {
        let mut tree = tree_with(&[("a.js", "1")]);
        let err = tree.set_file("a.js/nested.js", "x").unwrap_err();
        assert!(err.to_string().contains("a.js"));
        // The original leaf is untouched.
        assert_eq!(tree.get("a.js"), Some(&FileNode::file("1")));
    }

    #[test]
    fn test_wire_format_round_trip() {
        let json = r#"{"a.js":{"file":{"contents":"1"}}}"#;
        let tree: FileTree = serde_json::from_str(json).unwrap();
        assert_eq!(tree.get("a.js"), Some(&FileNode::file("1")));
        assert_eq!(serde_json::to_string(&tree).unwrap(), json);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let tree = tree_with(&[("b.js", "1"), ("a.js", "2"), ("c.js", "3")]);
        let names: Vec<&String> = tree.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["b.js", "a.js", "c.js"]);
    }
}
