//! Project domain model.

use crate::file_tree::{FileTree, FileTreeModel};
use crate::message::Participant;
use serde::{Deserialize, Serialize};

/// A project as returned by the remote project service.
///
/// This is the request/response shape; the session-owned state it hydrates
/// is [`ProjectState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    /// Unique project identifier
    pub id: String,
    /// Human-readable project name
    pub name: String,
    /// File tree as last persisted
    #[serde(rename = "fileTree", default)]
    pub file_tree: FileTree,
    /// Users with access to the project
    #[serde(default)]
    pub collaborators: Vec<Participant>,
}

/// Session-owned project state, the unifying context the session components
/// read from and write to.
#[derive(Debug, Default)]
pub struct ProjectState {
    /// Project identifier
    pub id: String,
    /// Human-readable project name
    pub name: String,
    /// Canonical in-memory file tree
    pub file_tree: FileTreeModel,
    /// Users with access to the project
    pub collaborators: Vec<Participant>,
}

impl ProjectState {
    /// Creates state for a project not yet hydrated from the service.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Adopts a snapshot fetched from the remote project service.
    pub fn adopt(&mut self, snapshot: ProjectSnapshot) {
        self.id = snapshot.id;
        self.name = snapshot.name;
        self.file_tree.replace(snapshot.file_tree);
        self.collaborators = snapshot.collaborators;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_tree::FileNode;

    #[test]
    fn test_adopt_replaces_tree_and_collaborators() {
        let mut state = ProjectState::new("p-1");
        state.file_tree.set_file("stale.js", "old").unwrap();

        let mut tree = FileTree::new();
        tree.set_file("index.js", "console.log(1)").unwrap();
        state.adopt(ProjectSnapshot {
            id: "p-1".to_string(),
            name: "demo".to_string(),
            file_tree: tree,
            collaborators: vec![Participant::new("u-1", "alice@example.com")],
        });

        assert_eq!(
            state.file_tree.get("index.js"),
            Some(FileNode::file("console.log(1)"))
        );
        assert_eq!(state.file_tree.get("stale.js"), None);
        assert_eq!(state.collaborators.len(), 1);
    }
}
