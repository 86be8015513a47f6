//! Collaborator selection working set.

use std::collections::HashSet;

/// Working set of candidate user ids chosen before a batch
/// "add collaborators" commit.
///
/// Pure set membership with last-write-wins toggles; the set is discarded on
/// commit or cancel and has no persistence beyond the current interaction.
#[derive(Debug, Default)]
pub struct CollaboratorSelection {
    selected: HashSet<String>,
}

impl CollaboratorSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips membership for `id`. Toggling twice is a no-op.
    pub fn toggle(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.selected.remove(&id) {
            self.selected.insert(id);
        }
    }

    /// Returns true if `id` is currently selected.
    pub fn contains(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    /// Snapshots the current membership for a batch add.
    pub fn committed(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }

    /// Clears the working set.
    pub fn reset(&mut self) {
        self.selected.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}
