pub mod collaborator;
pub mod error;
pub mod file_tree;
pub mod message;
pub mod project;
pub mod service;

// Re-export common error type
pub use error::{CodevError, Result};
pub use file_tree::{FileNode, FileTree, FileTreeModel};
pub use message::{AgentEnvelope, ChatMessage, Classified, MessageLog, Participant, classify};
pub use project::{ProjectSnapshot, ProjectState};
