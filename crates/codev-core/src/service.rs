//! Service traits (ports) consumed by the session orchestrator.
//!
//! Implementations live in `codev-infrastructure`; tests use in-memory
//! mocks. All calls are simple request/response with no retries in the
//! core — failures surface to the user.

use crate::error::Result;
use crate::file_tree::FileTree;
use crate::message::{ChatMessage, Participant};
use crate::project::ProjectSnapshot;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Remote project service (HTTP CRUD, outside the core).
#[async_trait]
pub trait ProjectService: Send + Sync {
    /// Fetches a project snapshot by id.
    async fn fetch_project(&self, project_id: &str) -> Result<ProjectSnapshot>;

    /// Lists every known user (for the add-collaborators picker).
    async fn fetch_all_users(&self) -> Result<Vec<Participant>>;

    /// Creates a new project.
    async fn create_project(&self, name: &str) -> Result<ProjectSnapshot>;

    /// Grants the given users access to a project.
    async fn add_collaborators(&self, project_id: &str, user_ids: &[String]) -> Result<()>;

    /// Persists the current file tree.
    ///
    /// # Errors
    ///
    /// A failure here is a [`crate::CodevError::Persistence`]; the caller's
    /// in-memory tree remains authoritative.
    async fn save_file_tree(&self, project_id: &str, tree: &FileTree) -> Result<()>;
}

/// An event delivered on a channel subscription.
///
/// The channel guarantees at-most-once delivery per message and no ordering
/// across senders; the subscriber records interleaving as observed.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// A chat message from any participant (possibly our own echo).
    Message(ChatMessage),
    /// Transport-level delivery failure; the session continues with
    /// possibly-missing messages.
    DeliveryError(String),
}

/// Bidirectional realtime channel for a session topic.
#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    /// Publishes a message to all subscribers of `topic`.
    async fn publish(&self, topic: &str, message: &ChatMessage) -> Result<()>;

    /// Subscribes to `topic`, returning the inbound event stream.
    async fn subscribe(&self, topic: &str) -> Result<mpsc::UnboundedReceiver<ChannelEvent>>;
}
