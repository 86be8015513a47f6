//! Notifications pushed to the rendering layer.
//!
//! The UI is a pure consumer: it reads session state, renders these
//! notifications, and dispatches [`SessionCommand`]s back. Nothing here
//! blocks the session event loop; notifications ride an unbounded channel
//! and a dropped receiver is simply skipped.

use codev_core::message::{ChatMessage, Participant};
use codev_sandbox::OutputChunk;

/// A state change the rendering layer may want to reflect.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotification {
    /// A message was appended to the log (local send or remote arrival).
    MessageAppended(ChatMessage),
    /// The agent replaced the project file tree.
    FileTreeReplaced,
    /// The sandbox announced a serving preview.
    PreviewReady { port: u16, url: String },
    /// A chunk of install/start output.
    SandboxOutput(OutputChunk),
    /// A sandbox operation failed; the user may retry.
    SandboxFailure(String),
    /// A file-tree save failed; the in-memory tree is still authoritative
    /// but the edit may not be durable.
    PersistenceWarning(String),
    /// An agent message violated the envelope protocol; its raw body was
    /// still appended to the log.
    ProtocolViolation(String),
    /// Transport-level channel failure; messages may be missing.
    ChannelError(String),
    /// A remote project service request failed.
    ServiceError(String),
    /// The project's collaborator list changed.
    CollaboratorsUpdated(Vec<Participant>),
}

/// A user intent dispatched from the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Send a chat message authored by the local participant.
    SendMessage(String),
    /// Edit one file of the project tree.
    EditFile { path: String, contents: String },
    /// Run the project in the sandbox.
    Run,
    /// Open a file in the editor surface.
    OpenFile(String),
    /// Point the preview at a different URL.
    SetPreviewUrl(String),
    /// Toggle a user in the add-collaborators working set.
    ToggleCollaborator(String),
    /// Commit the working set as a batch add.
    CommitCollaborators,
    /// Discard the working set.
    CancelCollaborators,
    /// End the session, tearing down the sandbox.
    Shutdown,
}
