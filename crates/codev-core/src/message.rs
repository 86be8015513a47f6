//! Chat message types and classification.
//!
//! Messages arrive from the realtime channel in whatever interleaving the
//! channel delivers; the log records that order as observed (append-only, no
//! reordering, no deletion). Each message is classified exactly once at
//! ingestion into a [`Classified`] variant so downstream logic is exhaustive
//! and typed instead of re-checking the agent sentinel id.

use crate::error::{CodevError, Result};
use crate::file_tree::FileTree;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// A participant in a session (human collaborator or the automated agent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Unique participant identifier
    pub id: String,
    /// Name shown in the conversation
    pub display_name: String,
}

impl Participant {
    /// Reserved id denoting the automated agent.
    pub const AGENT_ID: &'static str = "ai";

    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    /// The automated agent participant.
    pub fn agent() -> Self {
        Self::new(Self::AGENT_ID, "AI")
    }

    /// Returns true if this participant is the automated agent.
    pub fn is_agent(&self) -> bool {
        self.id == Self::AGENT_ID
    }
}

/// A single chat message.
///
/// The `id` is assigned once at construction and is the message's identity
/// for de-duplication: a channel that echoes a sender's own publish back
/// delivers the same id, which the log refuses to append twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Opaque message identity (UUID v4)
    pub id: Uuid,
    /// The participant who authored this message
    pub sender: Participant,
    /// Plain text for humans; a JSON envelope for the agent
    pub body: String,
    /// Timestamp when the message was created (ISO 8601 format)
    pub sent_at: String,
}

impl ChatMessage {
    /// Creates a new message with a fresh identity and the current time.
    pub fn new(sender: Participant, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            body: body.into(),
            sent_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// JSON envelope carried in the body of agent-authored messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEnvelope {
    /// Markdown text shown in the conversation
    pub text: String,
    /// Optional proposed replacement for the whole project file tree
    #[serde(rename = "fileTree", default, skip_serializing_if = "Option::is_none")]
    pub file_tree: Option<FileTree>,
}

/// A message classified by sender kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// Plain text from a human collaborator.
    Human { body: String },
    /// Agent message with its envelope unpacked.
    Agent {
        text: String,
        file_tree: Option<FileTree>,
    },
}

/// Classifies a message by its sender kind.
///
/// Agent-authored bodies MUST be valid JSON with at least a `text` field;
/// anything else is a protocol error surfaced to the caller rather than
/// silently dropped, because dropping an agent message could desynchronize
/// the file tree the agent intended to deliver.
///
/// # Errors
///
/// Returns [`CodevError::Protocol`] when an agent body fails to parse.
pub fn classify(message: &ChatMessage) -> Result<Classified> {
    if !message.sender.is_agent() {
        return Ok(Classified::Human {
            body: message.body.clone(),
        });
    }

    let envelope: AgentEnvelope = serde_json::from_str(&message.body)
        .map_err(|e| CodevError::protocol(format!("malformed agent envelope: {}", e)))?;

    Ok(Classified::Agent {
        text: envelope.text,
        file_tree: envelope.file_tree,
    })
}

/// Ordered, append-only log of chat messages.
///
/// Arrival order is preserved exactly; entries are never mutated or removed
/// within a session.
#[derive(Debug, Default)]
pub struct MessageLog {
    entries: Vec<ChatMessage>,
    seen: HashSet<Uuid>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message unless its id was already appended.
    ///
    /// # Returns
    ///
    /// `true` if the message was appended, `false` if it was a duplicate.
    pub fn append(&mut self, message: ChatMessage) -> bool {
        if !self.seen.insert(message.id) {
            return false;
        }
        self.entries.push(message);
        true
    }

    /// All messages in arrival order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
