//! Session orchestration.
//!
//! This crate composes the Codev core components (file tree model, message
//! log, sandbox controller) into a [`SessionOrchestrator`] driven by a
//! single event loop, with a notification stream for the rendering layer.

pub mod notification;
pub mod orchestrator;

pub use notification::{SessionCommand, SessionNotification};
pub use orchestrator::SessionOrchestrator;
