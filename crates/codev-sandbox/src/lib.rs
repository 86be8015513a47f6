//! Sandbox session lifecycle.
//!
//! This crate owns the mount/install/start/ready state machine over an
//! opaque sandbox capability. The capability itself (an isolated execution
//! environment that can mount a file tree, spawn processes, and announce a
//! server-ready URL) is supplied by the host through the traits in
//! [`capability`].

pub mod capability;
pub mod config;
pub mod controller;
pub mod phase;

pub use capability::{OutputChunk, SandboxCapability, SandboxProcess, ServerReady};
pub use config::{CommandSpec, SandboxConfig};
pub use controller::{ReadyNotification, SandboxController};
pub use phase::SandboxPhase;
