//! Sandbox capability traits.
//!
//! The sandbox runtime itself is an opaque capability: something that can
//! mount a file tree, spawn processes with streamable output, and emit a
//! "server ready" notification with a preview URL. Implementations are
//! provided by the host; tests use mocks.

use async_trait::async_trait;
use codev_core::Result;
use codev_core::file_tree::FileTree;
use tokio::sync::mpsc;

/// A "server ready" notification emitted by the sandbox once a process
/// inside it starts listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerReady {
    pub port: u16,
    pub url: String,
}

/// A chunk of process output forwarded to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    /// Which step produced the chunk ("install" or "start")
    pub step: &'static str,
    pub data: String,
}

/// A process spawned inside the sandbox.
#[async_trait]
pub trait SandboxProcess: Send + Sync {
    /// Takes the process output stream (combined stdout/stderr chunks).
    ///
    /// Yields `None` once the stream has been taken; the stream itself ends
    /// when the process exits.
    fn take_output(&mut self) -> Option<mpsc::UnboundedReceiver<String>>;

    /// Requests termination. Death may complete asynchronously after this
    /// call returns; callers must not assume the process is already gone.
    async fn kill(&mut self) -> Result<()>;
}

/// The isolated execution environment.
#[async_trait]
pub trait SandboxCapability: Send + Sync {
    /// Acquires the underlying container. Called once per session.
    async fn acquire(&self) -> Result<()>;

    /// Mounts a file tree into the sandbox filesystem. Idempotent; may be
    /// called repeatedly without disturbing running processes.
    async fn mount(&self, tree: &FileTree) -> Result<()>;

    /// Spawns a process inside the sandbox.
    async fn spawn(&self, command: &str, args: &[String]) -> Result<Box<dyn SandboxProcess>>;

    /// Subscribes to server-ready notifications.
    ///
    /// Each call returns a fresh receiver; the controller subscribes once
    /// per run so notifications can be attributed to the run that
    /// registered interest.
    async fn ready_events(&self) -> Result<mpsc::UnboundedReceiver<ServerReady>>;

    /// Releases the container handle.
    async fn release(&self) -> Result<()>;
}
