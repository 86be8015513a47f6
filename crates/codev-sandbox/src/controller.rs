//! Sandbox session controller.
//!
//! Owns the lifecycle of the running execution process:
//! mount -> install -> start -> ready notification, with restart on rerun
//! and teardown on session end. The controller is driven from a single
//! session control flow; the only genuine concurrency is process output
//! streaming and ready-notification delivery, both of which are forwarded
//! through channels without ever blocking the controller.

use crate::capability::{OutputChunk, SandboxCapability, SandboxProcess, ServerReady};
use crate::config::SandboxConfig;
use crate::phase::SandboxPhase;
use codev_core::file_tree::FileTree;
use codev_core::{CodevError, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A server-ready notification tagged with the run that registered
/// interest in it.
///
/// Runs are numbered with a monotonically increasing generation; a
/// notification whose generation is older than the controller's current one
/// belongs to a superseded run and is discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyNotification {
    pub generation: u64,
    pub port: u16,
    pub url: String,
}

/// Controller for one session's sandbox.
pub struct SandboxController {
    capability: Arc<dyn SandboxCapability>,
    config: SandboxConfig,
    phase: SandboxPhase,
    /// Monotonically increasing run counter for stale-ready rejection
    generation: u64,
    /// At most one running start-step process at a time
    running: Option<Box<dyn SandboxProcess>>,
    preview_url: Option<String>,
    preview_port: Option<u16>,
    /// A run requested before `attach` completed, executed on `Ready`
    deferred_run: Option<Arc<FileTree>>,
    ready_tx: mpsc::UnboundedSender<ReadyNotification>,
    ready_rx: Option<mpsc::UnboundedReceiver<ReadyNotification>>,
    output_tx: Option<mpsc::UnboundedSender<OutputChunk>>,
}

impl SandboxController {
    /// Creates a controller over an unacquired capability.
    pub fn new(capability: Arc<dyn SandboxCapability>, config: SandboxConfig) -> Self {
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        Self {
            capability,
            config,
            phase: SandboxPhase::Uninitialized,
            generation: 0,
            running: None,
            preview_url: None,
            preview_port: None,
            deferred_run: None,
            ready_tx,
            ready_rx: Some(ready_rx),
            output_tx: None,
        }
    }

    pub fn phase(&self) -> SandboxPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Preview URL of the last ready notification (or a user override).
    /// Only meaningful while a process is running.
    pub fn preview_url(&self) -> Option<&str> {
        self.preview_url.as_deref()
    }

    pub fn preview_port(&self) -> Option<u16> {
        self.preview_port
    }

    /// Lets the user point the preview elsewhere (address-bar override).
    pub fn set_preview_url_override(&mut self, url: impl Into<String>) {
        self.preview_url = Some(url.into());
    }

    /// Subscribes to install/start output chunks.
    ///
    /// Chunks are forwarded as they arrive; if the receiver lags or is
    /// dropped the forwarding task skips, it never blocks the controller.
    pub fn subscribe_output(&mut self) -> mpsc::UnboundedReceiver<OutputChunk> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.output_tx = Some(tx);
        rx
    }

    /// Takes the ready-notification stream. The session event loop is the
    /// single consumer; call once.
    pub fn take_ready_notifications(&mut self) -> Option<mpsc::UnboundedReceiver<ReadyNotification>> {
        self.ready_rx.take()
    }

    /// Acquires the sandbox capability (`Uninitialized -> Ready`).
    ///
    /// A run requested while unattached was deferred and is executed here.
    ///
    /// # Errors
    ///
    /// Returns [`CodevError::Sandbox`] if the capability cannot be
    /// acquired; the controller stays `Uninitialized` and attach may be
    /// retried.
    pub async fn attach(&mut self) -> Result<()> {
        if self.phase != SandboxPhase::Uninitialized {
            return Ok(());
        }
        self.capability
            .acquire()
            .await
            .map_err(|e| CodevError::sandbox(format!("capability unavailable: {}", e)))?;
        self.phase = SandboxPhase::Ready;
        debug!("sandbox capability acquired");

        if let Some(tree) = self.deferred_run.take() {
            debug!("executing run deferred until attach");
            self.run(tree).await?;
        }
        Ok(())
    }

    /// Mounts a snapshot without touching any running process.
    ///
    /// Used when the agent delivers a new tree mid-session. Idempotent; an
    /// explicit run performs its own mount.
    pub async fn mount(&mut self, tree: Arc<FileTree>) -> Result<()> {
        if !self.phase.is_attached() {
            return Err(CodevError::sandbox("cannot mount: sandbox not attached"));
        }
        self.capability.mount(&tree).await?;
        if self.phase == SandboxPhase::Ready {
            self.phase = SandboxPhase::Mounted;
        }
        Ok(())
    }

    /// Executes a run: mount the snapshot, spawn install, terminate any
    /// previous process, spawn start, and register interest in the next
    /// server-ready notification.
    ///
    /// Called before `attach` completes, the run is deferred (last request
    /// wins) and executed once the capability is ready.
    ///
    /// # Errors
    ///
    /// Any failure reverts the phase to `Mounted` and surfaces
    /// [`CodevError::Sandbox`]; the user may retry.
    pub async fn run(&mut self, tree: Arc<FileTree>) -> Result<()> {
        match self.phase {
            SandboxPhase::Uninitialized => {
                debug!("run requested before attach; deferring");
                self.deferred_run = Some(tree);
                return Ok(());
            }
            SandboxPhase::Stopped => {
                return Err(CodevError::sandbox("session already torn down"));
            }
            _ => {}
        }

        match self.run_inner(tree).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "run failed, reverting to mounted");
                self.phase = SandboxPhase::Mounted;
                Err(e)
            }
        }
    }

    async fn run_inner(&mut self, tree: Arc<FileTree>) -> Result<()> {
        self.capability.mount(&tree).await?;
        self.phase = SandboxPhase::Mounted;

        self.generation += 1;
        let generation = self.generation;
        self.preview_url = None;
        self.preview_port = None;
        debug!(generation, "starting run");

        let mut install = self
            .capability
            .spawn(&self.config.install_command.program, &self.config.install_command.args)
            .await?;
        self.forward_output(install.as_mut(), "install");
        self.phase = SandboxPhase::Installing;

        // At most one running process: request termination of the previous
        // one before spawning the new start step. Death may complete
        // asynchronously; its eventual ready notification is rejected by
        // generation anyway.
        if let Some(mut old) = self.running.take() {
            old.kill().await?;
        }

        // Subscribe before spawning so a fast server cannot slip a ready
        // notification past us.
        let mut ready_rx = self.capability.ready_events().await?;
        let ready_tx = self.ready_tx.clone();
        tokio::spawn(async move {
            if let Some(ServerReady { port, url }) = ready_rx.recv().await {
                // Non-blocking send - if the session is gone we just skip
                let _ = ready_tx.send(ReadyNotification {
                    generation,
                    port,
                    url,
                });
            }
        });

        let mut start = self
            .capability
            .spawn(&self.config.start_command.program, &self.config.start_command.args)
            .await?;
        self.forward_output(start.as_mut(), "start");
        self.running = Some(start);
        self.phase = SandboxPhase::Starting;

        Ok(())
    }

    /// Applies a ready notification.
    ///
    /// The notification is discarded unless a start step of the current
    /// generation is awaiting it: one from a superseded generation, or one
    /// arriving after a failed run or after teardown, must not claim the
    /// preview. The generation alone is not enough, because a terminated
    /// process can announce late on the subscription of a run whose start
    /// step never came up.
    ///
    /// # Returns
    ///
    /// `true` if the notification was applied and the controller is now
    /// `Running`, `false` if it was discarded.
    pub fn handle_ready(&mut self, notification: ReadyNotification) -> bool {
        if self.phase != SandboxPhase::Starting {
            debug!(
                phase = ?self.phase,
                "discarding ready notification, no start step awaiting one"
            );
            return false;
        }
        if notification.generation != self.generation {
            debug!(
                stale = notification.generation,
                current = self.generation,
                "discarding stale ready notification"
            );
            return false;
        }
        debug!(port = notification.port, url = %notification.url, "server ready");
        self.preview_port = Some(notification.port);
        self.preview_url = Some(notification.url);
        self.phase = SandboxPhase::Running;
        true
    }

    /// Tears the session down: terminate any running process and release
    /// the container handle.
    pub async fn teardown(&mut self) -> Result<()> {
        if let Some(mut process) = self.running.take() {
            if let Err(e) = process.kill().await {
                warn!(error = %e, "failed to kill process during teardown");
            }
        }
        if self.phase.is_attached() {
            self.capability.release().await?;
        }
        self.preview_url = None;
        self.preview_port = None;
        self.phase = SandboxPhase::Stopped;
        Ok(())
    }

    fn forward_output(&self, process: &mut dyn SandboxProcess, step: &'static str) {
        let Some(mut output) = process.take_output() else {
            return;
        };
        let Some(tx) = self.output_tx.clone() else {
            return;
        };
        tokio::spawn(async move {
            while let Some(data) = output.recv().await {
                // Non-blocking send - if the observer is dropped we just skip
                let _ = tx.send(OutputChunk { step, data });
            }
        });
    }
}
