/// Lifecycle phase of the sandbox session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SandboxPhase {
    /// Capability not yet acquired.
    #[default]
    Uninitialized,
    /// Container acquired, nothing mounted.
    Ready,
    /// A file tree is mounted.
    Mounted,
    /// Install step spawned.
    Installing,
    /// Start step spawned, waiting for server-ready.
    Starting,
    /// Server ready, preview URL known.
    Running,
    /// Session torn down, handle released.
    Stopped,
}

impl SandboxPhase {
    /// True once the capability has been acquired and not yet released.
    pub fn is_attached(self) -> bool {
        !matches!(self, Self::Uninitialized | Self::Stopped)
    }

    /// True while a start step's process may be alive.
    pub fn has_live_process(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}
