//! Session orchestrator.
//!
//! Composes the file tree model, the message log, and the sandbox
//! controller for one collaborative session. All mutation happens on the
//! session's single control flow: the event loop processes one inbound
//! event fully (including any triggered mount) before accepting the next,
//! so a tree replace can never race a concurrent local edit.

use crate::notification::{SessionCommand, SessionNotification};
use codev_core::collaborator::CollaboratorSelection;
use codev_core::message::{ChatMessage, Classified, MessageLog, Participant, classify};
use codev_core::project::ProjectState;
use codev_core::service::{ChannelEvent, ProjectService, RealtimeChannel};
use codev_core::{CodevError, Result};
use codev_sandbox::controller::{ReadyNotification, SandboxController};
use codev_sandbox::{OutputChunk, SandboxPhase};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Orchestrates one collaborative session.
pub struct SessionOrchestrator {
    project: ProjectState,
    log: MessageLog,
    sandbox: SandboxController,
    selection: CollaboratorSelection,
    local_participant: Participant,
    /// Channel topic for this session (derived from the project id)
    topic: String,
    project_service: Arc<dyn ProjectService>,
    channel: Arc<dyn RealtimeChannel>,
    /// Every known user, for the add-collaborators picker
    available_users: Vec<Participant>,
    /// Editor tab state (ordered, no duplicates)
    open_files: Vec<String>,
    current_file: Option<String>,
    notify_tx: mpsc::UnboundedSender<SessionNotification>,
    notify_rx: Option<mpsc::UnboundedReceiver<SessionNotification>>,
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    command_rx: Option<mpsc::UnboundedReceiver<SessionCommand>>,
    output_rx: Option<mpsc::UnboundedReceiver<OutputChunk>>,
}

impl SessionOrchestrator {
    /// Creates an orchestrator for `project_id` on behalf of
    /// `local_participant`.
    pub fn new(
        project_id: impl Into<String>,
        local_participant: Participant,
        project_service: Arc<dyn ProjectService>,
        channel: Arc<dyn RealtimeChannel>,
        mut sandbox: SandboxController,
    ) -> Self {
        let project_id = project_id.into();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let output_rx = sandbox.subscribe_output();
        Self {
            topic: format!("project-{}", project_id),
            project: ProjectState::new(project_id),
            log: MessageLog::new(),
            sandbox,
            selection: CollaboratorSelection::new(),
            local_participant,
            project_service,
            channel,
            available_users: Vec::new(),
            open_files: Vec::new(),
            current_file: None,
            notify_tx,
            notify_rx: Some(notify_rx),
            command_tx,
            command_rx: Some(command_rx),
            output_rx: Some(output_rx),
        }
    }

    // ============================================================================
    // State accessors (read side of the UI interface)
    // ============================================================================

    pub fn project(&self) -> &ProjectState {
        &self.project
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.log.messages()
    }

    pub fn sandbox_phase(&self) -> SandboxPhase {
        self.sandbox.phase()
    }

    pub fn preview_url(&self) -> Option<&str> {
        self.sandbox.preview_url()
    }

    pub fn available_users(&self) -> &[Participant] {
        &self.available_users
    }

    pub fn selection_contains(&self, user_id: &str) -> bool {
        self.selection.contains(user_id)
    }

    pub fn open_files(&self) -> &[String] {
        &self.open_files
    }

    pub fn current_file(&self) -> Option<&str> {
        self.current_file.as_deref()
    }

    /// Takes the notification stream. The rendering layer is the single
    /// consumer; call once.
    pub fn take_notifications(&mut self) -> Option<mpsc::UnboundedReceiver<SessionNotification>> {
        self.notify_rx.take()
    }

    /// A handle for dispatching user intents into the event loop.
    pub fn command_sender(&self) -> mpsc::UnboundedSender<SessionCommand> {
        self.command_tx.clone()
    }

    // ============================================================================
    // Session bootstrap
    // ============================================================================

    /// Hydrates the session from the remote project service: the persisted
    /// project snapshot and the list of every known user.
    ///
    /// # Errors
    ///
    /// Surfaces service failures; nothing local is modified on error.
    pub async fn load_project(&mut self) -> Result<()> {
        let snapshot = self.project_service.fetch_project(&self.project.id).await?;
        info!(project_id = %snapshot.id, name = %snapshot.name, "project loaded");
        self.project.adopt(snapshot);
        self.available_users = self.project_service.fetch_all_users().await?;
        self.notify(SessionNotification::FileTreeReplaced);
        self.notify(SessionNotification::CollaboratorsUpdated(
            self.project.collaborators.clone(),
        ));
        Ok(())
    }

    /// Acquires the sandbox capability. A run requested before this
    /// completes is deferred by the controller and executed on ready.
    pub async fn attach_sandbox(&mut self) -> Result<()> {
        self.sandbox.attach().await
    }

    // ============================================================================
    // Inbound events
    // ============================================================================

    /// Handles one event delivered by the realtime channel.
    ///
    /// The message is appended to the log first (raw, so the conversation
    /// is never silently truncated), then classified; an agent message
    /// carrying a file tree replaces the model and, when the sandbox is
    /// attached, remounts it. Only an explicit run triggers install/start.
    pub async fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::DeliveryError(reason) => {
                warn!(%reason, "channel delivery error");
                self.notify(SessionNotification::ChannelError(reason));
            }
            ChannelEvent::Message(message) => {
                if !self.log.append(message.clone()) {
                    // Our own publish echoed back; already displayed.
                    debug!(id = %message.id, "duplicate message discarded");
                    return;
                }
                match classify(&message) {
                    Ok(Classified::Agent {
                        file_tree: Some(tree),
                        ..
                    }) => {
                        self.project.file_tree.replace(tree);
                        self.notify(SessionNotification::FileTreeReplaced);
                        if self.sandbox.phase().is_attached() {
                            let snapshot = self.project.file_tree.snapshot();
                            if let Err(e) = self.sandbox.mount(snapshot).await {
                                warn!(error = %e, "mount of agent tree failed");
                                self.notify(SessionNotification::SandboxFailure(e.to_string()));
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, sender = %message.sender.id, "protocol violation");
                        self.notify(SessionNotification::ProtocolViolation(e.to_string()));
                    }
                }
                self.notify(SessionNotification::MessageAppended(message));
            }
        }
    }

    /// Applies a sandbox ready notification, ignoring stale generations.
    pub fn on_sandbox_ready(&mut self, notification: ReadyNotification) {
        let port = notification.port;
        let url = notification.url.clone();
        if self.sandbox.handle_ready(notification) {
            self.notify(SessionNotification::PreviewReady { port, url });
        }
    }

    // ============================================================================
    // User intents
    // ============================================================================

    /// Applies a local edit and persists the tree in the background.
    ///
    /// The save is fire-and-forget: a failure is reported as a
    /// [`SessionNotification::PersistenceWarning`] while the in-memory tree
    /// remains authoritative. Editing does not remount the sandbox.
    pub fn on_user_edit(&mut self, path: &str, contents: &str) -> Result<()> {
        let snapshot = self.project.file_tree.set_file(path, contents)?;
        self.track_open_file(path);

        let service = Arc::clone(&self.project_service);
        let project_id = self.project.id.clone();
        let notify = self.notify_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = service.save_file_tree(&project_id, &snapshot).await {
                warn!(error = %e, "file tree save failed; edit may not be durable");
                let _ = notify.send(SessionNotification::PersistenceWarning(e.to_string()));
            }
        });
        Ok(())
    }

    /// Runs the project: mount current tree, install, start, await ready.
    pub async fn on_run_requested(&mut self) -> Result<()> {
        let snapshot = self.project.file_tree.snapshot();
        if let Err(e) = self.sandbox.run(snapshot).await {
            self.notify(SessionNotification::SandboxFailure(e.to_string()));
            return Err(e);
        }
        Ok(())
    }

    /// Sends a chat message: optimistic local append, then publish.
    ///
    /// If the channel echoes the publish back, the log's id-based
    /// de-duplication makes the echo a no-op.
    pub async fn on_send_message(&mut self, body: impl Into<String>) -> Result<()> {
        let message = ChatMessage::new(self.local_participant.clone(), body);
        self.log.append(message.clone());
        self.notify(SessionNotification::MessageAppended(message.clone()));

        if let Err(e) = self.channel.publish(&self.topic, &message).await {
            warn!(error = %e, "publish failed");
            let reason = e.to_string();
            self.notify(SessionNotification::ChannelError(reason.clone()));
            return Err(CodevError::channel_delivery(reason));
        }
        Ok(())
    }

    /// Marks a file open in the editor surface and focuses it.
    pub fn open_file(&mut self, path: &str) {
        self.track_open_file(path);
    }

    pub fn set_preview_url(&mut self, url: impl Into<String>) {
        self.sandbox.set_preview_url_override(url);
    }

    fn track_open_file(&mut self, path: &str) {
        if !self.open_files.iter().any(|p| p == path) {
            self.open_files.push(path.to_string());
        }
        self.current_file = Some(path.to_string());
    }

    // ============================================================================
    // Collaborator flow
    // ============================================================================

    pub fn toggle_collaborator(&mut self, user_id: impl Into<String>) {
        self.selection.toggle(user_id);
    }

    /// Commits the working set as a batch add, refreshes the collaborator
    /// list from the service, and clears the selection.
    pub async fn commit_collaborators(&mut self) -> Result<()> {
        let user_ids = self.selection.committed();
        if user_ids.is_empty() {
            return Ok(());
        }
        if let Err(e) = self
            .project_service
            .add_collaborators(&self.project.id, &user_ids)
            .await
        {
            self.notify(SessionNotification::ServiceError(e.to_string()));
            return Err(e);
        }
        // The server has accepted the batch; the working set must not
        // survive to be re-sent on a retry.
        self.selection.reset();

        // Only the collaborator list is refreshed; adopting the whole
        // snapshot would clobber in-memory edits newer than the last save.
        match self.project_service.fetch_project(&self.project.id).await {
            Ok(snapshot) => {
                self.project.collaborators = snapshot.collaborators;
                self.notify(SessionNotification::CollaboratorsUpdated(
                    self.project.collaborators.clone(),
                ));
                Ok(())
            }
            Err(e) => {
                self.notify(SessionNotification::ServiceError(e.to_string()));
                Err(e)
            }
        }
    }

    pub fn cancel_collaborators(&mut self) {
        self.selection.reset();
    }

    // ============================================================================
    // Event loop
    // ============================================================================

    /// Runs the session: subscribes to the channel and multiplexes inbound
    /// messages, sandbox ready notifications, sandbox output, and user
    /// commands. One event is processed fully before the next is accepted.
    ///
    /// Returns when a [`SessionCommand::Shutdown`] arrives or the channel
    /// subscription ends; the sandbox is torn down on every exit path,
    /// including a failed channel subscribe, so an acquired capability
    /// handle is never leaked.
    pub async fn run_event_loop(&mut self) -> Result<()> {
        let result = self.drive_events().await;
        let teardown = self.sandbox.teardown().await;
        result.and(teardown)
    }

    async fn drive_events(&mut self) -> Result<()> {
        let mut events = self.channel.subscribe(&self.topic).await?;
        let mut ready = self
            .sandbox
            .take_ready_notifications()
            .ok_or_else(|| CodevError::internal("ready notifications already taken"))?;
        let mut output = self
            .output_rx
            .take()
            .ok_or_else(|| CodevError::internal("event loop already running"))?;
        let mut commands = self
            .command_rx
            .take()
            .ok_or_else(|| CodevError::internal("event loop already running"))?;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.on_channel_event(event).await,
                    None => {
                        debug!("channel subscription ended");
                        break;
                    }
                },
                notification = ready.recv() => {
                    if let Some(notification) = notification {
                        self.on_sandbox_ready(notification);
                    }
                },
                chunk = output.recv() => {
                    if let Some(chunk) = chunk {
                        self.notify(SessionNotification::SandboxOutput(chunk));
                    }
                },
                command = commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.on_command(command).await,
                },
            }
        }

        Ok(())
    }

    async fn on_command(&mut self, command: SessionCommand) {
        // Errors are already surfaced as notifications by the handlers.
        let result = match command {
            SessionCommand::SendMessage(body) => self.on_send_message(body).await,
            SessionCommand::EditFile { path, contents } => self.on_user_edit(&path, &contents),
            SessionCommand::Run => self.on_run_requested().await,
            SessionCommand::OpenFile(path) => {
                self.open_file(&path);
                Ok(())
            }
            SessionCommand::SetPreviewUrl(url) => {
                self.set_preview_url(url);
                Ok(())
            }
            SessionCommand::ToggleCollaborator(id) => {
                self.toggle_collaborator(id);
                Ok(())
            }
            SessionCommand::CommitCollaborators => self.commit_collaborators().await,
            SessionCommand::CancelCollaborators => {
                self.cancel_collaborators();
                Ok(())
            }
            SessionCommand::Shutdown => Ok(()),
        };
        if let Err(e) = result {
            debug!(error = %e, "command failed");
        }
    }

    fn notify(&self, notification: SessionNotification) {
        // Non-blocking send - if the renderer is gone we just skip
        let _ = self.notify_tx.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codev_core::file_tree::{FileNode, FileTree};
    use codev_core::project::ProjectSnapshot;
    use codev_sandbox::capability::{SandboxCapability, SandboxProcess, ServerReady};
    use codev_sandbox::{SandboxConfig, SandboxController};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::mpsc::UnboundedReceiver;

    // Mock ProjectService for testing
    #[derive(Default)]
    struct MockProjectService {
        fail_save: AtomicBool,
        fail_fetch: AtomicBool,
        saved_trees: Mutex<Vec<FileTree>>,
        added: Mutex<Vec<Vec<String>>>,
        collaborators: Mutex<Vec<Participant>>,
    }

    #[async_trait]
    impl ProjectService for MockProjectService {
        async fn fetch_project(&self, project_id: &str) -> Result<ProjectSnapshot> {
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(CodevError::service("project service unavailable"));
            }
            let mut tree = FileTree::new();
            tree.set_file("app.js", "persisted").unwrap();
            Ok(ProjectSnapshot {
                id: project_id.to_string(),
                name: "demo".to_string(),
                file_tree: tree,
                collaborators: self.collaborators.lock().unwrap().clone(),
            })
        }

        async fn fetch_all_users(&self) -> Result<Vec<Participant>> {
            Ok(vec![
                Participant::new("u-1", "alice@example.com"),
                Participant::new("u-2", "bob@example.com"),
            ])
        }

        async fn create_project(&self, name: &str) -> Result<ProjectSnapshot> {
            Ok(ProjectSnapshot {
                id: "p-new".to_string(),
                name: name.to_string(),
                file_tree: FileTree::new(),
                collaborators: Vec::new(),
            })
        }

        async fn add_collaborators(&self, _project_id: &str, user_ids: &[String]) -> Result<()> {
            self.added.lock().unwrap().push(user_ids.to_vec());
            let mut collaborators = self.collaborators.lock().unwrap();
            for id in user_ids {
                collaborators.push(Participant::new(id.clone(), format!("{}@example.com", id)));
            }
            Ok(())
        }

        async fn save_file_tree(&self, _project_id: &str, tree: &FileTree) -> Result<()> {
            if self.fail_save.load(Ordering::SeqCst) {
                return Err(CodevError::persistence("service unavailable"));
            }
            self.saved_trees.lock().unwrap().push(tree.clone());
            Ok(())
        }
    }

    // Mock RealtimeChannel for testing
    #[derive(Default)]
    struct MockChannel {
        published: Mutex<Vec<ChatMessage>>,
        fail_subscribe: AtomicBool,
    }

    #[async_trait]
    impl RealtimeChannel for MockChannel {
        async fn publish(&self, _topic: &str, message: &ChatMessage) -> Result<()> {
            self.published.lock().unwrap().push(message.clone());
            Ok(())
        }

        async fn subscribe(&self, _topic: &str) -> Result<UnboundedReceiver<ChannelEvent>> {
            if self.fail_subscribe.load(Ordering::SeqCst) {
                return Err(CodevError::channel_delivery("subscribe refused"));
            }
            let (_tx, rx) = mpsc::unbounded_channel();
            Ok(rx)
        }
    }

    // Mock SandboxCapability for testing
    #[derive(Default)]
    struct MockCapability {
        mounts: AtomicUsize,
        spawns: AtomicUsize,
        released: AtomicBool,
    }

    struct MockProcess;

    #[async_trait]
    impl SandboxProcess for MockProcess {
        fn take_output(&mut self) -> Option<UnboundedReceiver<String>> {
            None
        }

        async fn kill(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl SandboxCapability for MockCapability {
        async fn acquire(&self) -> Result<()> {
            Ok(())
        }

        async fn mount(&self, _tree: &FileTree) -> Result<()> {
            self.mounts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn spawn(&self, _command: &str, _args: &[String]) -> Result<Box<dyn SandboxProcess>> {
            self.spawns.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockProcess))
        }

        async fn ready_events(&self) -> Result<UnboundedReceiver<ServerReady>> {
            let (_tx, rx) = mpsc::unbounded_channel();
            Ok(rx)
        }

        async fn release(&self) -> Result<()> {
            self.released.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        orchestrator: SessionOrchestrator,
        service: Arc<MockProjectService>,
        channel: Arc<MockChannel>,
        capability: Arc<MockCapability>,
        notifications: mpsc::UnboundedReceiver<SessionNotification>,
    }

    fn harness() -> Harness {
        let service = Arc::new(MockProjectService::default());
        let channel = Arc::new(MockChannel::default());
        let capability = Arc::new(MockCapability::default());
        let controller = SandboxController::new(capability.clone(), SandboxConfig::default());
        let mut orchestrator = SessionOrchestrator::new(
            "p-1",
            Participant::new("u-local", "local@example.com"),
            service.clone(),
            channel.clone(),
            controller,
        );
        let notifications = orchestrator.take_notifications().unwrap();
        Harness {
            orchestrator,
            service,
            channel,
            capability,
            notifications,
        }
    }

    fn agent_message(body: &str) -> ChannelEvent {
        ChannelEvent::Message(ChatMessage::new(Participant::agent(), body))
    }

    #[tokio::test]
    async fn test_agent_tree_replaces_model_and_mounts_when_attached() {
        let mut h = harness();
        h.orchestrator.attach_sandbox().await.unwrap();

        let body = r#"{"text":"here you go","fileTree":{"index.js":{"file":{"contents":"console.log(1)"}}}}"#;
        h.orchestrator.on_channel_event(agent_message(body)).await;

        assert_eq!(
            h.orchestrator.project().file_tree.get("index.js"),
            Some(FileNode::file("console.log(1)"))
        );
        assert_eq!(h.capability.mounts.load(Ordering::SeqCst), 1);
        // Mount only; install/start need an explicit run.
        assert_eq!(h.capability.spawns.load(Ordering::SeqCst), 0);
        assert_eq!(
            h.notifications.recv().await.unwrap(),
            SessionNotification::FileTreeReplaced
        );
    }

    #[tokio::test]
    async fn test_agent_tree_before_attach_skips_mount() {
        let mut h = harness();
        let body = r#"{"text":"hi","fileTree":{"a.js":{"file":{"contents":"1"}}}}"#;
        h.orchestrator.on_channel_event(agent_message(body)).await;

        assert!(h.orchestrator.project().file_tree.get("a.js").is_some());
        assert_eq!(h.capability.mounts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_agent_message_is_logged_raw() {
        let mut h = harness();
        h.orchestrator.on_channel_event(agent_message("not json")).await;

        // Appended as raw text so the conversation is not truncated.
        assert_eq!(h.orchestrator.messages().len(), 1);
        assert_eq!(h.orchestrator.messages()[0].body, "not json");
        assert!(matches!(
            h.notifications.recv().await.unwrap(),
            SessionNotification::ProtocolViolation(_)
        ));
    }

    #[tokio::test]
    async fn test_send_message_publishes_and_survives_echo() {
        let mut h = harness();
        h.orchestrator.on_send_message("hello all").await.unwrap();

        let published = h.channel.published.lock().unwrap().clone();
        assert_eq!(published.len(), 1);
        assert_eq!(h.orchestrator.messages().len(), 1);

        // The channel echoes our own publish back; the log must not grow.
        h.orchestrator
            .on_channel_event(ChannelEvent::Message(published[0].clone()))
            .await;
        assert_eq!(h.orchestrator.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_user_edit_persists_in_background() {
        let mut h = harness();
        h.orchestrator.on_user_edit("index.js", "edited").unwrap();

        // The save task runs on the runtime; wait for it to land.
        tokio::task::yield_now().await;
        let saved = h.service.saved_trees.lock().unwrap().clone();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].get("index.js"), Some(&FileNode::file("edited")));
        assert_eq!(h.orchestrator.current_file(), Some("index.js"));
        assert_eq!(h.orchestrator.open_files(), ["index.js".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_save_warns_but_keeps_local_tree() {
        let mut h = harness();
        h.service.fail_save.store(true, Ordering::SeqCst);
        h.orchestrator.on_user_edit("index.js", "edited").unwrap();

        let notification = h.notifications.recv().await.unwrap();
        assert!(matches!(
            notification,
            SessionNotification::PersistenceWarning(_)
        ));
        assert_eq!(
            h.orchestrator.project().file_tree.get("index.js"),
            Some(FileNode::file("edited"))
        );
    }

    #[tokio::test]
    async fn test_edit_does_not_remount() {
        let mut h = harness();
        h.orchestrator.attach_sandbox().await.unwrap();
        h.orchestrator.on_user_edit("index.js", "edited").unwrap();
        assert_eq!(h.capability.mounts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_uses_current_snapshot() {
        let mut h = harness();
        h.orchestrator.attach_sandbox().await.unwrap();
        h.orchestrator.on_user_edit("index.js", "v1").unwrap();
        h.orchestrator.on_run_requested().await.unwrap();

        assert_eq!(h.orchestrator.sandbox_phase(), SandboxPhase::Starting);
        assert_eq!(h.capability.spawns.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stale_ready_is_ignored() {
        let mut h = harness();
        h.orchestrator.attach_sandbox().await.unwrap();
        h.orchestrator.on_run_requested().await.unwrap();
        h.orchestrator.on_run_requested().await.unwrap();

        h.orchestrator.on_sandbox_ready(ReadyNotification {
            generation: 1,
            port: 3000,
            url: "http://sandbox/stale".to_string(),
        });
        assert_eq!(h.orchestrator.preview_url(), None);

        h.orchestrator.on_sandbox_ready(ReadyNotification {
            generation: 2,
            port: 3001,
            url: "http://sandbox/current".to_string(),
        });
        assert_eq!(h.orchestrator.preview_url(), Some("http://sandbox/current"));
        assert_eq!(h.orchestrator.sandbox_phase(), SandboxPhase::Running);
    }

    #[tokio::test]
    async fn test_load_project_adopts_snapshot_and_users() {
        let mut h = harness();
        h.orchestrator.load_project().await.unwrap();

        assert_eq!(h.orchestrator.project().name, "demo");
        assert_eq!(
            h.orchestrator.project().file_tree.get("app.js"),
            Some(FileNode::file("persisted"))
        );
        assert_eq!(h.orchestrator.available_users().len(), 2);
    }

    #[tokio::test]
    async fn test_collaborator_commit_flow() {
        let mut h = harness();
        h.orchestrator.toggle_collaborator("u-2");
        assert!(h.orchestrator.selection_contains("u-2"));

        h.orchestrator.commit_collaborators().await.unwrap();

        let added = h.service.added.lock().unwrap().clone();
        assert_eq!(added, vec![vec!["u-2".to_string()]]);
        assert_eq!(h.orchestrator.project().collaborators.len(), 1);
        assert!(!h.orchestrator.selection_contains("u-2"));
    }

    #[tokio::test]
    async fn test_commit_fetch_failure_warns_and_does_not_resend() {
        let mut h = harness();
        h.orchestrator.toggle_collaborator("u-2");
        h.service.fail_fetch.store(true, Ordering::SeqCst);

        let err = h.orchestrator.commit_collaborators().await.unwrap_err();
        assert!(matches!(err, CodevError::Service(_)));
        assert!(matches!(
            h.notifications.recv().await.unwrap(),
            SessionNotification::ServiceError(_)
        ));
        // The add was accepted server-side; the working set must not
        // survive to be re-sent on a retry.
        assert!(!h.orchestrator.selection_contains("u-2"));

        h.service.fail_fetch.store(false, Ordering::SeqCst);
        h.orchestrator.commit_collaborators().await.unwrap();
        assert_eq!(h.service.added.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_subscribe_still_releases_sandbox() {
        let mut h = harness();
        h.orchestrator.attach_sandbox().await.unwrap();
        h.channel.fail_subscribe.store(true, Ordering::SeqCst);

        let err = h.orchestrator.run_event_loop().await.unwrap_err();
        assert!(matches!(err, CodevError::ChannelDelivery(_)));
        assert!(h.capability.released.load(Ordering::SeqCst));
        assert_eq!(h.orchestrator.sandbox_phase(), SandboxPhase::Stopped);
    }

    #[tokio::test]
    async fn test_collaborator_cancel_discards_selection() {
        let mut h = harness();
        h.orchestrator.toggle_collaborator("u-1");
        h.orchestrator.cancel_collaborators();

        h.orchestrator.commit_collaborators().await.unwrap();
        assert!(h.service.added.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_error_is_surfaced_not_fatal() {
        let mut h = harness();
        h.orchestrator
            .on_channel_event(ChannelEvent::DeliveryError("socket closed".to_string()))
            .await;
        assert!(matches!(
            h.notifications.recv().await.unwrap(),
            SessionNotification::ChannelError(_)
        ));
        assert!(h.orchestrator.messages().is_empty());
    }
}
