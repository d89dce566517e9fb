//! Top-level composition of the session, chat, history, and permission
//! managers into the surface the plugin host drives.
//!
//! The orchestrator owns the turn flow (prepare, record, send, settle) and
//! the restore flows (load with a replay window, resume with a local
//! backfill). It also pumps the transport's notification channel into
//! [`ChatController::route_update`]; the transport never touches the
//! managers directly.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::acp;
use crate::chat::{ChatController, ChatEvent};
use crate::client::AgentClient;
use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::history::{SessionHistoryManager, SessionSummary};
use crate::permission::PermissionCoordinator;
use crate::prompt::{prepare_prompt, PromptInput};
use crate::send::{PromptSender, SendPromptResult};
use crate::session::{AgentSessionManager, ChatSession};
use crate::settings::SettingsStore;
use crate::vault::VaultAccess;

pub struct ChatOrchestrator {
    vault: Arc<dyn VaultAccess>,
    settings: Arc<dyn SettingsStore>,
    sessions: Arc<AgentSessionManager>,
    chat: Arc<ChatController>,
    history: Arc<SessionHistoryManager>,
    permissions: Arc<PermissionCoordinator>,
    sender: PromptSender,
}

impl ChatOrchestrator {
    pub fn new(
        client: Arc<dyn AgentClient>,
        vault: Arc<dyn VaultAccess>,
        settings: Arc<dyn SettingsStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions: Arc::new(AgentSessionManager::new(
                client.clone(),
                settings.clone(),
                clock.clone(),
            )),
            chat: Arc::new(ChatController::new(settings.clone(), clock.clone())),
            history: Arc::new(SessionHistoryManager::new(
                client.clone(),
                settings.clone(),
                clock,
            )),
            permissions: Arc::new(PermissionCoordinator::new(client.clone())),
            sender: PromptSender::new(client),
            vault,
            settings,
        }
    }

    pub fn sessions(&self) -> &AgentSessionManager {
        &self.sessions
    }

    pub fn chat(&self) -> &ChatController {
        &self.chat
    }

    pub fn history(&self) -> &SessionHistoryManager {
        &self.history
    }

    pub fn permissions(&self) -> &PermissionCoordinator {
        &self.permissions
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.chat.subscribe()
    }

    /// Pumps transport notifications into the router until the channel
    /// closes (agent process exit).
    pub fn spawn_notification_pump(
        &self,
        mut notifications: mpsc::Receiver<acp::SessionNotification>,
    ) -> JoinHandle<()> {
        let chat = self.chat.clone();
        let sessions = self.sessions.clone();
        let permissions = self.permissions.clone();
        tokio::spawn(async move {
            while let Some(notification) = notifications.recv().await {
                chat.route_update(notification, &sessions, &permissions);
            }
            tracing::debug!("Notification channel closed");
        })
    }

    /// Pumps out-of-band transport errors to subscribers.
    pub fn spawn_error_pump(&self, mut errors: mpsc::Receiver<acp::Error>) -> JoinHandle<()> {
        let chat = self.chat.clone();
        tokio::spawn(async move {
            while let Some(error) = errors.recv().await {
                chat.report_agent_error(error);
            }
        })
    }

    /// Starts a fresh session, optionally on a different agent.
    pub async fn new_session(&self, agent_id: Option<&str>) -> ChatSession {
        self.history.invalidate_cache();
        let session = self.sessions.create_session(agent_id).await;
        self.adopt_for_chat(&session);
        session
    }

    /// Reopens a stored session, preferring `session/load` (full replay)
    /// over `session/resume` (reattach plus local backfill).
    pub async fn restore_session(&self, session_id: &acp::SessionId) -> Result<ChatSession> {
        let capabilities = self
            .sessions
            .session()
            .agent_capabilities
            .unwrap_or_default();
        // Checked before the controller is re-scoped: a restore that will
        // never run must leave the live transcript and its session scope
        // untouched.
        if !capabilities.can_restore() {
            return Err(CoreError::CapabilityUnsupported("session restoration"));
        }
        let agent_id = self.sessions.session().agent_id.clone();

        // Either way the locally saved transcript is what gets rendered;
        // the replay window keeps a load's replayed chunks from being
        // applied on top of it.
        self.chat
            .attach_session(Some(session_id.clone()), agent_id.clone());
        let session = if capabilities.load_session {
            self.chat.begin_history_replay();
            let session = self.sessions.load_session(session_id).await;
            self.rescope_chat(session_id, &session, &agent_id);
            self.backfill_transcript(session_id).await;
            self.chat.end_history_replay();
            session
        } else {
            let session = self.sessions.resume_session(session_id).await;
            self.rescope_chat(session_id, &session, &agent_id);
            self.backfill_transcript(session_id).await;
            session
        };

        if let Some(capabilities) = session.agent_capabilities {
            self.history.set_agent(session.agent_id.clone(), capabilities);
        }
        Ok(session)
    }

    /// Branches the current (or any stored) session into a new one that
    /// shares history up to the branch point.
    pub async fn fork_session(&self, session_id: &acp::SessionId) -> Result<ChatSession> {
        let cwd = self.sessions.session().working_directory.clone();
        let title = self.saved_title(session_id).await;
        let response = self
            .history
            .fork_session(session_id, &cwd, &title)
            .await?;

        self.sessions.adopt_session_response(response.clone());
        let session = self.sessions.session();
        self.chat
            .attach_session(Some(response.session_id.clone()), session.agent_id.clone());
        let messages = self.history.local_messages(&response.session_id).await;
        if !messages.is_empty() {
            self.chat.replace_messages(messages);
        }
        Ok(session)
    }

    /// Deletes a stored session. Deleting the live session also tears the
    /// connection down.
    pub async fn delete_session(&self, session_id: &acp::SessionId) -> Result<()> {
        self.history.delete_session(session_id).await?;
        let live = self.sessions.session().session_id;
        if live.as_ref() == Some(session_id) {
            self.close().await;
        }
        Ok(())
    }

    /// The merged session list for the current working directory.
    pub async fn fetch_sessions(&self) -> Result<Vec<SessionSummary>> {
        let cwd = self.sessions.session().working_directory.clone();
        self.history.fetch_sessions(Some(&cwd)).await
    }

    pub async fn load_more_sessions(&self) -> Result<Vec<SessionSummary>> {
        self.history.load_more_sessions().await
    }

    /// Runs one full prompt turn: expand context, record the user message,
    /// send, and settle `is_sending` regardless of outcome.
    pub async fn send_prompt(&self, mut input: PromptInput) -> Result<SendPromptResult> {
        let session = self.sessions.session();
        if !session.is_ready() {
            return Err(CoreError::NoActiveSession);
        }
        let capabilities = session.prompt_capabilities.unwrap_or_default();

        if input.auto_context.is_none() {
            input.auto_context = self.vault.active_context();
        }
        let prepared = prepare_prompt(self.vault.as_ref(), &capabilities, input).await;
        if prepared.agent_content.is_empty() {
            return Ok(SendPromptResult {
                success: true,
                requires_auth: false,
                retried_after_auth: false,
                stop_reason: None,
                error: None,
            });
        }

        self.chat.push_user_message(prepared.display_content).await;
        self.chat.set_sending(true).await;
        let result = self
            .sender
            .send_prompt(&self.sessions, prepared.agent_content)
            .await;
        self.chat.set_sending(false).await;
        Ok(result)
    }

    /// Cancels the in-flight turn; always unblocks the UI.
    pub async fn cancel(&self) {
        self.sessions.cancel_operation().await;
        self.permissions.clear();
        self.chat.cancel_pending_permissions();
        self.chat.set_sending(false).await;
    }

    pub async fn approve_permission(&self, option_id: acp::PermissionOptionId) -> Result<bool> {
        self.permissions.approve(option_id).await
    }

    pub async fn reject_permission(&self) -> Result<bool> {
        self.permissions.reject().await
    }

    pub async fn set_mode(&self, mode_id: acp::SessionModeId) -> Result<()> {
        self.sessions.set_mode(mode_id).await
    }

    pub async fn set_model(&self, model_id: acp::ModelId) -> Result<()> {
        self.sessions.set_model(model_id).await
    }

    /// Kills and respawns the agent process, then opens a fresh session.
    pub async fn restart_agent(&self) -> ChatSession {
        self.history.invalidate_cache();
        let session = self.sessions.force_restart_agent().await;
        self.adopt_for_chat(&session);
        session
    }

    /// Tears the session down and detaches the transcript.
    pub async fn close(&self) {
        self.sessions.close_session().await;
        let agent_id = self.sessions.session().agent_id.clone();
        self.chat.attach_session(None, agent_id);
    }

    fn adopt_for_chat(&self, session: &ChatSession) {
        self.chat
            .attach_session(session.session_id.clone(), session.agent_id.clone());
        if let Some(capabilities) = session.agent_capabilities {
            self.history.set_agent(session.agent_id.clone(), capabilities);
        }
    }

    /// Re-scopes the transcript when the agent issued a different id for
    /// the reattached session.
    fn rescope_chat(&self, requested: &acp::SessionId, session: &ChatSession, agent_id: &str) {
        if let Some(actual) = &session.session_id {
            if actual != requested {
                self.chat
                    .attach_session(Some(actual.clone()), agent_id.to_string());
            }
        }
    }

    async fn backfill_transcript(&self, session_id: &acp::SessionId) {
        let messages = self.history.local_messages(session_id).await;
        if !messages.is_empty() {
            self.chat.replace_messages(messages);
        }
    }

    async fn saved_title(&self, session_id: &acp::SessionId) -> String {
        self.settings
            .saved_sessions(None, None)
            .await
            .into_iter()
            .find(|info| info.session_id == session_id.as_str())
            .map(|info| info.title)
            .unwrap_or_else(|| "Untitled session".to_string())
    }

    pub fn working_directory(&self) -> PathBuf {
        self.sessions.session().working_directory
    }
}
