//! The `ChatSession` state machine and its manager.
//!
//! One `ChatSession` is the session-of-record: which agent is connected,
//! what it advertised, and where in the lifecycle the connection is
//! (`disconnected -> initializing -> ready | error`). Every mutation goes
//! through a snapshot-based updater so a slow RPC settling late can never
//! clobber state written after it started; there are no ad-hoc partial
//! writes.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

use crate::acp;
use crate::client::{AgentClient, AgentCommand, AgentConfig};
use crate::clock::Clock;
use crate::error::{CoreError, Result, SessionErrorInfo};
use crate::settings::{AgentSettingsEntry, SettingsStore, SettingsUpdate};

/// Lifecycle state of the session; the single source of truth for UI
/// gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Initializing,
    Ready,
    Error,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::Error => "error",
        };
        f.write_str(name)
    }
}

/// The session-of-record.
///
/// Invariant: `state == Ready` implies `session_id.is_some()`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSession {
    /// `None` until the agent confirms session creation.
    pub session_id: Option<acp::SessionId>,
    pub state: SessionState,
    pub agent_id: String,
    pub agent_display_name: String,
    /// Populated only on (re-)initialization of the agent process.
    pub auth_methods: Vec<acp::AuthMethod>,
    /// Agent-advertised, reset to `None` on every new session.
    pub available_commands: Option<Vec<acp::AvailableCommand>>,
    pub modes: Option<acp::SessionModeState>,
    pub models: Option<acp::SessionModelState>,
    /// Sticky across sessions with the same agent; refreshed only when the
    /// process is re-initialized.
    pub prompt_capabilities: Option<acp::PromptCapabilities>,
    pub agent_capabilities: Option<acp::AgentCapabilities>,
    pub agent_info: Option<acp::AgentInfo>,
    /// Set when `state == Error`.
    pub error: Option<SessionErrorInfo>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub working_directory: PathBuf,
}

impl ChatSession {
    pub fn new_disconnected(
        agent_id: impl Into<String>,
        display_name: impl Into<String>,
        working_directory: PathBuf,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: None,
            state: SessionState::Disconnected,
            agent_id: agent_id.into(),
            agent_display_name: display_name.into(),
            auth_methods: Vec::new(),
            available_commands: None,
            modes: None,
            models: None,
            prompt_capabilities: None,
            agent_capabilities: None,
            agent_info: None,
            error: None,
            created_at: now,
            last_activity_at: now,
            working_directory,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// The current mode id, when the agent advertises modes.
    pub fn current_mode_id(&self) -> Option<&acp::SessionModeId> {
        self.modes.as_ref().map(|m| &m.current_mode_id)
    }

    /// The current model id, when the agent advertises models.
    pub fn current_model_id(&self) -> Option<&acp::ModelId> {
        self.models.as_ref().map(|m| &m.current_model_id)
    }
}

/// Owns the `ChatSession` and drives its lifecycle against the transport.
pub struct AgentSessionManager {
    client: Arc<dyn AgentClient>,
    settings: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
    session: Mutex<ChatSession>,
}

impl AgentSessionManager {
    pub fn new(
        client: Arc<dyn AgentClient>,
        settings: Arc<dyn SettingsStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let snapshot = settings.snapshot();
        let agent_id = snapshot
            .default_agent_id
            .clone()
            .or_else(|| snapshot.agents.first().map(|a| a.id.clone()))
            .unwrap_or_default();
        let display_name = snapshot
            .agent(&agent_id)
            .map(|a| a.display_name.clone())
            .unwrap_or_else(|| agent_id.clone());
        let cwd = snapshot
            .working_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let session = ChatSession::new_disconnected(agent_id, display_name, cwd, clock.now());

        Self {
            client,
            settings,
            clock,
            session: Mutex::new(session),
        }
    }

    /// A snapshot of the current session.
    pub fn session(&self) -> ChatSession {
        self.session.lock().clone()
    }

    /// Applies a functional update over the current snapshot.
    ///
    /// This is the only mutation path; it keeps transitions atomic even
    /// when async operations settle out of order.
    pub fn update_session(&self, f: impl FnOnce(&ChatSession) -> ChatSession) {
        let mut guard = self.session.lock();
        let next = f(&guard);
        *guard = next;
    }

    /// Creates a new session, initializing the agent process when needed.
    ///
    /// All errors are converted into session `Error` state; callers never
    /// need their own `try`/`catch` around this.
    pub async fn create_session(&self, override_agent_id: Option<&str>) -> ChatSession {
        let target_agent = match self.resolve_agent_id(override_agent_id) {
            Ok(agent_id) => agent_id,
            Err(err) => return self.fail_session(&err),
        };

        match self.create_session_inner(&target_agent).await {
            Ok(()) => {
                self.reapply_preferred_model(&target_agent).await;
                self.session()
            }
            Err(err) => self.fail_session(&err),
        }
    }

    async fn create_session_inner(&self, agent_id: &str) -> Result<()> {
        let entry = self.agent_entry(agent_id)?;
        self.enter_initializing(agent_id, &entry);
        self.initialize_if_needed(agent_id, &entry).await?;

        let cwd = self.session.lock().working_directory.clone();
        let response = self
            .client
            .new_session(&cwd)
            .await
            .map_err(CoreError::from_protocol)?;
        self.adopt_session_response(response);
        Ok(())
    }

    /// Enters `initializing` with a fresh session for this agent. Sticky
    /// capabilities survive; per-session advertisements do not.
    fn enter_initializing(&self, agent_id: &str, entry: &AgentSettingsEntry) {
        let now = self.clock.now();
        self.update_session(|prev| {
            let mut next = ChatSession::new_disconnected(
                agent_id.to_string(),
                entry.display_name.clone(),
                prev.working_directory.clone(),
                now,
            );
            next.state = SessionState::Initializing;
            next.auth_methods = prev.auth_methods.clone();
            next.prompt_capabilities = prev.prompt_capabilities;
            next.agent_capabilities = prev.agent_capabilities;
            next.agent_info = prev.agent_info.clone();
            next
        });
    }

    /// Runs the process handshake unless the live process already belongs
    /// to this agent.
    async fn initialize_if_needed(&self, agent_id: &str, entry: &AgentSettingsEntry) -> Result<()> {
        let needs_initialize = !self.client.is_initialized()
            || self.client.current_agent_id().as_deref() != Some(agent_id);
        if !needs_initialize {
            return Ok(());
        }

        let config = self.build_agent_config(agent_id, entry)?;
        let init = self
            .client
            .initialize(config)
            .await
            .map_err(CoreError::from_protocol)?;
        tracing::debug!(
            agent_id = %agent_id,
            auth_methods = init.auth_methods.len(),
            "Agent initialized"
        );
        self.update_session(|prev| {
            let mut next = prev.clone();
            next.auth_methods = init.auth_methods.clone();
            next.prompt_capabilities = Some(init.prompt_capabilities);
            next.agent_capabilities = Some(init.agent_capabilities);
            next.agent_info = init.agent_info.clone();
            next
        });
        Ok(())
    }

    /// Loads a stored session on the default agent. History arrives later
    /// as replayed `session/update` notifications, not in the response.
    pub async fn load_session(&self, session_id: &acp::SessionId) -> ChatSession {
        self.reattach_session(session_id, RestoreKind::Load).await
    }

    /// Resumes a stored session without history replay.
    pub async fn resume_session(&self, session_id: &acp::SessionId) -> ChatSession {
        self.reattach_session(session_id, RestoreKind::Resume).await
    }

    async fn reattach_session(&self, session_id: &acp::SessionId, kind: RestoreKind) -> ChatSession {
        let agent_id = match self.resolve_agent_id(None) {
            Ok(agent_id) => agent_id,
            Err(err) => return self.fail_session(&err),
        };

        let result: Result<()> = async {
            let entry = self.agent_entry(&agent_id)?;
            self.enter_initializing(&agent_id, &entry);
            self.initialize_if_needed(&agent_id, &entry).await?;

            let cwd = self.session.lock().working_directory.clone();
            let response = match kind {
                RestoreKind::Load => self.client.load_session(session_id, &cwd).await,
                RestoreKind::Resume => self.client.resume_session(session_id, &cwd).await,
            }
            .map_err(CoreError::from_protocol)?;
            self.adopt_session_response(response);
            Ok(())
        }
        .await;

        match result {
            Ok(()) => self.session(),
            Err(err) => self.fail_session(&err),
        }
    }

    /// Alias for [`AgentSessionManager::create_session`]; restart is always
    /// a full reset through `initializing`.
    pub async fn restart_session(&self, new_agent_id: Option<&str>) -> ChatSession {
        self.create_session(new_agent_id).await
    }

    /// Unconditional disconnect, then a fresh session on the same agent.
    /// `create_session` is the single source of truth for the reset.
    pub async fn force_restart_agent(&self) -> ChatSession {
        if let Err(err) = self.client.disconnect().await {
            tracing::warn!(error = %err, "Disconnect before restart failed");
        }
        let agent_id = self.session.lock().agent_id.clone();
        self.create_session(Some(&agent_id)).await
    }

    /// Best-effort teardown; failures are logged, never raised, and the
    /// state always reaches `disconnected`.
    pub async fn close_session(&self) {
        let session_id = self.session.lock().session_id.clone();
        if let Some(session_id) = session_id {
            if let Err(err) = self.client.cancel(&session_id).await {
                tracing::warn!(session_id = %session_id, error = %err, "Cancel during close failed");
            }
        }
        if let Err(err) = self.client.disconnect().await {
            tracing::warn!(error = %err, "Disconnect failed");
        }
        let now = self.clock.now();
        self.update_session(|prev| {
            let mut next = prev.clone();
            next.session_id = None;
            next.state = SessionState::Disconnected;
            next.last_activity_at = now;
            next
        });
    }

    /// Cancels the in-flight operation. Even when the cancel RPC fails the
    /// session is forced back to `ready`: a stuck "sending" state is worse
    /// than an orphaned turn.
    pub async fn cancel_operation(&self) {
        let session_id = self.session.lock().session_id.clone();
        if let Some(session_id) = session_id {
            if let Err(err) = self.client.cancel(&session_id).await {
                tracing::warn!(session_id = %session_id, error = %err, "Cancel failed");
            }
        }
        self.update_session(|prev| {
            let mut next = prev.clone();
            if next.session_id.is_some() {
                next.state = SessionState::Ready;
            }
            next
        });
    }

    /// Optimistic mode switch: local state changes immediately and rolls
    /// back if the RPC fails. The protocol only echoes agent-initiated mode
    /// changes, so waiting for a confirmation would wait forever.
    pub async fn set_mode(&self, mode_id: acp::SessionModeId) -> Result<()> {
        let (session_id, previous) = {
            let session = self.session.lock();
            let session_id = session.session_id.clone().ok_or(CoreError::NoActiveSession)?;
            let previous = session
                .modes
                .as_ref()
                .map(|m| m.current_mode_id.clone())
                .ok_or(CoreError::CapabilityUnsupported("session modes"))?;
            (session_id, previous)
        };

        self.update_session(|prev| {
            let mut next = prev.clone();
            if let Some(modes) = next.modes.as_mut() {
                modes.current_mode_id = mode_id.clone();
            }
            next
        });

        match self.client.set_session_mode(&session_id, &mode_id).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.update_session(|prev| {
                    let mut next = prev.clone();
                    if let Some(modes) = next.modes.as_mut() {
                        modes.current_mode_id = previous.clone();
                    }
                    next
                });
                Err(CoreError::from_protocol(err))
            }
        }
    }

    /// Optimistic model switch with rollback; the chosen model is also
    /// persisted per agent so future sessions restore it.
    pub async fn set_model(&self, model_id: acp::ModelId) -> Result<()> {
        let (session_id, agent_id, previous) = {
            let session = self.session.lock();
            let session_id = session.session_id.clone().ok_or(CoreError::NoActiveSession)?;
            let previous = session
                .models
                .as_ref()
                .map(|m| m.current_model_id.clone())
                .ok_or(CoreError::CapabilityUnsupported("model selection"))?;
            (session_id, session.agent_id.clone(), previous)
        };

        self.update_session(|prev| {
            let mut next = prev.clone();
            if let Some(models) = next.models.as_mut() {
                models.current_model_id = model_id.clone();
            }
            next
        });

        match self.client.set_session_model(&session_id, &model_id).await {
            Ok(()) => {
                let update = SettingsUpdate {
                    preferred_model: Some((agent_id, model_id.to_string())),
                    ..Default::default()
                };
                if let Err(err) = self.settings.update_settings(update).await {
                    tracing::warn!(error = %err, "Failed to persist preferred model");
                }
                Ok(())
            }
            Err(err) => {
                self.update_session(|prev| {
                    let mut next = prev.clone();
                    if let Some(models) = next.models.as_mut() {
                        models.current_model_id = previous.clone();
                    }
                    next
                });
                Err(CoreError::from_protocol(err))
            }
        }
    }

    /// Passive setter driven by `available_commands_update` notifications.
    pub fn update_available_commands(&self, commands: Vec<acp::AvailableCommand>) {
        self.update_session(|prev| {
            let mut next = prev.clone();
            next.available_commands = Some(commands.clone());
            next
        });
    }

    /// Passive setter driven by `current_mode_update` notifications; a
    /// no-op when no modes are tracked.
    pub fn update_current_mode(&self, mode_id: acp::SessionModeId) {
        self.update_session(|prev| {
            let mut next = prev.clone();
            if let Some(modes) = next.modes.as_mut() {
                modes.current_mode_id = mode_id.clone();
            }
            next
        });
    }

    /// Adopts a session-identity response (new/load/resume/fork) and
    /// transitions to `ready`.
    pub fn adopt_session_response(&self, response: acp::NewSessionResponse) {
        let now = self.clock.now();
        self.update_session(|prev| {
            let mut next = prev.clone();
            next.session_id = Some(response.session_id.clone());
            next.modes = response.modes.clone();
            next.models = response.models.clone();
            next.state = SessionState::Ready;
            next.error = None;
            next.last_activity_at = now;
            next
        });
    }

    /// Bumps `last_activity_at`, e.g. when a prompt turn starts.
    pub fn touch_activity(&self) {
        let now = self.clock.now();
        self.update_session(|prev| {
            let mut next = prev.clone();
            next.last_activity_at = now;
            next
        });
    }

    fn resolve_agent_id(&self, override_agent_id: Option<&str>) -> Result<String> {
        if let Some(agent_id) = override_agent_id {
            return Ok(agent_id.to_string());
        }
        let snapshot = self.settings.snapshot();
        snapshot
            .default_agent_id
            .clone()
            .or_else(|| snapshot.agents.first().map(|a| a.id.clone()))
            .ok_or(CoreError::AgentNotFound {
                agent_id: "(default)".to_string(),
            })
    }

    fn agent_entry(&self, agent_id: &str) -> Result<AgentSettingsEntry> {
        self.settings
            .snapshot()
            .agent(agent_id)
            .cloned()
            .ok_or_else(|| CoreError::AgentNotFound {
                agent_id: agent_id.to_string(),
            })
    }

    fn build_agent_config(&self, agent_id: &str, entry: &AgentSettingsEntry) -> Result<AgentConfig> {
        let mut command = AgentCommand::new(entry.command.clone()).args(entry.args.clone());
        if let Some(api_key) = &entry.api_key {
            let env_name = entry
                .api_key_env
                .clone()
                .unwrap_or_else(|| provider_env_name(agent_id));
            command = command.env(env_name, api_key.clone());
        }
        let working_directory = self.session.lock().working_directory.clone();
        Ok(AgentConfig {
            agent_id: agent_id.to_string(),
            command,
            working_directory,
        })
    }

    /// Re-applies the last model the user chose for this agent, when it is
    /// still advertised. Failure is non-fatal: the agent default stands.
    async fn reapply_preferred_model(&self, agent_id: &str) {
        let preferred = self
            .settings
            .snapshot()
            .preferred_models
            .get(agent_id)
            .cloned();
        let Some(preferred) = preferred else {
            return;
        };

        let (session_id, known) = {
            let session = self.session.lock();
            let known = session
                .models
                .as_ref()
                .map(|m| {
                    m.available_models
                        .iter()
                        .any(|model| model.model_id.as_str() == preferred)
                })
                .unwrap_or(false);
            (session.session_id.clone(), known)
        };
        let (Some(session_id), true) = (session_id, known) else {
            return;
        };

        let model_id = acp::ModelId::from(preferred);
        match self.client.set_session_model(&session_id, &model_id).await {
            Ok(()) => {
                self.update_session(|prev| {
                    let mut next = prev.clone();
                    if let Some(models) = next.models.as_mut() {
                        models.current_model_id = model_id.clone();
                    }
                    next
                });
            }
            Err(err) => {
                tracing::debug!(
                    model_id = %model_id,
                    error = %err,
                    "Could not restore preferred model; using agent default"
                );
            }
        }
    }

    fn fail_session(&self, err: &CoreError) -> ChatSession {
        tracing::warn!(error = %err, "Session operation failed");
        let info = SessionErrorInfo::from(err);
        self.update_session(|prev| {
            let mut next = prev.clone();
            next.state = SessionState::Error;
            next.error = Some(info.clone());
            next
        });
        self.session()
    }
}

#[derive(Clone, Copy)]
enum RestoreKind {
    Load,
    Resume,
}

fn provider_env_name(agent_id: &str) -> String {
    let upper: String = agent_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{upper}_API_KEY")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_env_name_is_uppercased() {
        assert_eq!(provider_env_name("claude-code"), "CLAUDE_CODE_API_KEY");
    }

    #[test]
    fn fresh_session_has_no_advertisements() {
        let session =
            ChatSession::new_disconnected("a", "Agent A", PathBuf::from("."), Utc::now());
        assert!(session.available_commands.is_none());
        assert!(session.modes.is_none());
        assert!(session.models.is_none());
        assert!(!session.is_ready());
    }
}
