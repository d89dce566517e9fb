//! The transport seam: everything the core asks of the wire.
//!
//! A concrete implementation spawns the agent subprocess and speaks
//! JSON-RPC over stdio; the core only sees this trait. Notifications are
//! not part of the trait: the host hands the orchestrator an mpsc receiver
//! of [`acp::SessionNotification`]s and the orchestrator pumps it.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::acp;

/// Command line for spawning an agent subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCommand {
    pub path: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl AgentCommand {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Everything needed to initialize (or re-initialize) an agent process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Stable id of the agent entry in settings.
    pub agent_id: String,
    pub command: AgentCommand,
    pub working_directory: PathBuf,
}

/// RPC surface of the agent connection.
///
/// Methods that change session identity return [`acp::NewSessionResponse`];
/// history is never in the response, `load_session` replays it out-of-band.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Spawn/handshake the agent process. Idempotent per agent id: callers
    /// gate on [`AgentClient::is_initialized`] and
    /// [`AgentClient::current_agent_id`].
    async fn initialize(&self, config: AgentConfig) -> acp::Result<acp::InitializeResponse>;

    async fn new_session(&self, cwd: &Path) -> acp::Result<acp::NewSessionResponse>;

    async fn load_session(
        &self,
        session_id: &acp::SessionId,
        cwd: &Path,
    ) -> acp::Result<acp::NewSessionResponse>;

    async fn resume_session(
        &self,
        session_id: &acp::SessionId,
        cwd: &Path,
    ) -> acp::Result<acp::NewSessionResponse>;

    async fn fork_session(
        &self,
        session_id: &acp::SessionId,
        cwd: &Path,
    ) -> acp::Result<acp::NewSessionResponse>;

    async fn list_sessions(
        &self,
        cwd: Option<&Path>,
        cursor: Option<&str>,
    ) -> acp::Result<acp::ListSessionsResponse>;

    async fn send_prompt(
        &self,
        session_id: &acp::SessionId,
        content: Vec<acp::ContentBlock>,
    ) -> acp::Result<acp::PromptResponse>;

    async fn cancel(&self, session_id: &acp::SessionId) -> acp::Result<()>;

    async fn set_session_mode(
        &self,
        session_id: &acp::SessionId,
        mode_id: &acp::SessionModeId,
    ) -> acp::Result<()>;

    async fn set_session_model(
        &self,
        session_id: &acp::SessionId,
        model_id: &acp::ModelId,
    ) -> acp::Result<()>;

    /// Returns `true` when the agent reports successful authentication.
    async fn authenticate(&self, method_id: &acp::AuthMethodId) -> acp::Result<bool>;

    /// Answer a pending permission request.
    async fn resolve_permission(
        &self,
        request_id: &acp::PermissionRequestId,
        outcome: acp::RequestPermissionOutcome,
    ) -> acp::Result<()>;

    /// Tear down the agent process.
    async fn disconnect(&self) -> acp::Result<()>;

    fn is_initialized(&self) -> bool;

    /// The agent id the live process was initialized with, if any.
    fn current_agent_id(&self) -> Option<String>;
}
