//! Shared test doubles: a scriptable agent client, an in-memory settings
//! store, and a fixed vault.

// Not every test binary uses every double.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use obsius_core::acp;
use obsius_core::{
    ActiveNoteContext, AgentClient, AgentConfig, ChatMessage, NoteMetadata, ObsiusSettings,
    SavedSessionInfo, SettingsStore, SettingsUpdate, VaultAccess,
};

pub fn initialize_response() -> acp::InitializeResponse {
    acp::InitializeResponse {
        auth_methods: Vec::new(),
        prompt_capabilities: acp::PromptCapabilities {
            image: true,
            audio: false,
            embedded_context: true,
        },
        agent_capabilities: acp::AgentCapabilities {
            load_session: true,
            list_sessions: true,
            resume_session: true,
            fork_session: true,
        },
        agent_info: Some(acp::AgentInfo {
            name: "mock-agent".into(),
            version: "1.0.0".into(),
        }),
    }
}

pub fn session_response(session_id: &str) -> acp::NewSessionResponse {
    acp::NewSessionResponse {
        session_id: session_id.into(),
        modes: None,
        models: None,
    }
}

#[derive(Default)]
pub struct MockState {
    pub initialized: bool,
    pub agent_id: Option<String>,
    pub next_session: u32,
    /// Handed out on `initialize`; tests override for capability gating.
    pub initialize_response: Option<acp::InitializeResponse>,
    pub initialize_failure: Option<acp::Error>,
    /// Modes/models attached to every session-identity response.
    pub modes: Option<acp::SessionModeState>,
    pub models: Option<acp::SessionModelState>,
    /// Errors popped in order before `send_prompt` succeeds.
    pub prompt_failures: VecDeque<acp::Error>,
    pub auth_succeeds: bool,
    pub new_session_failure: Option<acp::Error>,
    pub cancel_failure: Option<acp::Error>,
    pub set_mode_failure: Option<acp::Error>,
    pub set_model_failure: Option<acp::Error>,
    pub list_pages: VecDeque<acp::ListSessionsResponse>,
    pub resolved_permissions: Vec<(String, acp::RequestPermissionOutcome)>,
}

/// A scriptable in-process stand-in for the stdio transport.
#[derive(Default)]
pub struct MockAgentClient {
    pub calls: Mutex<Vec<String>>,
    pub state: Mutex<MockState>,
}

impl MockAgentClient {
    pub fn new() -> Self {
        let client = Self::default();
        client.state.lock().auth_succeeds = true;
        client
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.starts_with(name))
            .count()
    }

    fn log(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    fn issue_session(&self, prefix: &str) -> acp::NewSessionResponse {
        let mut state = self.state.lock();
        state.next_session += 1;
        let mut response = session_response(&format!("{prefix}-{}", state.next_session));
        response.modes = state.modes.clone();
        response.models = state.models.clone();
        response
    }
}

#[async_trait]
impl AgentClient for MockAgentClient {
    async fn initialize(&self, config: AgentConfig) -> acp::Result<acp::InitializeResponse> {
        self.log(format!("initialize:{}", config.agent_id));
        let mut state = self.state.lock();
        if let Some(err) = state.initialize_failure.take() {
            return Err(err);
        }
        state.initialized = true;
        state.agent_id = Some(config.agent_id);
        Ok(state
            .initialize_response
            .clone()
            .unwrap_or_else(initialize_response))
    }

    async fn new_session(&self, _cwd: &Path) -> acp::Result<acp::NewSessionResponse> {
        self.log("new_session");
        if let Some(err) = self.state.lock().new_session_failure.take() {
            return Err(err);
        }
        Ok(self.issue_session("sess"))
    }

    async fn load_session(
        &self,
        session_id: &acp::SessionId,
        _cwd: &Path,
    ) -> acp::Result<acp::NewSessionResponse> {
        self.log(format!("load_session:{session_id}"));
        let state = self.state.lock();
        let mut response = session_response(session_id.as_str());
        response.modes = state.modes.clone();
        response.models = state.models.clone();
        Ok(response)
    }

    async fn resume_session(
        &self,
        session_id: &acp::SessionId,
        _cwd: &Path,
    ) -> acp::Result<acp::NewSessionResponse> {
        self.log(format!("resume_session:{session_id}"));
        Ok(session_response(session_id.as_str()))
    }

    async fn fork_session(
        &self,
        session_id: &acp::SessionId,
        _cwd: &Path,
    ) -> acp::Result<acp::NewSessionResponse> {
        self.log(format!("fork_session:{session_id}"));
        Ok(self.issue_session("fork"))
    }

    async fn list_sessions(
        &self,
        _cwd: Option<&Path>,
        cursor: Option<&str>,
    ) -> acp::Result<acp::ListSessionsResponse> {
        self.log(format!("list_sessions:{}", cursor.unwrap_or("-")));
        Ok(self
            .state
            .lock()
            .list_pages
            .pop_front()
            .unwrap_or(acp::ListSessionsResponse {
                sessions: Vec::new(),
                next_cursor: None,
            }))
    }

    async fn send_prompt(
        &self,
        session_id: &acp::SessionId,
        _content: Vec<acp::ContentBlock>,
    ) -> acp::Result<acp::PromptResponse> {
        self.log(format!("send_prompt:{session_id}"));
        if let Some(err) = self.state.lock().prompt_failures.pop_front() {
            return Err(err);
        }
        Ok(acp::PromptResponse {
            stop_reason: acp::StopReason::EndTurn,
        })
    }

    async fn cancel(&self, session_id: &acp::SessionId) -> acp::Result<()> {
        self.log(format!("cancel:{session_id}"));
        match self.state.lock().cancel_failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn set_session_mode(
        &self,
        _session_id: &acp::SessionId,
        mode_id: &acp::SessionModeId,
    ) -> acp::Result<()> {
        self.log(format!("set_session_mode:{mode_id}"));
        match self.state.lock().set_mode_failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn set_session_model(
        &self,
        _session_id: &acp::SessionId,
        model_id: &acp::ModelId,
    ) -> acp::Result<()> {
        self.log(format!("set_session_model:{model_id}"));
        match self.state.lock().set_model_failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn authenticate(&self, method_id: &acp::AuthMethodId) -> acp::Result<bool> {
        self.log(format!("authenticate:{method_id}"));
        Ok(self.state.lock().auth_succeeds)
    }

    async fn resolve_permission(
        &self,
        request_id: &acp::PermissionRequestId,
        outcome: acp::RequestPermissionOutcome,
    ) -> acp::Result<()> {
        self.log(format!("resolve_permission:{request_id}"));
        self.state
            .lock()
            .resolved_permissions
            .push((request_id.to_string(), outcome));
        Ok(())
    }

    async fn disconnect(&self) -> acp::Result<()> {
        self.log("disconnect");
        let mut state = self.state.lock();
        state.initialized = false;
        state.agent_id = None;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    fn current_agent_id(&self) -> Option<String> {
        self.state.lock().agent_id.clone()
    }
}

/// In-memory `SettingsStore`.
pub struct MemorySettingsStore {
    pub settings: Mutex<ObsiusSettings>,
    pub sessions: Mutex<Vec<SavedSessionInfo>>,
    pub transcripts: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl MemorySettingsStore {
    pub fn new(settings: ObsiusSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
            sessions: Mutex::new(Vec::new()),
            transcripts: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_agent(agent_id: &str) -> Self {
        let settings = ObsiusSettings {
            agents: vec![obsius_core::AgentSettingsEntry {
                id: agent_id.to_string(),
                display_name: agent_id.to_string(),
                command: PathBuf::from(format!("/usr/local/bin/{agent_id}")),
                args: Vec::new(),
                api_key: None,
                api_key_env: None,
            }],
            default_agent_id: Some(agent_id.to_string()),
            working_directory: Some(PathBuf::from("/vault")),
            preferred_models: HashMap::new(),
        };
        Self::new(settings)
    }

    pub fn saved_titles(&self) -> Vec<(String, String)> {
        self.sessions
            .lock()
            .iter()
            .map(|info| (info.session_id.clone(), info.title.clone()))
            .collect()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    fn snapshot(&self) -> ObsiusSettings {
        self.settings.lock().clone()
    }

    async fn update_settings(&self, update: SettingsUpdate) -> Result<(), String> {
        let mut settings = self.settings.lock();
        if let Some(agent_id) = update.default_agent_id {
            settings.default_agent_id = Some(agent_id);
        }
        if let Some((agent_id, model_id)) = update.preferred_model {
            settings.preferred_models.insert(agent_id, model_id);
        }
        Ok(())
    }

    async fn save_session(&self, info: SavedSessionInfo) -> Result<(), String> {
        let mut sessions = self.sessions.lock();
        match sessions.iter_mut().find(|s| s.session_id == info.session_id) {
            Some(existing) => *existing = info,
            None => sessions.push(info),
        }
        Ok(())
    }

    async fn save_session_messages(
        &self,
        session_id: &str,
        messages: &[ChatMessage],
    ) -> Result<(), String> {
        self.transcripts
            .lock()
            .insert(session_id.to_string(), messages.to_vec());
        Ok(())
    }

    async fn load_session_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, String> {
        Ok(self
            .transcripts
            .lock()
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn saved_sessions(
        &self,
        agent_id: Option<&str>,
        cwd: Option<&Path>,
    ) -> Vec<SavedSessionInfo> {
        self.sessions
            .lock()
            .iter()
            .filter(|info| agent_id.map_or(true, |id| info.agent_id == id))
            .filter(|info| {
                cwd.map_or(true, |cwd| {
                    info.cwd.as_deref().map_or(true, |saved| saved == cwd)
                })
            })
            .cloned()
            .collect()
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), String> {
        self.sessions.lock().retain(|s| s.session_id != session_id);
        self.transcripts.lock().remove(session_id);
        Ok(())
    }
}

/// A vault with fixed note contents and an optional active note.
#[derive(Default)]
pub struct StaticVault {
    pub notes: Mutex<HashMap<String, String>>,
    pub active: Mutex<Option<ActiveNoteContext>>,
}

impl StaticVault {
    pub fn with_notes<const N: usize>(notes: [(&str, &str); N]) -> Self {
        let vault = Self::default();
        {
            let mut map = vault.notes.lock();
            for (path, text) in notes {
                map.insert(path.to_string(), text.to_string());
            }
        }
        vault
    }
}

#[async_trait]
impl VaultAccess for StaticVault {
    async fn read_note(&self, path: &str) -> Result<String, String> {
        self.notes
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| format!("no such note: {path}"))
    }

    async fn search_notes(&self, query: &str) -> Vec<NoteMetadata> {
        let mut matches: Vec<NoteMetadata> = self
            .notes
            .lock()
            .keys()
            .filter(|path| path.to_lowercase().contains(&query.to_lowercase()))
            .map(|path| NoteMetadata {
                path: path.clone(),
                name: path.trim_end_matches(".md").to_string(),
            })
            .collect();
        matches.sort_by(|a, b| a.path.cmp(&b.path));
        matches
    }

    fn active_context(&self) -> Option<ActiveNoteContext> {
        self.active.lock().clone()
    }
}
