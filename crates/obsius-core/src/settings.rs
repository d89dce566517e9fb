//! Persistent settings and local session storage.
//!
//! The host owns the bytes on disk; the core reads snapshots and writes
//! through the trait. Local session records are the fallback when the
//! agent cannot list or restore sessions itself, and local titles always
//! win over server titles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::message::ChatMessage;

/// One configured agent backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentSettingsEntry {
    pub id: String,
    pub display_name: String,
    /// Executable and arguments used to spawn the agent.
    pub command: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    /// Provider API key injected into the agent's environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable name the key is delivered under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

/// Plugin settings snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ObsiusSettings {
    pub agents: Vec<AgentSettingsEntry>,
    /// Agent used when no override is given.
    #[serde(default)]
    pub default_agent_id: Option<String>,
    /// Working directory for new sessions.
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    /// Last model the user chose, per agent id.
    #[serde(default)]
    pub preferred_models: std::collections::HashMap<String, String>,
}

impl ObsiusSettings {
    pub fn agent(&self, agent_id: &str) -> Option<&AgentSettingsEntry> {
        self.agents.iter().find(|a| a.id == agent_id)
    }
}

/// Locally persisted metadata for one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedSessionInfo {
    pub session_id: String,
    pub agent_id: String,
    pub title: String,
    pub cwd: Option<PathBuf>,
    pub updated_at: DateTime<Utc>,
}

/// Partial settings update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub default_agent_id: Option<String>,
    pub preferred_model: Option<(String, String)>,
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    fn snapshot(&self) -> ObsiusSettings;

    async fn update_settings(&self, update: SettingsUpdate) -> Result<(), String>;

    /// Create or overwrite a local session record.
    async fn save_session(&self, info: SavedSessionInfo) -> Result<(), String>;

    /// Persist the full message transcript for a session.
    async fn save_session_messages(
        &self,
        session_id: &str,
        messages: &[ChatMessage],
    ) -> Result<(), String>;

    /// Load the locally cached transcript, empty when none exists.
    async fn load_session_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, String>;

    /// Locally known sessions, optionally filtered by agent and cwd.
    async fn saved_sessions(
        &self,
        agent_id: Option<&str>,
        cwd: Option<&std::path::Path>,
    ) -> Vec<SavedSessionInfo>;

    /// Remove a session's metadata and transcript.
    async fn delete_session(&self, session_id: &str) -> Result<(), String>;
}
