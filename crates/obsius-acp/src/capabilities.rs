//! Capability advertisements exchanged during initialization.
//!
//! The agent declares what it can do once per process handshake; clients
//! gate UI affordances and fall back to local behavior for anything the
//! agent does not support.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::AuthMethodId;

/// What kinds of prompt content the agent accepts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PromptCapabilities {
    /// Base64 image blocks are accepted.
    #[serde(default)]
    pub image: bool,
    /// Audio blocks are accepted.
    #[serde(default)]
    pub audio: bool,
    /// Structured `resource` blocks are accepted; otherwise context must be
    /// inlined as tagged text.
    #[serde(default)]
    pub embedded_context: bool,
}

/// Which session operations the agent supports.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    /// `session/load`: reopen a session with full history replay.
    #[serde(default)]
    pub load_session: bool,
    /// `session/list`: enumerate stored sessions.
    #[serde(default)]
    pub list_sessions: bool,
    /// `session/resume`: reattach without history replay.
    #[serde(default)]
    pub resume_session: bool,
    /// `session/fork`: branch a new session from an existing one.
    #[serde(default)]
    pub fork_session: bool,
}

impl AgentCapabilities {
    /// Whether any restoration path (load or resume) exists.
    pub fn can_restore(&self) -> bool {
        self.load_session || self.resume_session
    }
}

/// Identity of the agent binary behind the connection.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub name: String,
    pub version: String,
}

/// An authentication method the agent accepts.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthMethod {
    #[serde(rename = "methodId")]
    pub id: AuthMethodId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
