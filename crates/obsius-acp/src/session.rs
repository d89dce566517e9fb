//! Session lifecycle payloads and the `session/update` notification union.
//!
//! Everything the agent pushes back during a turn arrives as a
//! [`SessionNotification`] whose `update` is one variant of
//! [`SessionUpdate`]. The union is matched exhaustively downstream so a new
//! update kind is a compile-time decision, not a silent no-op.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{
    AgentCapabilities, AgentInfo, AuthMethod, ContentBlock, ModelId, PermissionRequest, Plan,
    PromptCapabilities, SessionId, SessionModeId, ToolCall, ToolCallUpdate,
};

/// A notification scoped to one session.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionNotification {
    pub session_id: SessionId,
    pub update: SessionUpdate,
}

impl SessionNotification {
    pub fn new(session_id: impl Into<SessionId>, update: SessionUpdate) -> Self {
        Self {
            session_id: session_id.into(),
            update,
        }
    }
}

/// The tagged union of `session/update` variants.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "sessionUpdate", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SessionUpdate {
    /// The agent echoes a chunk of the user's message (history replay).
    UserMessageChunk { content: ContentBlock },
    /// A chunk of the assistant's streamed reply.
    AgentMessageChunk { content: ContentBlock },
    /// A chunk of the assistant's extended thinking.
    AgentThoughtChunk { content: ContentBlock },
    /// A new tool call was started.
    ToolCall(ToolCall),
    /// An existing tool call changed.
    ToolCallUpdate(ToolCallUpdate),
    /// The agent replaced its execution plan.
    Plan(Plan),
    /// The set of slash commands changed.
    AvailableCommandsUpdate {
        available_commands: Vec<AvailableCommand>,
    },
    /// The agent switched its own session mode.
    CurrentModeUpdate { current_mode_id: SessionModeId },
    /// A tool call needs authorization before it can run.
    PermissionRequest(PermissionRequest),
}

/// A slash command advertised by the agent.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailableCommand {
    pub name: String,
    pub description: String,
    /// Hint for the command's expected argument, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
}

/// An agent-defined operating mode.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionMode {
    #[serde(rename = "modeId")]
    pub id: SessionModeId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The mode state advertised for a session.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionModeState {
    pub current_mode_id: SessionModeId,
    pub available_modes: Vec<SessionMode>,
}

/// A language model advertised by the agent.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub model_id: ModelId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The model state advertised for a session.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionModelState {
    pub current_model_id: ModelId,
    pub available_models: Vec<ModelInfo>,
}

/// Result of the `initialize` handshake.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    #[serde(default)]
    pub auth_methods: Vec<AuthMethod>,
    #[serde(default)]
    pub prompt_capabilities: PromptCapabilities,
    #[serde(default)]
    pub agent_capabilities: AgentCapabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_info: Option<AgentInfo>,
}

/// Result of `session/new`, `session/load`, `session/resume`, and
/// `session/fork`. Conversation history is never returned here; `load`
/// replays it out-of-band as `session/update` notifications.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionResponse {
    pub session_id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modes: Option<SessionModeState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<SessionModelState>,
}

/// One page of `session/list`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Metadata for one stored session, as reported by the agent.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// RFC 3339 timestamp of the last activity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Result of `session/prompt`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptResponse {
    pub stop_reason: StopReason,
}

/// Why a prompt turn ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The turn ran to completion.
    EndTurn,
    /// The turn hit the model's token limit.
    MaxTokens,
    /// The turn exceeded the configured request budget.
    MaxTurnRequests,
    /// The client cancelled the turn.
    Cancelled,
    /// The agent refused to continue.
    Refusal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn session_update_uses_wire_discriminant() {
        let update = SessionUpdate::CurrentModeUpdate {
            current_mode_id: "plan".into(),
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["sessionUpdate"], "current_mode_update");
        assert_eq!(json["currentModeId"], "plan");
    }

    #[test]
    fn tool_call_update_round_trips_through_union() {
        let mut update = ToolCallUpdate::new("tc-9");
        update.fields.title = Some("Run tests".into());
        let notification =
            SessionNotification::new("sess-1", SessionUpdate::ToolCallUpdate(update.clone()));
        let json = serde_json::to_string(&notification).unwrap();
        let back: SessionNotification = serde_json::from_str(&json).unwrap();
        assert_eq!(back, notification);
    }

    #[test]
    fn new_session_response_omits_absent_state() {
        let response = NewSessionResponse {
            session_id: "sess-2".into(),
            modes: None,
            models: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("modes"));
        assert!(!json.contains("models"));
    }
}
