//! Chat message model: the ordered transcript the UI renders.
//!
//! Messages are append-or-mutate-in-place; a tool call lives inside the
//! assistant message that announced it and is patched by id on every
//! incremental update. Streamed text chunks append to the trailing text
//! content of the trailing message of the matching role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::acp;
use crate::context::ChatContextReference;

/// Who authored a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One message in the transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: Vec<MessageContent>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: Vec<MessageContent>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp,
        }
    }

    /// The concatenated plain text of this message, used for titles.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for content in &self.content {
            match content {
                MessageContent::Text { text } => out.push_str(text),
                MessageContent::TextWithContext { text, .. } => out.push_str(text),
                _ => {}
            }
        }
        out
    }
}

/// Content variants within a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text.
    Text { text: String },
    /// Text that carried an auto-mention; the original references are kept
    /// so the UI can render the attachment chips.
    TextWithContext {
        text: String,
        context: Vec<ChatContextReference>,
    },
    /// Extended-thinking text from the agent.
    AgentThought { text: String },
    /// A tool call and its streamed state.
    ToolCall(acp::ToolCall),
    /// A terminal the agent attached to this turn.
    Terminal { terminal_id: acp::TerminalId },
    /// The agent's current execution plan (replaced wholesale on update).
    Plan(acp::Plan),
    /// A permission request, kept in the transcript after resolution.
    PermissionRequest {
        request: acp::PermissionRequest,
        /// Set when the turn was cancelled before the user answered.
        cancelled: bool,
    },
    /// An attached image (base64).
    Image { data: String, mime_type: String },
}

/// Appends a streamed text chunk to the transcript.
///
/// Chunks merge into the trailing content of the trailing message when the
/// role matches; otherwise a new message is started.
pub fn append_chunk(
    messages: &mut Vec<ChatMessage>,
    role: ChatRole,
    chunk: MessageContent,
    now: DateTime<Utc>,
) {
    if let Some(last) = messages.last_mut() {
        if last.role == role {
            match (last.content.last_mut(), &chunk) {
                (
                    Some(MessageContent::Text { text }),
                    MessageContent::Text { text: incoming },
                ) => {
                    text.push_str(incoming);
                    return;
                }
                (
                    Some(MessageContent::AgentThought { text }),
                    MessageContent::AgentThought { text: incoming },
                ) => {
                    text.push_str(incoming);
                    return;
                }
                _ => {
                    last.content.push(chunk);
                    return;
                }
            }
        }
    }
    messages.push(ChatMessage::new(role, vec![chunk], now));
}

/// Inserts a newly announced tool call, or replaces a stale announcement
/// with the same id.
pub fn upsert_tool_call(
    messages: &mut Vec<ChatMessage>,
    tool_call: acp::ToolCall,
    now: DateTime<Utc>,
) {
    if let Some(existing) = find_tool_call_mut(messages, &tool_call.id) {
        *existing = tool_call;
        return;
    }
    let content = MessageContent::ToolCall(tool_call);
    if let Some(last) = messages.last_mut() {
        if last.role == ChatRole::Assistant {
            last.content.push(content);
            return;
        }
    }
    messages.push(ChatMessage::new(ChatRole::Assistant, vec![content], now));
}

/// Merges a partial update into the tool call it addresses.
///
/// Returns `false` when no tool call with that id exists (the update is
/// dropped; updates can outlive a replaced transcript).
pub fn apply_tool_call_update(messages: &mut [ChatMessage], update: acp::ToolCallUpdate) -> bool {
    match find_tool_call_mut(messages, &update.id) {
        Some(tool_call) => {
            tool_call.apply_update(update.fields);
            true
        }
        None => false,
    }
}

/// Replaces the current plan content, or attaches one to the transcript.
pub fn upsert_plan(messages: &mut Vec<ChatMessage>, plan: acp::Plan, now: DateTime<Utc>) {
    for message in messages.iter_mut().rev() {
        for content in message.content.iter_mut().rev() {
            if let MessageContent::Plan(existing) = content {
                *existing = plan;
                return;
            }
        }
    }
    let content = MessageContent::Plan(plan);
    if let Some(last) = messages.last_mut() {
        if last.role == ChatRole::Assistant {
            last.content.push(content);
            return;
        }
    }
    messages.push(ChatMessage::new(ChatRole::Assistant, vec![content], now));
}

/// Records a permission request in the transcript.
pub fn push_permission_request(
    messages: &mut Vec<ChatMessage>,
    request: acp::PermissionRequest,
    now: DateTime<Utc>,
) {
    let content = MessageContent::PermissionRequest {
        request,
        cancelled: false,
    };
    if let Some(last) = messages.last_mut() {
        if last.role == ChatRole::Assistant {
            last.content.push(content);
            return;
        }
    }
    messages.push(ChatMessage::new(ChatRole::Assistant, vec![content], now));
}

/// Marks every unresolved permission request as cancelled.
pub fn cancel_pending_permission_requests(messages: &mut [ChatMessage]) {
    for message in messages.iter_mut() {
        for content in message.content.iter_mut() {
            if let MessageContent::PermissionRequest { cancelled, .. } = content {
                *cancelled = true;
            }
        }
    }
}

fn find_tool_call_mut<'a>(
    messages: &'a mut [ChatMessage],
    id: &acp::ToolCallId,
) -> Option<&'a mut acp::ToolCall> {
    messages.iter_mut().rev().find_map(|message| {
        message.content.iter_mut().rev().find_map(|content| {
            if let MessageContent::ToolCall(tool_call) = content {
                if tool_call.id == *id {
                    return Some(tool_call);
                }
            }
            None
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-08-26T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn text(text: &str) -> MessageContent {
        MessageContent::Text { text: text.into() }
    }

    #[test]
    fn chunks_of_same_role_merge_into_one_message() {
        let mut messages = Vec::new();
        append_chunk(&mut messages, ChatRole::Assistant, text("Hel"), now());
        append_chunk(&mut messages, ChatRole::Assistant, text("lo"), now());

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].plain_text(), "Hello");
    }

    #[test]
    fn role_change_starts_a_new_message() {
        let mut messages = Vec::new();
        append_chunk(&mut messages, ChatRole::User, text("question"), now());
        append_chunk(&mut messages, ChatRole::Assistant, text("answer"), now());
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn thought_chunks_do_not_merge_into_text() {
        let mut messages = Vec::new();
        append_chunk(&mut messages, ChatRole::Assistant, text("visible"), now());
        append_chunk(
            &mut messages,
            ChatRole::Assistant,
            MessageContent::AgentThought {
                text: "hidden".into(),
            },
            now(),
        );
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content.len(), 2);
    }

    #[test]
    fn tool_call_updates_merge_disjoint_fields_in_any_order() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        let call = acp::ToolCall::new("tc-1", "Edit");
        upsert_tool_call(&mut a, call.clone(), now());
        upsert_tool_call(&mut b, call, now());

        let status_update = acp::ToolCallUpdate {
            id: "tc-1".into(),
            fields: acp::ToolCallUpdateFields {
                status: Some(acp::ToolCallStatus::InProgress),
                ..Default::default()
            },
        };
        let content_update = acp::ToolCallUpdate {
            id: "tc-1".into(),
            fields: acp::ToolCallUpdateFields {
                content: Some(vec![acp::ToolCallContent::Content {
                    content: acp::ContentBlock::text("c1"),
                }]),
                ..Default::default()
            },
        };

        assert!(apply_tool_call_update(&mut a, status_update.clone()));
        assert!(apply_tool_call_update(&mut a, content_update.clone()));
        assert!(apply_tool_call_update(&mut b, content_update));
        assert!(apply_tool_call_update(&mut b, status_update));

        assert_eq!(a, b);
    }

    #[test]
    fn update_for_unknown_tool_call_is_dropped() {
        let mut messages = Vec::new();
        let dropped = apply_tool_call_update(
            &mut messages,
            acp::ToolCallUpdate::new("tc-missing"),
        );
        assert!(!dropped);
    }

    #[test]
    fn plan_updates_replace_the_previous_plan() {
        let mut messages = Vec::new();
        let first = acp::Plan {
            entries: vec![acp::PlanEntry {
                content: "step one".into(),
                priority: acp::PlanEntryPriority::High,
                status: acp::PlanEntryStatus::Pending,
            }],
        };
        let second = acp::Plan {
            entries: vec![acp::PlanEntry {
                content: "step one".into(),
                priority: acp::PlanEntryPriority::High,
                status: acp::PlanEntryStatus::Completed,
            }],
        };
        upsert_plan(&mut messages, first, now());
        upsert_plan(&mut messages, second.clone(), now());

        let plans: Vec<_> = messages
            .iter()
            .flat_map(|m| &m.content)
            .filter_map(|c| match c {
                MessageContent::Plan(plan) => Some(plan),
                _ => None,
            })
            .collect();
        assert_eq!(plans, vec![&second]);
    }

    #[test]
    fn cancel_marks_permission_requests() {
        let mut messages = Vec::new();
        let request = acp::PermissionRequest {
            id: "perm-1".into(),
            tool_call: acp::ToolCallUpdate::new("tc-1"),
            options: Vec::new(),
        };
        push_permission_request(&mut messages, request, now());
        cancel_pending_permission_requests(&mut messages);

        assert!(matches!(
            messages[0].content[0],
            MessageContent::PermissionRequest {
                cancelled: true,
                ..
            }
        ));
    }
}
