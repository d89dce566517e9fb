//! Tool calls and their incremental updates.
//!
//! Agents report actions (file edits, shell commands, searches) as tool
//! calls with a lifecycle of `pending -> in_progress -> completed | failed`.
//! A `tool_call` update announces a new call; subsequent `tool_call_update`
//! notifications carry [`ToolCallUpdateFields`] where every field is
//! optional: `None` means "unchanged", and a present `content` array
//! replaces the previous one wholesale. Clients must merge, never
//! overwrite.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{TerminalId, ToolCallId};

/// A tool call reported by the agent.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    #[serde(rename = "toolCallId")]
    pub id: ToolCallId,
    pub title: String,
    #[serde(default)]
    pub kind: ToolKind,
    #[serde(default)]
    pub status: ToolCallStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<ToolCallLocation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<ToolCallContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_input: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<serde_json::Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<ToolCallId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind: ToolKind::default(),
            status: ToolCallStatus::default(),
            locations: Vec::new(),
            content: Vec::new(),
            raw_input: None,
            raw_output: None,
        }
    }

    /// Merges a partial update into this tool call.
    ///
    /// Absent fields leave the current value untouched; a present `content`
    /// array is a full replacement.
    pub fn apply_update(&mut self, fields: ToolCallUpdateFields) {
        if let Some(title) = fields.title {
            self.title = title;
        }
        if let Some(kind) = fields.kind {
            self.kind = kind;
        }
        if let Some(status) = fields.status {
            self.status = status;
        }
        if let Some(locations) = fields.locations {
            self.locations = locations;
        }
        if let Some(content) = fields.content {
            self.content = content;
        }
        if let Some(raw_input) = fields.raw_input {
            self.raw_input = Some(raw_input);
        }
        if let Some(raw_output) = fields.raw_output {
            self.raw_output = Some(raw_output);
        }
    }
}

/// Partial update addressed to an existing tool call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallUpdate {
    #[serde(rename = "toolCallId")]
    pub id: ToolCallId,
    #[serde(flatten)]
    pub fields: ToolCallUpdateFields,
}

impl ToolCallUpdate {
    pub fn new(id: impl Into<ToolCallId>) -> Self {
        Self {
            id: id.into(),
            fields: ToolCallUpdateFields::default(),
        }
    }
}

/// The updatable fields of a tool call; all optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallUpdateFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ToolKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ToolCallStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<ToolCallLocation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ToolCallContent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_input: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<serde_json::Value>,
}

/// Category of tool call, used by clients to pick an icon.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Read,
    Edit,
    Delete,
    Move,
    Search,
    Execute,
    Think,
    Fetch,
    #[default]
    Other,
}

/// Lifecycle status of a tool call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    /// Announced but not yet started (may be waiting on permission).
    #[default]
    Pending,
    /// Currently running.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

/// A file location a tool call touches.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallLocation {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// Content produced by a tool call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolCallContent {
    /// Nested regular content (text, image).
    Content { content: crate::ContentBlock },
    /// A proposed or applied file modification.
    Diff(Diff),
    /// Output is streaming into a terminal.
    Terminal { terminal_id: TerminalId },
}

/// A file modification reported by a tool call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Diff {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_text: Option<String>,
    pub new_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn apply_update_ignores_absent_fields() {
        let mut call = ToolCall::new("tc-1", "Edit main.rs");
        call.apply_update(ToolCallUpdateFields {
            status: Some(ToolCallStatus::InProgress),
            ..Default::default()
        });
        call.apply_update(ToolCallUpdateFields {
            content: Some(vec![ToolCallContent::Content {
                content: crate::ContentBlock::text("done"),
            }]),
            ..Default::default()
        });

        assert_eq!(call.status, ToolCallStatus::InProgress);
        assert_eq!(call.title, "Edit main.rs");
        assert_eq!(call.content.len(), 1);
    }

    #[test]
    fn content_replacement_is_not_an_append() {
        let mut call = ToolCall::new("tc-2", "Search");
        call.apply_update(ToolCallUpdateFields {
            content: Some(vec![
                ToolCallContent::Content {
                    content: crate::ContentBlock::text("a"),
                },
                ToolCallContent::Content {
                    content: crate::ContentBlock::text("b"),
                },
            ]),
            ..Default::default()
        });
        call.apply_update(ToolCallUpdateFields {
            content: Some(vec![ToolCallContent::Content {
                content: crate::ContentBlock::text("final"),
            }]),
            ..Default::default()
        });
        assert_eq!(call.content.len(), 1);
    }

    #[test]
    fn update_fields_flatten_next_to_id() {
        let update = ToolCallUpdate {
            id: "tc-3".into(),
            fields: ToolCallUpdateFields {
                status: Some(ToolCallStatus::Completed),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["toolCallId"], "tc-3");
        assert_eq!(json["status"], "completed");
    }
}
