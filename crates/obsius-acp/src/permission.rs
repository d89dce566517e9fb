//! Permission requests for gated tool calls.
//!
//! Before running a sensitive tool call the agent asks the client to choose
//! among a set of options (allow once, always, reject...). The outcome is
//! either one selected option or a cancellation of the whole request.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{PermissionOptionId, PermissionRequestId, ToolCallUpdate};

/// A request to authorize a tool call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    #[serde(rename = "requestId")]
    pub id: PermissionRequestId,
    /// The tool call awaiting authorization.
    pub tool_call: ToolCallUpdate,
    pub options: Vec<PermissionOption>,
}

/// One selectable answer to a permission request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionOption {
    #[serde(rename = "optionId")]
    pub id: PermissionOptionId,
    pub name: String,
    pub kind: PermissionOptionKind,
}

impl PermissionOption {
    pub fn new(
        id: impl Into<PermissionOptionId>,
        name: impl Into<String>,
        kind: PermissionOptionKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
        }
    }
}

/// Semantics of a permission option.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOptionKind {
    AllowOnce,
    AllowAlways,
    RejectOnce,
    RejectAlways,
}

/// Resolution of a permission request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequestPermissionOutcome {
    /// The user picked one of the offered options.
    Selected {
        #[serde(rename = "optionId")]
        option_id: PermissionOptionId,
    },
    /// The turn was cancelled before the user answered.
    Cancelled,
}
