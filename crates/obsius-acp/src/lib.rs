//! Agent Client Protocol (ACP) data contracts for Obsius.
//!
//! ACP is a JSON-RPC based protocol between editors and coding agents.
//! This crate owns the shapes that cross that boundary: session updates,
//! content blocks, tool calls, plans, permission requests, capability
//! advertisements, and the JSON-RPC error object with the ACP-specific
//! error codes. It performs no I/O; the transport that moves these shapes
//! over a wire lives behind the `AgentClient` trait in `obsius-core`.
//!
//! Field casing follows the protocol: struct fields serialize as
//! `camelCase`, enum discriminants as `snake_case`.

mod capabilities;
mod content;
mod error;
mod permission;
mod plan;
mod session;
mod tool_call;

pub use capabilities::*;
pub use content::*;
pub use error::*;
pub use permission::*;
pub use plan::*;
pub use session::*;
pub use tool_call::*;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

macro_rules! protocol_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
        #[serde(transparent)]
        pub struct $name(pub Arc<str>);

        impl $name {
            pub fn new(id: impl Into<Arc<str>>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(Arc::from(id))
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(Arc::from(id))
            }
        }
    };
}

protocol_id!(
    /// Identifier for a conversation session between a client and an agent.
    ///
    /// Sessions maintain their own context, history, and state; the id is
    /// issued by the agent when the session is created or loaded.
    SessionId
);

protocol_id!(
    /// Identifier for a tool call reported by the agent.
    ///
    /// Incremental `tool_call_update` notifications address an existing tool
    /// call by this id.
    ToolCallId
);

protocol_id!(
    /// Identifier for an agent-defined session mode (e.g. plan vs. execute).
    SessionModeId
);

protocol_id!(
    /// Identifier for a language model advertised by the agent.
    ModelId
);

protocol_id!(
    /// Identifier for an authentication method advertised by the agent.
    AuthMethodId
);

protocol_id!(
    /// Identifier for one option of a permission request.
    PermissionOptionId
);

protocol_id!(
    /// Identifier for a terminal the agent is running a command in.
    TerminalId
);

protocol_id!(
    /// Identifier for a pending permission request.
    PermissionRequestId
);
