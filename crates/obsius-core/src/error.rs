//! Error taxonomy for the orchestration core.
//!
//! Configuration errors (unknown agent id) are fatal to the operation and
//! carry a suggestion; protocol errors surface as session `error` state;
//! auth-required errors are distinguishable so the sender can retry or
//! surface an auth flow; the "empty response" quirk is a soft success and
//! never becomes an error at all.

use thiserror::Error;

use crate::acp;

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

/// Errors produced by the orchestration core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The requested agent id has no entry in settings.
    #[error("agent '{agent_id}' not found in settings")]
    AgentNotFound { agent_id: String },

    /// The transport returned a JSON-RPC error.
    #[error("protocol error: {0}")]
    Protocol(#[from] acp::Error),

    /// The agent demands authentication before the operation can proceed.
    #[error("authentication required")]
    AuthRequired(acp::Error),

    /// The agent does not advertise the capability this operation needs.
    #[error("agent does not support {0}")]
    CapabilityUnsupported(&'static str),

    /// An operation that needs a live session was invoked without one.
    #[error("no active session")]
    NoActiveSession,

    /// Pagination was requested before any session list was fetched.
    #[error("no session list has been fetched")]
    NoSessionList,

    /// A failure outside the protocol: process spawn, persistence, vault.
    #[error("{0}")]
    Host(String),
}

impl CoreError {
    /// Classifies a transport error, splitting out the auth-required code.
    pub fn from_protocol(err: acp::Error) -> Self {
        if err.is_auth_required() {
            CoreError::AuthRequired(err)
        } else {
            CoreError::Protocol(err)
        }
    }
}

/// Marker some agents use to signal an empty-but-successful turn.
///
/// Treated as a soft success by the sender rather than a failure.
pub fn is_empty_response_error(err: &acp::Error) -> bool {
    err.code == acp::ErrorCode::INTERNAL_ERROR.code
        && err.message.to_lowercase().contains("empty response")
}

/// A user-displayable rendering of a fatal failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionErrorInfo {
    pub title: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl SessionErrorInfo {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl From<&CoreError> for SessionErrorInfo {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::AgentNotFound { agent_id } => SessionErrorInfo::new(
                "Agent not configured",
                format!("No agent with id '{agent_id}' exists in the plugin settings."),
            )
            .with_suggestion("Check the agent list in the Obsius settings tab."),
            CoreError::AuthRequired(inner) => {
                SessionErrorInfo::new("Authentication required", inner.to_string())
                    .with_suggestion("Authenticate with the agent and try again.")
            }
            CoreError::Protocol(inner) => {
                SessionErrorInfo::new("Agent error", inner.to_string())
            }
            CoreError::CapabilityUnsupported(what) => SessionErrorInfo::new(
                "Unsupported operation",
                format!("The connected agent does not support {what}."),
            ),
            CoreError::NoActiveSession => {
                SessionErrorInfo::new("No active session", "Start a new chat first.")
            }
            CoreError::NoSessionList => SessionErrorInfo::new(
                "No session list",
                "Fetch the session list before paging through it.",
            ),
            CoreError::Host(message) => SessionErrorInfo::new("Plugin error", message.clone()),
        }
    }
}
