//! The prompt turn: send, classify the outcome, and recover when possible.
//!
//! Two failure shapes get special handling. The "empty response" internal
//! error some agents emit for a contentless turn is a soft success, not a
//! failure. An auth-required error is silently retried once after
//! authenticating, but only when the agent advertises exactly one auth
//! method; with several, picking one on the user's behalf would be a
//! guess, so the need for auth is surfaced instead.

use std::sync::Arc;

use crate::acp;
use crate::client::AgentClient;
use crate::error::{is_empty_response_error, CoreError, SessionErrorInfo};
use crate::session::AgentSessionManager;

/// Outcome of one prompt turn, already classified for the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct SendPromptResult {
    pub success: bool,
    /// The agent wants authentication and no silent retry was possible.
    pub requires_auth: bool,
    /// The turn failed on auth, authenticated, and succeeded on retry.
    pub retried_after_auth: bool,
    pub stop_reason: Option<acp::StopReason>,
    pub error: Option<SessionErrorInfo>,
}

impl SendPromptResult {
    fn success(stop_reason: Option<acp::StopReason>) -> Self {
        Self {
            success: true,
            requires_auth: false,
            retried_after_auth: false,
            stop_reason,
            error: None,
        }
    }

    fn failure(error: SessionErrorInfo) -> Self {
        Self {
            success: false,
            requires_auth: false,
            retried_after_auth: false,
            stop_reason: None,
            error: Some(error),
        }
    }

    fn requires_auth(error: SessionErrorInfo) -> Self {
        Self {
            requires_auth: true,
            ..Self::failure(error)
        }
    }
}

pub struct PromptSender {
    client: Arc<dyn AgentClient>,
}

impl PromptSender {
    pub fn new(client: Arc<dyn AgentClient>) -> Self {
        Self { client }
    }

    /// Sends one prompt on the live session.
    ///
    /// Never returns `Err`: every failure is folded into the result so the
    /// caller has exactly one settlement path for the turn.
    pub async fn send_prompt(
        &self,
        sessions: &AgentSessionManager,
        content: Vec<acp::ContentBlock>,
    ) -> SendPromptResult {
        let session = sessions.session();
        let Some(session_id) = session.session_id else {
            return SendPromptResult::failure(SessionErrorInfo::from(&CoreError::NoActiveSession));
        };
        sessions.touch_activity();

        match self.client.send_prompt(&session_id, content.clone()).await {
            Ok(response) => SendPromptResult::success(Some(response.stop_reason)),
            Err(err) if is_empty_response_error(&err) => {
                tracing::debug!(session_id = %session_id, "Empty response treated as success");
                SendPromptResult::success(None)
            }
            Err(err) if err.is_auth_required() => {
                self.recover_auth(&session_id, &session.auth_methods, content, err)
                    .await
            }
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "Prompt failed");
                SendPromptResult::failure(SessionErrorInfo::from(&CoreError::Protocol(err)))
            }
        }
    }

    async fn recover_auth(
        &self,
        session_id: &acp::SessionId,
        auth_methods: &[acp::AuthMethod],
        content: Vec<acp::ContentBlock>,
        err: acp::Error,
    ) -> SendPromptResult {
        let info = SessionErrorInfo::from(&CoreError::AuthRequired(err));
        let [method] = auth_methods else {
            return SendPromptResult::requires_auth(info);
        };

        tracing::debug!(method_id = %method.id, "Retrying prompt after authentication");
        match self.client.authenticate(&method.id).await {
            Ok(true) => {}
            Ok(false) => return SendPromptResult::requires_auth(info),
            Err(auth_err) => {
                tracing::warn!(error = %auth_err, "Authentication attempt failed");
                return SendPromptResult::requires_auth(info);
            }
        }

        match self.client.send_prompt(session_id, content).await {
            Ok(response) => SendPromptResult {
                retried_after_auth: true,
                ..SendPromptResult::success(Some(response.stop_reason))
            },
            Err(retry_err) if is_empty_response_error(&retry_err) => SendPromptResult {
                retried_after_auth: true,
                ..SendPromptResult::success(None)
            },
            Err(retry_err) if retry_err.is_auth_required() => {
                // Authentication "succeeded" but the agent still refuses;
                // do not loop, hand the problem to the user.
                SendPromptResult::requires_auth(info)
            }
            Err(retry_err) => {
                SendPromptResult::failure(SessionErrorInfo::from(&CoreError::Protocol(retry_err)))
            }
        }
    }
}
