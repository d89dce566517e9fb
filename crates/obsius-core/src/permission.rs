//! Pending permission requests and their resolution.
//!
//! At most one request is active at a time; the agent blocks its turn on
//! the answer. Resolving an already-resolved (or never-seen) request is a
//! no-op that reports `false`, so a late UI click after a cancel cannot
//! double-answer.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::acp;
use crate::client::AgentClient;
use crate::error::{CoreError, Result};

pub struct PermissionCoordinator {
    client: Arc<dyn AgentClient>,
    active: Mutex<Option<acp::PermissionRequest>>,
}

impl PermissionCoordinator {
    pub fn new(client: Arc<dyn AgentClient>) -> Self {
        Self {
            client,
            active: Mutex::new(None),
        }
    }

    /// Registers an inbound request as the active one.
    pub fn begin(&self, request: acp::PermissionRequest) {
        let mut active = self.active.lock();
        if let Some(previous) = active.replace(request) {
            tracing::warn!(
                request_id = %previous.id,
                "New permission request superseded an unanswered one"
            );
        }
    }

    /// The request currently awaiting an answer.
    pub fn active(&self) -> Option<acp::PermissionRequest> {
        self.active.lock().clone()
    }

    /// Answers the active request with the chosen option.
    ///
    /// Returns `Ok(false)` when no request is active.
    pub async fn approve(&self, option_id: acp::PermissionOptionId) -> Result<bool> {
        let Some(request) = self.active.lock().take() else {
            return Ok(false);
        };
        self.client
            .resolve_permission(
                &request.id,
                acp::RequestPermissionOutcome::Selected { option_id },
            )
            .await
            .map_err(CoreError::from_protocol)?;
        Ok(true)
    }

    /// Rejects the active request without selecting an option.
    pub async fn reject(&self) -> Result<bool> {
        let Some(request) = self.active.lock().take() else {
            return Ok(false);
        };
        self.client
            .resolve_permission(&request.id, acp::RequestPermissionOutcome::Cancelled)
            .await
            .map_err(CoreError::from_protocol)?;
        Ok(true)
    }

    /// Drops the active request without answering the agent. Used when the
    /// whole turn is cancelled; `session/cancel` unblocks the agent side.
    pub fn clear(&self) {
        self.active.lock().take();
    }
}
