//! Live message stream and session-update routing.
//!
//! The controller owns `messages[]` and `is_sending` as the single feed
//! the UI consumes. All inbound `session/update` notifications pass
//! through [`ChatController::route_update`], which enforces two rules:
//!
//! - **Session scoping**: updates tagged with a stale session id are
//!   dropped; this is the backstop against a slow notification arriving
//!   after the session has been replaced.
//! - **Replay suppression**: while a `session/load` is replaying history,
//!   message notifications are not applied (the bulk local restore is used
//!   instead), but capability updates still are; they reflect live agent
//!   state independent of history.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::acp;
use crate::clock::Clock;
use crate::history::truncate_title;
use crate::message::{
    append_chunk, apply_tool_call_update, cancel_pending_permission_requests,
    push_permission_request, upsert_plan, upsert_tool_call, ChatMessage, ChatRole, MessageContent,
};
use crate::permission::PermissionCoordinator;
use crate::session::AgentSessionManager;
use crate::settings::{SavedSessionInfo, SettingsStore};

/// Maximum characters of the first message kept as the session title.
const SESSION_TITLE_MAX: usize = 50;

/// Events emitted for the UI.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// The transcript changed (append, merge, or wholesale replace).
    MessagesChanged,
    /// `is_sending` flipped.
    SendingChanged(bool),
    /// A permission request needs a user decision.
    PermissionRequested(acp::PermissionRequest),
    /// The transport reported an out-of-band error.
    AgentError(acp::Error),
}

struct ChatState {
    /// The session updates must match to be applied.
    live_session_id: Option<acp::SessionId>,
    agent_id: String,
    messages: Vec<ChatMessage>,
    is_sending: bool,
    replaying_history: bool,
    /// Set once the first user message has produced a local title.
    title_saved: bool,
}

/// Owns the transcript and routes inbound updates into it.
pub struct ChatController {
    settings: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
    state: Mutex<ChatState>,
    events: broadcast::Sender<ChatEvent>,
}

impl ChatController {
    pub fn new(settings: Arc<dyn SettingsStore>, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            settings,
            clock,
            state: Mutex::new(ChatState {
                live_session_id: None,
                agent_id: String::new(),
                messages: Vec::new(),
                is_sending: false,
                replaying_history: false,
                title_saved: false,
            }),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    /// Scopes the controller to a new session and clears the transcript.
    pub fn attach_session(&self, session_id: Option<acp::SessionId>, agent_id: impl Into<String>) {
        {
            let mut state = self.state.lock();
            state.live_session_id = session_id;
            state.agent_id = agent_id.into();
            state.messages.clear();
            state.is_sending = false;
            state.replaying_history = false;
            state.title_saved = false;
        }
        self.emit(ChatEvent::MessagesChanged);
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().messages.clone()
    }

    pub fn is_sending(&self) -> bool {
        self.state.lock().is_sending
    }

    /// Opens the replay suppression window around a `session/load`.
    pub fn begin_history_replay(&self) {
        self.state.lock().replaying_history = true;
    }

    pub fn end_history_replay(&self) {
        self.state.lock().replaying_history = false;
        self.emit(ChatEvent::MessagesChanged);
    }

    /// Replaces the transcript wholesale (bulk local restore).
    pub fn replace_messages(&self, messages: Vec<ChatMessage>) {
        {
            let mut state = self.state.lock();
            state.messages = messages;
            // A restored transcript already has a saved title.
            state.title_saved = true;
        }
        self.emit(ChatEvent::MessagesChanged);
    }

    /// Records the user's message and, on the first message of a session,
    /// persists the session locally with a truncated title.
    pub async fn push_user_message(&self, content: Vec<MessageContent>) {
        let now = self.clock.now();
        let message = ChatMessage::new(ChatRole::User, content, now);
        let save = {
            let mut state = self.state.lock();
            state.messages.push(message.clone());
            let needs_title = !state.title_saved && state.live_session_id.is_some();
            if needs_title {
                state.title_saved = true;
                state.live_session_id.clone().map(|session_id| SavedSessionInfo {
                    session_id: session_id.to_string(),
                    agent_id: state.agent_id.clone(),
                    title: truncate_title(&message.plain_text(), SESSION_TITLE_MAX),
                    cwd: None,
                    updated_at: now,
                })
            } else {
                None
            }
        };
        self.emit(ChatEvent::MessagesChanged);

        if let Some(info) = save {
            if let Err(err) = self.settings.save_session(info).await {
                tracing::warn!(error = %err, "Failed to save session title");
            }
        }
    }

    /// Flips `is_sending`. On the true -> false transition with a live
    /// session and a non-empty transcript, the messages are persisted:
    /// save on settle, not on every chunk.
    pub async fn set_sending(&self, sending: bool) {
        let settle = {
            let mut state = self.state.lock();
            let was = state.is_sending;
            state.is_sending = sending;
            if was && !sending && !state.messages.is_empty() {
                state
                    .live_session_id
                    .clone()
                    .map(|session_id| (session_id, state.messages.clone()))
            } else {
                None
            }
        };
        self.emit(ChatEvent::SendingChanged(sending));

        if let Some((session_id, messages)) = settle {
            if let Err(err) = self
                .settings
                .save_session_messages(session_id.as_str(), &messages)
                .await
            {
                tracing::warn!(session_id = %session_id, error = %err, "Failed to persist messages");
            }
        }
    }

    /// Marks unresolved permission requests as cancelled in the transcript.
    pub fn cancel_pending_permissions(&self) {
        {
            let mut state = self.state.lock();
            cancel_pending_permission_requests(&mut state.messages);
        }
        self.emit(ChatEvent::MessagesChanged);
    }

    /// Routes one notification through the guard and into the transcript,
    /// feeding capability updates back into the session manager and
    /// permission requests into the coordinator.
    pub fn route_update(
        &self,
        notification: acp::SessionNotification,
        sessions: &AgentSessionManager,
        permissions: &PermissionCoordinator,
    ) {
        let (stale, replaying, now) = {
            let state = self.state.lock();
            let stale = state.live_session_id.as_ref() != Some(&notification.session_id);
            (stale, state.replaying_history, self.clock.now())
        };
        if stale {
            tracing::debug!(
                session_id = %notification.session_id,
                "Dropping update for stale session"
            );
            return;
        }

        match notification.update {
            // Live agent state: applied even during history replay.
            acp::SessionUpdate::AvailableCommandsUpdate { available_commands } => {
                sessions.update_available_commands(available_commands);
            }
            acp::SessionUpdate::CurrentModeUpdate { current_mode_id } => {
                sessions.update_current_mode(current_mode_id);
            }

            _ if replaying => {
                tracing::trace!("Suppressing message update during history replay");
            }

            acp::SessionUpdate::UserMessageChunk { content } => {
                self.apply_chunk(ChatRole::User, content, now);
            }
            acp::SessionUpdate::AgentMessageChunk { content } => {
                self.apply_chunk(ChatRole::Assistant, content, now);
            }
            acp::SessionUpdate::AgentThoughtChunk { content } => {
                if let acp::ContentBlock::Text(text) = content {
                    self.with_messages(|messages| {
                        append_chunk(
                            messages,
                            ChatRole::Assistant,
                            MessageContent::AgentThought { text: text.text },
                            now,
                        );
                    });
                }
            }
            acp::SessionUpdate::ToolCall(tool_call) => {
                self.with_messages(|messages| upsert_tool_call(messages, tool_call, now));
            }
            acp::SessionUpdate::ToolCallUpdate(update) => {
                self.with_messages(|messages| {
                    if !apply_tool_call_update(messages, update) {
                        tracing::debug!("Dropping update for unknown tool call");
                    }
                });
            }
            acp::SessionUpdate::Plan(plan) => {
                self.with_messages(|messages| upsert_plan(messages, plan, now));
            }
            acp::SessionUpdate::PermissionRequest(request) => {
                self.with_messages(|messages| {
                    push_permission_request(messages, request.clone(), now)
                });
                permissions.begin(request.clone());
                self.emit(ChatEvent::PermissionRequested(request));
            }
        }
    }

    /// Surfaces a transport-level error to subscribers.
    pub fn report_agent_error(&self, error: acp::Error) {
        tracing::warn!(error = %error, "Agent reported an error");
        self.emit(ChatEvent::AgentError(error));
    }

    fn apply_chunk(&self, role: ChatRole, content: acp::ContentBlock, now: DateTime<Utc>) {
        let chunk = match content {
            acp::ContentBlock::Text(text) => MessageContent::Text { text: text.text },
            acp::ContentBlock::Image(image) => MessageContent::Image {
                data: image.data,
                mime_type: image.mime_type,
            },
            other => {
                tracing::trace!(?other, "Ignoring non-renderable chunk content");
                return;
            }
        };
        self.with_messages(|messages| append_chunk(messages, role, chunk, now));
    }

    fn with_messages(&self, f: impl FnOnce(&mut Vec<ChatMessage>)) {
        {
            let mut state = self.state.lock();
            f(&mut state.messages);
        }
        self.emit(ChatEvent::MessagesChanged);
    }

    fn emit(&self, event: ChatEvent) {
        // No subscribers is normal before the view mounts.
        let _ = self.events.send(event);
    }
}
