//! Agent session lifecycle and prompt-turn orchestration for Obsius.
//!
//! This crate is the protocol-client core behind the chat UI: it connects
//! to an external coding agent over the Agent Client Protocol, manages the
//! session state machine, prepares and sends prompts with rich context,
//! routes streamed updates into the message list, and recovers from
//! partial failures (auth retries, cancellation, restarts).
//!
//! # Architecture
//!
//! - `session` - `ChatSession` state machine and `AgentSessionManager`
//! - `chat` - live message stream and session-update routing
//! - `prompt` - display/agent content preparation from user input
//! - `send` - prompt delivery with auth-retry and soft-error handling
//! - `history` - session list cache, restore, fork, delete
//! - `permission` - single-slot permission request resolution
//! - `orchestrator` - composition root wiring the managers together
//! - `client` / `vault` / `settings` - capability traits implemented by
//!   the host (transport, vault access, persistent settings)
//! - `context` - context-reference token codec
//!
//! The rendering layer and the host editor's APIs are out of scope; they
//! consume this crate through [`ChatOrchestrator`] and the event stream.

pub mod chat;
pub mod client;
pub mod clock;
pub mod context;
pub mod error;
pub mod history;
pub mod message;
pub mod orchestrator;
pub mod permission;
pub mod prompt;
pub mod send;
pub mod session;
pub mod settings;
pub mod vault;

pub use obsius_acp as acp;

pub use chat::{ChatController, ChatEvent};
pub use client::{AgentClient, AgentCommand, AgentConfig};
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{
    format_chat_context_token, format_slash_command_token, normalize_chat_context_reference,
    parse_chat_context_token, ChatContextKind, ChatContextReference, EditorPosition,
    EditorSelection,
};
pub use error::{CoreError, Result, SessionErrorInfo};
pub use history::{
    truncate_title, SessionHistoryManager, SessionListCache, SessionSummary, SESSION_LIST_TTL,
};
pub use message::{ChatMessage, ChatRole, MessageContent};
pub use orchestrator::ChatOrchestrator;
pub use permission::PermissionCoordinator;
pub use prompt::{prepare_prompt, ImageAttachment, PreparedPrompt, PromptInput};
pub use send::{PromptSender, SendPromptResult};
pub use session::{AgentSessionManager, ChatSession, SessionState};
pub use settings::{
    AgentSettingsEntry, ObsiusSettings, SavedSessionInfo, SettingsStore, SettingsUpdate,
};
pub use vault::{ActiveNoteContext, NoteMetadata, VaultAccess};
