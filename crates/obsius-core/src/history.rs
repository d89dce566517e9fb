//! Session history: listing, caching, forking, and local fallback.
//!
//! The agent's `session/list` is the source of truth when the agent can
//! both list and restore sessions; locally saved titles still win over
//! server titles because the local title was cut from the user's actual
//! first message. Agents without list/restore support fall back to the
//! local store entirely, bypassing the cache. The cache is keyed by cwd
//! and expires after [`SESSION_LIST_TTL`]; identity-changing operations
//! (fork, delete, new session) invalidate it explicitly.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::acp;
use crate::client::AgentClient;
use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::message::ChatMessage;
use crate::settings::{SavedSessionInfo, SettingsStore};

/// How long one `session/list` page stays fresh.
pub const SESSION_LIST_TTL: Duration = Duration::from_secs(5 * 60);

/// Maximum title length of a forked session's source fragment.
const FORK_TITLE_MAX: usize = 44;

/// Cuts a title to at most `max` characters, appending `...` when cut.
pub fn truncate_title(title: &str, max: usize) -> String {
    let title = title.trim();
    if title.chars().count() <= max {
        return title.to_string();
    }
    let cut: String = title.chars().take(max).collect();
    format!("{cut}...")
}

/// One session in the merged history list.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: acp::SessionId,
    pub title: String,
    pub cwd: Option<PathBuf>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// One cached `session/list` result.
#[derive(Debug, Clone)]
pub struct SessionListCache {
    pub sessions: Vec<SessionSummary>,
    pub next_cursor: Option<String>,
    pub cwd: Option<PathBuf>,
    pub fetched_at: DateTime<Utc>,
}

impl SessionListCache {
    /// Whether this cache entry answers a fetch for `cwd` at `now`.
    pub fn is_valid(&self, cwd: Option<&Path>, now: DateTime<Utc>) -> bool {
        if self.cwd.as_deref() != cwd {
            return false;
        }
        let age = now.signed_duration_since(self.fetched_at);
        age >= chrono::Duration::zero()
            && age < chrono::Duration::seconds(SESSION_LIST_TTL.as_secs() as i64)
    }
}

struct HistoryState {
    agent_id: Option<String>,
    capabilities: acp::AgentCapabilities,
    cache: Option<SessionListCache>,
}

/// Lists, forks, and deletes sessions for the connected agent.
pub struct SessionHistoryManager {
    client: Arc<dyn AgentClient>,
    settings: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
    state: Mutex<HistoryState>,
}

impl SessionHistoryManager {
    pub fn new(
        client: Arc<dyn AgentClient>,
        settings: Arc<dyn SettingsStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            settings,
            clock,
            state: Mutex::new(HistoryState {
                agent_id: None,
                capabilities: acp::AgentCapabilities::default(),
                cache: None,
            }),
        }
    }

    /// Scopes history to the connected agent. Switching agents drops the
    /// cache; the old list belongs to another backend.
    pub fn set_agent(&self, agent_id: impl Into<String>, capabilities: acp::AgentCapabilities) {
        let agent_id = agent_id.into();
        let mut state = self.state.lock();
        if state.agent_id.as_deref() != Some(agent_id.as_str()) {
            state.cache = None;
        }
        state.agent_id = Some(agent_id);
        state.capabilities = capabilities;
    }

    pub fn invalidate_cache(&self) {
        self.state.lock().cache = None;
    }

    /// The merged session list for `cwd`, freshest first.
    pub async fn fetch_sessions(&self, cwd: Option<&Path>) -> Result<Vec<SessionSummary>> {
        let (agent_id, capabilities, cached) = {
            let state = self.state.lock();
            let cached = state
                .cache
                .as_ref()
                .filter(|cache| cache.is_valid(cwd, self.clock.now()))
                .map(|cache| cache.sessions.clone());
            (state.agent_id.clone(), state.capabilities.clone(), cached)
        };

        // An agent that cannot restore a session has no useful remote
        // list; local records are all we can reopen.
        if !capabilities.list_sessions || !capabilities.can_restore() {
            return Ok(self.local_sessions(agent_id.as_deref(), cwd).await);
        }

        if let Some(sessions) = cached {
            return Ok(sessions);
        }

        let response = self
            .client
            .list_sessions(cwd, None)
            .await
            .map_err(CoreError::from_protocol)?;
        let local = self.settings.saved_sessions(agent_id.as_deref(), cwd).await;
        let mut sessions = merge_sessions(response.sessions, &local);
        sort_sessions(&mut sessions);

        let mut state = self.state.lock();
        state.cache = Some(SessionListCache {
            sessions: sessions.clone(),
            next_cursor: response.next_cursor,
            cwd: cwd.map(Path::to_path_buf),
            fetched_at: self.clock.now(),
        });
        Ok(sessions)
    }

    /// Fetches the next page and returns the grown list. A list without a
    /// pending cursor is already complete.
    pub async fn load_more_sessions(&self) -> Result<Vec<SessionSummary>> {
        let (agent_id, cwd, cursor, current) = {
            let state = self.state.lock();
            if !state.capabilities.list_sessions {
                return Err(CoreError::CapabilityUnsupported("session listing"));
            }
            match &state.cache {
                Some(cache) => (
                    state.agent_id.clone(),
                    cache.cwd.clone(),
                    cache.next_cursor.clone(),
                    cache.sessions.clone(),
                ),
                None => return Err(CoreError::NoSessionList),
            }
        };
        let Some(cursor) = cursor else {
            return Ok(current);
        };

        let response = self
            .client
            .list_sessions(cwd.as_deref(), Some(&cursor))
            .await
            .map_err(CoreError::from_protocol)?;
        let local = self
            .settings
            .saved_sessions(agent_id.as_deref(), cwd.as_deref())
            .await;
        let page = merge_sessions(response.sessions, &local);

        let mut state = self.state.lock();
        if let Some(cache) = state.cache.as_mut() {
            for summary in page {
                if !cache
                    .sessions
                    .iter()
                    .any(|s| s.session_id == summary.session_id)
                {
                    cache.sessions.push(summary);
                }
            }
            cache.next_cursor = response.next_cursor;
            Ok(cache.sessions.clone())
        } else {
            Ok(current)
        }
    }

    /// Branches a new session off `session_id` and records it locally
    /// under a `Fork: ...` title derived from the source title.
    pub async fn fork_session(
        &self,
        session_id: &acp::SessionId,
        cwd: &Path,
        source_title: &str,
    ) -> Result<acp::NewSessionResponse> {
        let (agent_id, capabilities) = {
            let state = self.state.lock();
            (state.agent_id.clone(), state.capabilities.clone())
        };
        if !capabilities.fork_session {
            return Err(CoreError::CapabilityUnsupported("session forking"));
        }

        let response = self
            .client
            .fork_session(session_id, cwd)
            .await
            .map_err(CoreError::from_protocol)?;

        let info = SavedSessionInfo {
            session_id: response.session_id.to_string(),
            agent_id: agent_id.unwrap_or_default(),
            title: format!("Fork: {}", truncate_title(source_title, FORK_TITLE_MAX)),
            cwd: Some(cwd.to_path_buf()),
            updated_at: self.clock.now(),
        };
        self.settings
            .save_session(info)
            .await
            .map_err(CoreError::Host)?;

        // The fork shares history up to the branch point, so the local
        // transcript is carried forward.
        match self.settings.load_session_messages(session_id.as_str()).await {
            Ok(messages) if !messages.is_empty() => {
                if let Err(err) = self
                    .settings
                    .save_session_messages(response.session_id.as_str(), &messages)
                    .await
                {
                    tracing::warn!(error = %err, "Failed to copy transcript to fork");
                }
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read source transcript for fork");
            }
        }

        self.invalidate_cache();
        Ok(response)
    }

    /// Removes a session's local record and transcript.
    pub async fn delete_session(&self, session_id: &acp::SessionId) -> Result<()> {
        self.settings
            .delete_session(session_id.as_str())
            .await
            .map_err(CoreError::Host)?;
        self.invalidate_cache();
        Ok(())
    }

    /// The locally cached transcript, used to backfill `session/resume`.
    pub async fn local_messages(&self, session_id: &acp::SessionId) -> Vec<ChatMessage> {
        match self.settings.load_session_messages(session_id.as_str()).await {
            Ok(messages) => messages,
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "Failed to load local transcript");
                Vec::new()
            }
        }
    }

    async fn local_sessions(
        &self,
        agent_id: Option<&str>,
        cwd: Option<&Path>,
    ) -> Vec<SessionSummary> {
        let mut sessions: Vec<SessionSummary> = self
            .settings
            .saved_sessions(agent_id, cwd)
            .await
            .into_iter()
            .map(|info| SessionSummary {
                session_id: acp::SessionId::from(info.session_id),
                title: info.title,
                cwd: info.cwd,
                updated_at: Some(info.updated_at),
            })
            .collect();
        sort_sessions(&mut sessions);
        sessions
    }
}

/// Remote sessions with local titles overlaid, plus local-only sessions.
fn merge_sessions(
    remote: Vec<acp::SessionInfo>,
    local: &[SavedSessionInfo],
) -> Vec<SessionSummary> {
    let mut sessions: Vec<SessionSummary> = remote
        .into_iter()
        .map(|info| {
            let saved = local.iter().find(|s| s.session_id == info.session_id.as_str());
            SessionSummary {
                title: saved
                    .map(|s| s.title.clone())
                    .or(info.title)
                    .unwrap_or_else(|| "Untitled session".to_string()),
                updated_at: saved.map(|s| s.updated_at).or_else(|| {
                    info.updated_at
                        .as_deref()
                        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                        .map(|ts| ts.with_timezone(&Utc))
                }),
                cwd: info.cwd,
                session_id: info.session_id,
            }
        })
        .collect();

    for saved in local {
        if !sessions
            .iter()
            .any(|s| s.session_id.as_str() == saved.session_id)
        {
            sessions.push(SessionSummary {
                session_id: acp::SessionId::from(saved.session_id.clone()),
                title: saved.title.clone(),
                cwd: saved.cwd.clone(),
                updated_at: Some(saved.updated_at),
            });
        }
    }
    sessions
}

fn sort_sessions(sessions: &mut [SessionSummary]) {
    // Freshest first; sessions without a timestamp sink to the bottom.
    sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}
