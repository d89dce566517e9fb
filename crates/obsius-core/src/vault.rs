//! Host vault access: note reads, search, and active-editor tracking.
//!
//! Implemented by the editor host; the core uses it to expand mentions and
//! auto-context into prompt content.

use async_trait::async_trait;

use crate::context::EditorSelection;

/// Metadata for one note in the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteMetadata {
    /// Vault-relative path, e.g. `projects/obsius.md`.
    pub path: String,
    /// Display name without extension.
    pub name: String,
}

/// What the user currently has open, used for auto-mention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveNoteContext {
    pub note: NoteMetadata,
    /// The current selection, if any text is selected.
    pub selection: Option<EditorSelection>,
}

#[async_trait]
pub trait VaultAccess: Send + Sync {
    /// Full text of a note. Errors degrade to a placeholder in prompts.
    async fn read_note(&self, path: &str) -> Result<String, String>;

    /// Notes matching a query, for mention autocompletion.
    async fn search_notes(&self, query: &str) -> Vec<NoteMetadata>;

    /// The active note and selection, if an editor is focused.
    fn active_context(&self) -> Option<ActiveNoteContext>;

    /// RFC 3339 modification time of a note, when the host tracks it.
    fn note_last_modified(&self, _path: &str) -> Option<String> {
        None
    }
}
