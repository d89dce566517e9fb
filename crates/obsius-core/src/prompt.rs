//! Prompt preparation: raw input + context into two parallel contents.
//!
//! `display_content` mirrors only what the human typed (plus images) and
//! is what the UI renders; `agent_content` is what actually goes over the
//! wire, with mentioned notes, explicit references, and the auto-mention
//! expanded. Agents that accept embedded context get structured resource
//! blocks; everyone else gets the same information inlined as tagged text
//! blocks. Oversized context is cut with an explicit notice, never
//! silently.

use crate::acp;
use crate::context::{
    extract_context_references, strip_note_mentions, strip_tokens, ChatContextKind,
    ChatContextReference, EditorSelection,
};
use crate::message::MessageContent;
use crate::vault::{ActiveNoteContext, VaultAccess};

/// Default cap on embedded note/selection content, in characters.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 10_000;

/// An image attached to the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub data: String,
    pub mime_type: String,
}

/// Everything the preparer needs for one prompt turn.
#[derive(Debug, Clone)]
pub struct PromptInput {
    /// Raw input text; may contain context tokens and `@[[note]]` mentions.
    pub text: String,
    /// Explicit references attached outside the text (UI chips).
    pub references: Vec<ChatContextReference>,
    pub images: Vec<ImageAttachment>,
    /// The active note/selection, attached unless already referenced.
    pub auto_context: Option<ActiveNoteContext>,
    pub max_context_chars: usize,
}

impl PromptInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            references: Vec::new(),
            images: Vec::new(),
            auto_context: None,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

/// The two parallel content representations for one prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedPrompt {
    /// What the UI shows: the typed text and images, never expanded context.
    pub display_content: Vec<MessageContent>,
    /// What the agent receives.
    pub agent_content: Vec<acp::ContentBlock>,
    /// The references the auto-mention contributed, for UI chips.
    pub auto_mention_context: Vec<ChatContextReference>,
}

/// Prepares a prompt for sending.
///
/// Pure over its inputs apart from vault reads; a read failure for any
/// referenced note degrades to a placeholder instead of failing the turn.
pub async fn prepare_prompt(
    vault: &dyn VaultAccess,
    capabilities: &acp::PromptCapabilities,
    input: PromptInput,
) -> PreparedPrompt {
    let mut references = extract_context_references(&input.text);
    references.extend(input.references.iter().cloned());

    let mentions = crate::context::extract_note_mentions(&input.text);
    for mention in &mentions {
        if let Some(reference) = resolve_mention(vault, mention).await {
            if !is_referenced(&references, &reference.note_path) {
                references.push(reference);
            }
        }
    }

    let clean_text = strip_note_mentions(&strip_tokens(&input.text));

    let mut auto_references = Vec::new();
    if let Some(active) = &input.auto_context {
        if !is_referenced(&references, &active.note.path) {
            auto_references.push(ChatContextReference {
                kind: if active.selection.is_some() {
                    ChatContextKind::Selection
                } else {
                    ChatContextKind::File
                },
                note_path: active.note.path.clone(),
                note_name: active.note.name.clone(),
                selection: active.selection.map(EditorSelection::normalized),
            });
        }
    }

    let mut agent_content = Vec::new();
    let all_references = references.iter().chain(auto_references.iter());
    if capabilities.embedded_context {
        for reference in all_references {
            agent_content.push(embedded_block(vault, reference, input.max_context_chars).await);
        }
    } else {
        for reference in all_references {
            agent_content.push(tagged_text_block(vault, reference, input.max_context_chars).await);
        }
    }

    if !clean_text.is_empty() {
        agent_content.push(acp::ContentBlock::text(clean_text.clone()));
    }
    if capabilities.image {
        for image in &input.images {
            agent_content.push(acp::ContentBlock::image(
                image.data.clone(),
                image.mime_type.clone(),
            ));
        }
    }

    let mut display_content = Vec::new();
    if !clean_text.is_empty() {
        if auto_references.is_empty() {
            display_content.push(MessageContent::Text { text: clean_text });
        } else {
            display_content.push(MessageContent::TextWithContext {
                text: clean_text,
                context: auto_references.clone(),
            });
        }
    }
    for image in &input.images {
        display_content.push(MessageContent::Image {
            data: image.data.clone(),
            mime_type: image.mime_type.clone(),
        });
    }

    PreparedPrompt {
        display_content,
        agent_content,
        auto_mention_context: auto_references,
    }
}

async fn resolve_mention(vault: &dyn VaultAccess, name: &str) -> Option<ChatContextReference> {
    let matches = vault.search_notes(name).await;
    let note = matches.into_iter().next()?;
    Some(ChatContextReference {
        kind: ChatContextKind::File,
        note_path: note.path,
        note_name: note.name,
        selection: None,
    })
}

fn is_referenced(references: &[ChatContextReference], note_path: &str) -> bool {
    references.iter().any(|r| r.note_path == note_path)
}

async fn embedded_block(
    vault: &dyn VaultAccess,
    reference: &ChatContextReference,
    max_chars: usize,
) -> acp::ContentBlock {
    match reference.kind {
        // A folder has no single byte stream to attach.
        ChatContextKind::Folder => acp::ContentBlock::text(folder_assertion(reference)),
        ChatContextKind::File | ChatContextKind::Selection => {
            match vault.read_note(&reference.note_path).await {
                Ok(text) => {
                    let (uri, slice) = sliced_contents(reference, &text);
                    let body = truncate_context(&slice, max_chars);
                    let mut resource = acp::EmbeddedResource::new(uri, body)
                        .with_mime_type("text/markdown");
                    if let Some(modified) = vault.note_last_modified(&reference.note_path) {
                        resource = resource.with_last_modified(modified);
                    }
                    acp::ContentBlock::resource(resource)
                }
                Err(err) => {
                    tracing::debug!(note_path = %reference.note_path, error = %err, "Note read failed");
                    acp::ContentBlock::text(read_failure_placeholder(reference))
                }
            }
        }
    }
}

async fn tagged_text_block(
    vault: &dyn VaultAccess,
    reference: &ChatContextReference,
    max_chars: usize,
) -> acp::ContentBlock {
    let block = match reference.kind {
        ChatContextKind::Folder => {
            format!("<folder_context ref=\"{}\"/>", reference.note_path)
        }
        ChatContextKind::File => match vault.read_note(&reference.note_path).await {
            Ok(text) => format!(
                "<file_context ref=\"{}\">\n{}\n</file_context>",
                reference.note_path,
                truncate_context(&text, max_chars)
            ),
            Err(_) => read_failure_placeholder(reference),
        },
        ChatContextKind::Selection => match vault.read_note(&reference.note_path).await {
            Ok(text) => {
                let (uri, slice) = sliced_contents(reference, &text);
                format!(
                    "<selection_context ref=\"{}\">\n{}\n</selection_context>",
                    uri,
                    truncate_context(&slice, max_chars)
                )
            }
            Err(_) => read_failure_placeholder(reference),
        },
    };
    acp::ContentBlock::text(block)
}

/// The vault URI for a reference and the (possibly selection-sliced) text.
fn sliced_contents(reference: &ChatContextReference, text: &str) -> (String, String) {
    match (reference.kind, reference.selection) {
        (ChatContextKind::Selection, Some(selection)) => {
            let selection = selection.normalized();
            let uri = format!(
                "vault://{}#L{}:{}-L{}:{}",
                reference.note_path,
                selection.from.line,
                selection.from.ch,
                selection.to.line,
                selection.to.ch
            );
            (uri, extract_selection(text, selection))
        }
        _ => (format!("vault://{}", reference.note_path), text.to_string()),
    }
}

/// Extracts the selected span by walking lines from `from` to `to`
/// inclusive, clipping every index to valid bounds.
pub fn extract_selection(text: &str, selection: EditorSelection) -> String {
    let selection = selection.normalized();
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return String::new();
    }

    let last_line = lines.len() - 1;
    let from_line = (selection.from.line as usize).min(last_line);
    let to_line = (selection.to.line as usize).min(last_line);

    let mut out = String::new();
    for (index, line) in lines[from_line..=to_line].iter().enumerate() {
        let line_number = from_line + index;
        let chars: Vec<char> = line.chars().collect();
        let start = if line_number == from_line {
            (selection.from.ch as usize).min(chars.len())
        } else {
            0
        };
        let end = if line_number == to_line {
            (selection.to.ch as usize).min(chars.len())
        } else {
            chars.len()
        };
        if index > 0 {
            out.push('\n');
        }
        out.extend(chars[start..end].iter());
    }
    out
}

/// Cuts oversized context and appends a human-readable notice.
pub fn truncate_context(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}\n\n[Truncated: showing the first {max_chars} of {total} characters]")
}

fn folder_assertion(reference: &ChatContextReference) -> String {
    format!(
        "The folder \"{}\" is attached as context (folder contents are not embedded).",
        reference.note_path
    )
}

fn read_failure_placeholder(reference: &ChatContextReference) -> String {
    format!("The note \"{}\" could not be read.", reference.note_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{format_chat_context_token, EditorPosition};
    use crate::vault::NoteMetadata;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    struct FakeVault {
        notes: HashMap<String, String>,
    }

    impl FakeVault {
        fn with_note(path: &str, text: &str) -> Self {
            let mut notes = HashMap::new();
            notes.insert(path.to_string(), text.to_string());
            Self { notes }
        }
    }

    #[async_trait]
    impl VaultAccess for FakeVault {
        async fn read_note(&self, path: &str) -> Result<String, String> {
            self.notes
                .get(path)
                .cloned()
                .ok_or_else(|| format!("missing note: {path}"))
        }

        async fn search_notes(&self, query: &str) -> Vec<NoteMetadata> {
            self.notes
                .keys()
                .filter(|path| path.contains(query))
                .map(|path| NoteMetadata {
                    path: path.clone(),
                    name: path.trim_end_matches(".md").to_string(),
                })
                .collect()
        }

        fn active_context(&self) -> Option<ActiveNoteContext> {
            None
        }
    }

    fn embedded_caps() -> acp::PromptCapabilities {
        acp::PromptCapabilities {
            image: true,
            audio: false,
            embedded_context: true,
        }
    }

    fn text_caps() -> acp::PromptCapabilities {
        acp::PromptCapabilities {
            image: false,
            audio: false,
            embedded_context: false,
        }
    }

    #[tokio::test]
    async fn display_content_never_carries_expanded_context() {
        let vault = FakeVault::with_note("notes/design.md", "# Design\nbody");
        let reference = ChatContextReference {
            kind: ChatContextKind::File,
            note_path: "notes/design.md".into(),
            note_name: "design".into(),
            selection: None,
        };
        let token = format_chat_context_token(&reference);
        let input = PromptInput::new(format!("{token} summarize this"));

        let prepared = prepare_prompt(&vault, &embedded_caps(), input).await;

        assert_eq!(
            prepared.display_content,
            vec![MessageContent::Text {
                text: "summarize this".into()
            }]
        );
        // Agent content: resource block then the text block.
        assert_eq!(prepared.agent_content.len(), 2);
        assert!(matches!(
            prepared.agent_content[0],
            acp::ContentBlock::Resource(_)
        ));
    }

    #[tokio::test]
    async fn text_mode_inlines_tagged_blocks() {
        let vault = FakeVault::with_note("notes/design.md", "body");
        let reference = ChatContextReference {
            kind: ChatContextKind::File,
            note_path: "notes/design.md".into(),
            note_name: "design".into(),
            selection: None,
        };
        let mut input = PromptInput::new("explain");
        input.references.push(reference);

        let prepared = prepare_prompt(&vault, &text_caps(), input).await;

        let acp::ContentBlock::Text(first) = &prepared.agent_content[0] else {
            panic!("expected text block");
        };
        assert!(first.text.starts_with("<file_context ref=\"notes/design.md\">"));
        assert!(first.text.contains("body"));
    }

    #[tokio::test]
    async fn folder_references_never_embed_content() {
        let vault = FakeVault::with_note("notes/a.md", "a");
        let mut input = PromptInput::new("look");
        input.references.push(ChatContextReference {
            kind: ChatContextKind::Folder,
            note_path: "notes".into(),
            note_name: "notes".into(),
            selection: None,
        });

        let prepared = prepare_prompt(&vault, &embedded_caps(), input).await;
        let acp::ContentBlock::Text(block) = &prepared.agent_content[0] else {
            panic!("expected text block");
        };
        assert!(block.text.contains("folder"));
        assert!(!block.text.contains("notes/a.md"));
    }

    #[tokio::test]
    async fn unreadable_note_degrades_to_placeholder() {
        let vault = FakeVault {
            notes: HashMap::new(),
        };
        let mut input = PromptInput::new("go");
        input.references.push(ChatContextReference {
            kind: ChatContextKind::File,
            note_path: "gone.md".into(),
            note_name: "gone".into(),
            selection: None,
        });

        let prepared = prepare_prompt(&vault, &embedded_caps(), input).await;
        let acp::ContentBlock::Text(block) = &prepared.agent_content[0] else {
            panic!("expected placeholder text block");
        };
        assert!(block.text.contains("could not be read"));
    }

    #[tokio::test]
    async fn auto_context_is_skipped_when_already_referenced() {
        let vault = FakeVault::with_note("active.md", "active body");
        let reference = ChatContextReference {
            kind: ChatContextKind::File,
            note_path: "active.md".into(),
            note_name: "active".into(),
            selection: None,
        };
        let mut input = PromptInput::new("question");
        input.references.push(reference);
        input.auto_context = Some(ActiveNoteContext {
            note: NoteMetadata {
                path: "active.md".into(),
                name: "active".into(),
            },
            selection: None,
        });

        let prepared = prepare_prompt(&vault, &embedded_caps(), input).await;
        assert!(prepared.auto_mention_context.is_empty());
        // One resource block for the explicit reference, one text block.
        assert_eq!(prepared.agent_content.len(), 2);
    }

    #[test]
    fn selection_extraction_clips_to_bounds() {
        let text = "line zero\nline one\nline two";
        let selection = EditorSelection {
            from: EditorPosition { line: 1, ch: 5 },
            to: EditorPosition { line: 9, ch: 99 },
        };
        assert_eq!(extract_selection(text, selection), "one\nline two");
    }

    #[test]
    fn same_line_selection_is_a_char_range() {
        let text = "abcdef";
        let selection = EditorSelection {
            from: EditorPosition { line: 0, ch: 1 },
            to: EditorPosition { line: 0, ch: 4 },
        };
        assert_eq!(extract_selection(text, selection), "bcd");
    }

    #[test]
    fn truncation_appends_an_explicit_notice() {
        let text = "x".repeat(20);
        let cut = truncate_context(&text, 10);
        assert!(cut.starts_with(&"x".repeat(10)));
        assert!(cut.contains("Truncated"));
        assert!(cut.contains("20 characters"));
    }

    #[test]
    fn short_context_is_untouched() {
        assert_eq!(truncate_context("short", 10), "short");
    }
}
