//! Context references and their inline token encoding.
//!
//! Attachments (a note, a folder, a selection) ride inside otherwise plain
//! message text as opaque tokens so they survive round-tripping through a
//! text input: `@[obsius-context:<base64url(JSON envelope)>]`. Slash
//! commands use the sibling form `@[obsius-slash:<name>]`. Parsing is
//! tolerant: malformed payloads and unknown envelope versions yield `None`
//! rather than an error.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

const CONTEXT_TOKEN_PREFIX: &str = "@[obsius-context:";
const SLASH_TOKEN_PREFIX: &str = "@[obsius-slash:";
const TOKEN_SUFFIX: &str = "]";
const ENVELOPE_VERSION: u32 = 1;

/// A zero-based (line, character) position in a note.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct EditorPosition {
    pub line: u32,
    pub ch: u32,
}

/// A selection span; normalized so `from <= to` by (line, ch).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditorSelection {
    pub from: EditorPosition,
    pub to: EditorPosition,
}

impl EditorSelection {
    /// Orders the endpoints lexicographically by (line, ch).
    pub fn normalized(self) -> Self {
        if self.from <= self.to {
            self
        } else {
            Self {
                from: self.to,
                to: self.from,
            }
        }
    }
}

/// What a context reference points at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatContextKind {
    Selection,
    File,
    Folder,
}

/// A reference to vault content attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatContextReference {
    #[serde(rename = "type")]
    pub kind: ChatContextKind,
    pub note_path: String,
    pub note_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<EditorSelection>,
}

/// Versioned JSON envelope carried inside a context token.
#[derive(Debug, Serialize, Deserialize)]
struct TokenEnvelope {
    version: u32,
    #[serde(flatten)]
    reference: ChatContextReference,
}

/// Normalizes a reference: selections get ordered endpoints, non-selection
/// kinds drop any stray selection.
pub fn normalize_chat_context_reference(reference: ChatContextReference) -> ChatContextReference {
    let selection = match reference.kind {
        ChatContextKind::Selection => reference.selection.map(EditorSelection::normalized),
        ChatContextKind::File | ChatContextKind::Folder => None,
    };
    ChatContextReference {
        selection,
        ..reference
    }
}

/// Encodes a reference as an inline token.
pub fn format_chat_context_token(reference: &ChatContextReference) -> String {
    let envelope = TokenEnvelope {
        version: ENVELOPE_VERSION,
        reference: normalize_chat_context_reference(reference.clone()),
    };
    // Serializing a plain struct of strings/ints cannot fail.
    let json = serde_json::to_string(&envelope).unwrap_or_default();
    let payload = URL_SAFE_NO_PAD.encode(json.as_bytes());
    format!("{CONTEXT_TOKEN_PREFIX}{payload}{TOKEN_SUFFIX}")
}

/// Decodes one token back into a normalized reference.
///
/// Returns `None` for malformed base64, malformed JSON, or an envelope
/// version this build does not understand.
pub fn parse_chat_context_token(token: &str) -> Option<ChatContextReference> {
    let payload = token
        .strip_prefix(CONTEXT_TOKEN_PREFIX)?
        .strip_suffix(TOKEN_SUFFIX)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let envelope: TokenEnvelope = serde_json::from_slice(&bytes).ok()?;
    if envelope.version != ENVELOPE_VERSION {
        return None;
    }
    Some(normalize_chat_context_reference(envelope.reference))
}

/// Encodes a slash command as an inline token.
pub fn format_slash_command_token(command_name: &str) -> String {
    format!("{SLASH_TOKEN_PREFIX}{command_name}{TOKEN_SUFFIX}")
}

/// Decodes a slash command token.
pub fn parse_slash_command_token(token: &str) -> Option<&str> {
    token
        .strip_prefix(SLASH_TOKEN_PREFIX)?
        .strip_suffix(TOKEN_SUFFIX)
}

/// Extracts every context token embedded in `text`, in order.
pub fn extract_context_references(text: &str) -> Vec<ChatContextReference> {
    scan_tokens(text, CONTEXT_TOKEN_PREFIX)
        .filter_map(|token| parse_chat_context_token(token))
        .collect()
}

/// Removes all context and slash tokens, collapsing the whitespace they
/// leave behind.
pub fn strip_tokens(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some((before, _token, after)) = next_token(rest) {
        out.push_str(before);
        rest = after;
    }
    out.push_str(rest);
    collapse_spaces(&out)
}

/// Note names mentioned as `@[[Note Name]]`, in order of appearance.
pub fn extract_note_mentions(text: &str) -> Vec<String> {
    let mut mentions = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("@[[") {
        let tail = &rest[start + 3..];
        match tail.find("]]") {
            Some(end) => {
                let name = tail[..end].trim();
                if !name.is_empty() {
                    mentions.push(name.to_string());
                }
                rest = &tail[end + 2..];
            }
            None => break,
        }
    }
    mentions
}

/// Removes `@[[...]]` mentions from the text.
pub fn strip_note_mentions(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("@[[") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 3..];
        match tail.find("]]") {
            Some(end) => rest = &tail[end + 2..],
            None => {
                rest = &rest[start..];
                break;
            }
        }
    }
    out.push_str(rest);
    collapse_spaces(&out)
}

fn scan_tokens<'a>(text: &'a str, prefix: &'a str) -> impl Iterator<Item = &'a str> {
    let mut rest = text;
    std::iter::from_fn(move || loop {
        let start = rest.find(prefix)?;
        let tail = &rest[start..];
        match tail.find(TOKEN_SUFFIX) {
            Some(end) => {
                let token = &tail[..=end];
                rest = &tail[end + 1..];
                return Some(token);
            }
            None => {
                rest = "";
                return None;
            }
        }
    })
}

fn next_token(text: &str) -> Option<(&str, &str, &str)> {
    let ctx = text.find(CONTEXT_TOKEN_PREFIX);
    let slash = text.find(SLASH_TOKEN_PREFIX);
    let start = match (ctx, slash) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };
    let tail = &text[start..];
    let end = tail.find(TOKEN_SUFFIX)?;
    Some((&text[..start], &tail[..=end], &tail[end + 1..]))
}

fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for ch in text.chars() {
        if ch == ' ' {
            if !last_was_space {
                out.push(ch);
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn selection_reference() -> ChatContextReference {
        ChatContextReference {
            kind: ChatContextKind::Selection,
            note_path: "projects/obsius.md".into(),
            note_name: "obsius".into(),
            selection: Some(EditorSelection {
                from: EditorPosition { line: 5, ch: 0 },
                to: EditorPosition { line: 2, ch: 3 },
            }),
        }
    }

    #[test]
    fn token_round_trips_to_normalized_reference() {
        let reference = selection_reference();
        let token = format_chat_context_token(&reference);
        let parsed = parse_chat_context_token(&token).unwrap();
        assert_eq!(parsed, normalize_chat_context_reference(reference));
    }

    #[test]
    fn reversed_selection_is_swapped() {
        let normalized = normalize_chat_context_reference(selection_reference());
        let selection = normalized.selection.unwrap();
        assert_eq!(selection.from, EditorPosition { line: 2, ch: 3 });
        assert_eq!(selection.to, EditorPosition { line: 5, ch: 0 });
    }

    #[test]
    fn same_line_selection_orders_by_ch() {
        let selection = EditorSelection {
            from: EditorPosition { line: 4, ch: 9 },
            to: EditorPosition { line: 4, ch: 2 },
        }
        .normalized();
        assert_eq!(selection.from.ch, 2);
        assert_eq!(selection.to.ch, 9);
    }

    #[test]
    fn malformed_tokens_parse_to_none() {
        assert_eq!(parse_chat_context_token("@[obsius-context:!!!]"), None);
        assert_eq!(parse_chat_context_token("@[other:abc]"), None);

        // Valid base64, wrong version.
        let json = r#"{"version":2,"type":"file","notePath":"a.md","noteName":"a"}"#;
        let token = format!(
            "@[obsius-context:{}]",
            URL_SAFE_NO_PAD.encode(json.as_bytes())
        );
        assert_eq!(parse_chat_context_token(&token), None);
    }

    #[test]
    fn strip_tokens_removes_every_kind() {
        let reference = selection_reference();
        let token = format_chat_context_token(&reference);
        let slash = format_slash_command_token("review");
        let text = format!("please {token} look at {slash} this");
        assert_eq!(strip_tokens(&text), "please look at this");
    }

    #[test]
    fn extract_references_preserves_order() {
        let first = ChatContextReference {
            kind: ChatContextKind::File,
            note_path: "a.md".into(),
            note_name: "a".into(),
            selection: None,
        };
        let second = ChatContextReference {
            kind: ChatContextKind::Folder,
            note_path: "notes".into(),
            note_name: "notes".into(),
            selection: None,
        };
        let text = format!(
            "{} and {}",
            format_chat_context_token(&first),
            format_chat_context_token(&second)
        );
        let refs = extract_context_references(&text);
        assert_eq!(refs, vec![first, second]);
    }

    #[test]
    fn note_mentions_are_parsed_and_stripped() {
        let text = "see @[[Design Doc]] and @[[Roadmap]] for details";
        assert_eq!(extract_note_mentions(text), vec!["Design Doc", "Roadmap"]);
        assert_eq!(strip_note_mentions(text), "see and for details");
    }

    #[test]
    fn slash_token_round_trips() {
        let token = format_slash_command_token("compact");
        assert_eq!(parse_slash_command_token(&token), Some("compact"));
    }

    #[test]
    fn file_reference_drops_selection_on_normalize() {
        let reference = ChatContextReference {
            kind: ChatContextKind::File,
            note_path: "a.md".into(),
            note_name: "a".into(),
            selection: Some(EditorSelection {
                from: EditorPosition { line: 0, ch: 0 },
                to: EditorPosition { line: 1, ch: 0 },
            }),
        };
        assert_eq!(normalize_chat_context_reference(reference).selection, None);
    }
}
