//! Content blocks exchanged in prompts and session updates.
//!
//! A prompt is a sequence of content blocks. Plain text and images cover
//! what the user typed; `resource` blocks deliver embedded context (note
//! contents, selections) to agents that support it, and `resource_link`
//! blocks reference a resource by URI without attaching bytes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single block of prompt or message content.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain UTF-8 text.
    Text(TextContent),
    /// Base64-encoded image data.
    Image(ImageContent),
    /// An embedded resource with its full contents attached.
    Resource(ResourceContent),
    /// A link to a resource the agent may fetch itself.
    ResourceLink(ResourceLink),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text(TextContent {
            text: text.into(),
            annotations: None,
        })
    }

    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        ContentBlock::Image(ImageContent {
            data: data.into(),
            mime_type: mime_type.into(),
        })
    }

    pub fn resource(resource: EmbeddedResource) -> Self {
        ContentBlock::Resource(ResourceContent { resource })
    }
}

/// Plain text content.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

/// Base64-encoded image content.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    pub data: String,
    pub mime_type: String,
}

/// Wrapper for an embedded resource block.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    pub resource: EmbeddedResource,
}

/// A resource delivered inline: URI, media type, and full text.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedResource {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

impl EmbeddedResource {
    pub fn new(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type: None,
            text: text.into(),
            annotations: None,
        }
    }

    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    #[must_use]
    pub fn with_last_modified(mut self, last_modified: impl Into<String>) -> Self {
        self.annotations = Some(Annotations {
            last_modified: Some(last_modified.into()),
        });
        self
    }
}

/// Reference to a resource by URI, without attaching its contents.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLink {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Optional metadata attached to content.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Annotations {
    /// RFC 3339 timestamp of the last modification of the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}
