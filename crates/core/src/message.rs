//! Message and Conversation domain types.
//!
//! These are the core value objects that flow through the pipeline:
//! a user message arrives → it is persisted → compact context is assembled →
//! the model answers → the assistant message is persisted with usage metrics.
//!
//! A message's role is never stored. It is **derived** from the
//! request/response link: a message with no `request_id` is a user request;
//! a message pointing at a request is the assistant's response to it.

use crate::tool::ToolCall;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage-assigned identifier for a conversation.
pub type ConversationId = i64;

/// Storage-assigned identifier for a message.
pub type MessageId = i64;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions (grounding rules, context digests)
    System,
    /// Tool execution result
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// A conversation: a titled container for request/response message pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Optional title (auto-generated on first message or user-set)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Optional rolling summary of the whole conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,
}

/// Token usage and price attached to an assistant message after generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cached_tokens: u32,
    pub model: String,
    pub price: f64,
}

/// A persisted message.
///
/// Invariant: `request_id == None` ⇔ this is a user message;
/// `request_id == Some(_)` ⇔ this is an assistant response and the
/// referenced message is a user message in the same conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Unique message ID
    pub id: MessageId,

    /// The conversation this message belongs to
    pub conversation_id: ConversationId,

    /// For assistant responses: the user message being answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<MessageId>,

    /// The full text content
    pub text: String,

    /// Optional model-generated summary of a long message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Usage metrics, attached after generation completes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<MessageUsage>,

    /// Timestamp
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    /// The derived role: user if this message answers nothing.
    pub fn role(&self) -> Role {
        if self.request_id.is_none() {
            Role::User
        } else {
            Role::Assistant
        }
    }

    /// The content preferred for compact context: summary when present,
    /// full text otherwise.
    pub fn compact_content(&self) -> &str {
        self.summary.as_deref().unwrap_or(&self.text)
    }
}

/// The fields needed to persist a new message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<MessageId>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl NewMessage {
    /// A new user message (no request link).
    pub fn user(
        conversation_id: ConversationId,
        text: impl Into<String>,
        summary: Option<String>,
    ) -> Self {
        Self {
            conversation_id,
            request_id: None,
            text: text.into(),
            summary,
        }
    }

    /// A new assistant response linked to the user message it answers.
    pub fn assistant(
        conversation_id: ConversationId,
        request_id: MessageId,
        text: impl Into<String>,
        summary: Option<String>,
    ) -> Self {
        Self {
            conversation_id,
            request_id: Some(request_id),
            text: text.into(),
            summary,
        }
    }
}

/// One page of a conversation's messages, ordered oldest → newest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePage {
    pub items: Vec<StoredMessage>,
    /// Total messages in the conversation, independent of this page.
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// A compact `{role, content}` entry — the unit of model-ready context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactEntry {
    pub role: Role,
    pub content: String,
}

impl CompactEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

impl From<&StoredMessage> for CompactEntry {
    fn from(m: &StoredMessage) -> Self {
        Self {
            role: m.role(),
            content: m.compact_content().to_string(),
        }
    }
}

/// A transient wire message for an augmented model transcript.
///
/// Unlike [`StoredMessage`] these are never persisted — they exist only for
/// the duration of a tool-dispatch round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// An assistant turn carrying tool-call requests.
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// A tool output message answering a specific tool call.
    pub fn tool_output(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

impl From<&CompactEntry> for ChatMessage {
    fn from(e: &CompactEntry) -> Self {
        Self {
            role: e.role,
            content: e.content.clone(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(request_id: Option<MessageId>, text: &str, summary: Option<&str>) -> StoredMessage {
        StoredMessage {
            id: 1,
            conversation_id: 1,
            request_id,
            text: text.into(),
            summary: summary.map(String::from),
            usage: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn role_derived_from_request_link() {
        assert_eq!(stored(None, "hi", None).role(), Role::User);
        assert_eq!(stored(Some(7), "hello!", None).role(), Role::Assistant);
    }

    #[test]
    fn compact_content_prefers_summary() {
        let m = stored(None, "a very long message about dragons", Some("dragons"));
        assert_eq!(m.compact_content(), "dragons");

        let m = stored(None, "short", None);
        assert_eq!(m.compact_content(), "short");
    }

    #[test]
    fn compact_entry_from_stored_message() {
        let m = stored(Some(3), "full reply text", Some("reply digest"));
        let e = CompactEntry::from(&m);
        assert_eq!(e.role, Role::Assistant);
        assert_eq!(e.content, "reply digest");
    }

    #[test]
    fn chat_message_tool_output_links_call() {
        let msg = ChatMessage::tool_output("call_1", r#"{"recommendations":[]}"#);
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn message_serialization_roundtrip() {
        let m = stored(Some(4), "text", None);
        let json = serde_json::to_string(&m).unwrap();
        let back: StoredMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.request_id, Some(4));
        assert_eq!(back.role(), Role::Assistant);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }
}
