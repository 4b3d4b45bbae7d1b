//! ModelGateway trait — the abstraction over the generative model.
//!
//! The pipeline makes five distinct kinds of model call: title generation,
//! intent classification, summarization, tool selection, and final answer
//! generation. Every call returns its own [`UsageRecord`] so the pipeline
//! can meter the whole multi-step exchange.

use crate::error::GatewayError;
use crate::intent::IntentEnvelope;
use crate::message::{ChatMessage, CompactEntry};
use crate::tool::ToolDefinition;
use crate::usage::UsageRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A tool call as requested by the model — arguments still raw JSON text.
///
/// Parsing the argument string is the dispatch loop's job so that a
/// malformed payload can be reported back to the model instead of
/// aborting the turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestedToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON string
    pub arguments: String,
}

/// One model turn from the tool-selection call: either a direct answer
/// (no tool calls) or a set of tool invocations to execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTurn {
    /// The text content of the turn (may be empty when tools are called)
    pub content: String,

    /// Requested tool invocations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<RequestedToolCall>,
}

impl ModelTurn {
    /// A plain text turn with no tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// The generative-model collaborator.
///
/// Every method is a logical network boundary and a valid suspension point.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// A human-readable name for this gateway (e.g., "openai").
    fn name(&self) -> &str;

    /// Generate a short conversation title from the first user message.
    async fn generate_title(
        &self,
        text: &str,
    ) -> std::result::Result<(String, UsageRecord), GatewayError>;

    /// Decide how much prior context the message needs. `recent_exchange`
    /// carries the latest user/assistant pair when one exists.
    async fn detect_intent(
        &self,
        text: &str,
        recent_exchange: &[CompactEntry],
    ) -> std::result::Result<(IntentEnvelope, UsageRecord), GatewayError>;

    /// Compress `text` to at most `max_words` words, preserving concrete
    /// entities (titles, names, numbers).
    async fn summarize(
        &self,
        text: &str,
        max_words: usize,
    ) -> std::result::Result<(String, UsageRecord), GatewayError>;

    /// Ask the model to answer directly or request retrieval tools.
    async fn generate_with_tools(
        &self,
        user_message: &str,
        context: &[CompactEntry],
        tools: &[ToolDefinition],
    ) -> std::result::Result<(ModelTurn, UsageRecord), GatewayError>;

    /// Generate the final answer over an augmented transcript that already
    /// contains tool outputs.
    async fn generate_final_response(
        &self,
        transcript: &[ChatMessage],
    ) -> std::result::Result<(String, UsageRecord), GatewayError>;
}
