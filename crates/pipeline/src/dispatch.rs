//! The tool dispatch loop — the two-call retrieval protocol.
//!
//! Call one offers the catalog tools. If the model answers directly, that
//! text is final. If it requests tools, each call executes against the
//! registry; failures become structured error objects in the tool output
//! so the model can still answer. Call two generates the final response
//! over the augmented transcript under grounding instructions.

use shelftalk_core::error::Error;
use shelftalk_core::gateway::{ModelGateway, RequestedToolCall};
use shelftalk_core::message::{ChatMessage, CompactEntry};
use shelftalk_core::tool::{ToolCall, ToolRegistry};
use shelftalk_core::usage::{ScopedUsage, UsageScope};
use std::sync::Arc;
use tracing::{debug, warn};

/// The grounding contract for the final answer: catalog claims come only
/// from tool output, and an empty result is said out loud.
pub const FINAL_ANSWER_INSTRUCTIONS: &str = "You are a book recommendation assistant. Base \
    every statement about books strictly on the tool outputs in this conversation — only \
    mention titles, authors and summaries that appear there. If a tool output shows no \
    matches, say plainly that no match was found and offer to search differently. Never \
    invent catalog data.";

/// The outcome of one dispatch round.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// The final answer text.
    pub answer: String,
    /// Usage for the one or two model calls, in call order.
    pub usage: Vec<ScopedUsage>,
    /// Names of the tools that were invoked (empty for direct answers).
    pub invoked_tools: Vec<String>,
}

pub struct ToolDispatchLoop {
    gateway: Arc<dyn ModelGateway>,
    tools: Arc<ToolRegistry>,
}

impl ToolDispatchLoop {
    pub fn new(gateway: Arc<dyn ModelGateway>, tools: Arc<ToolRegistry>) -> Self {
        Self { gateway, tools }
    }

    /// Answer the user message over the given compact context.
    pub async fn answer(
        &self,
        user_text: &str,
        context: &[CompactEntry],
    ) -> Result<DispatchOutcome, Error> {
        let definitions = self.tools.definitions();
        let (turn, selection_usage) = self
            .gateway
            .generate_with_tools(user_text, context, &definitions)
            .await?;

        if turn.tool_calls.is_empty() {
            debug!("Model answered directly, no tools invoked");
            return Ok(DispatchOutcome {
                answer: turn.content.trim().to_string(),
                usage: vec![ScopedUsage::new(UsageScope::FinalAnswer, selection_usage)],
                invoked_tools: Vec::new(),
            });
        }

        debug!(count = turn.tool_calls.len(), "Executing requested tool calls");

        // Build the augmented transcript: grounding rules, prior context,
        // the user message, the assistant's tool request, then one output
        // message per call.
        let mut transcript = vec![ChatMessage::system(FINAL_ANSWER_INSTRUCTIONS)];
        transcript.extend(context.iter().map(ChatMessage::from));
        transcript.push(ChatMessage::user(user_text));

        let mut resolved_calls = Vec::with_capacity(turn.tool_calls.len());
        let mut outputs = Vec::with_capacity(turn.tool_calls.len());
        let mut invoked_tools = Vec::with_capacity(turn.tool_calls.len());

        for requested in &turn.tool_calls {
            invoked_tools.push(requested.name.clone());
            let (call, output) = self.execute_requested(requested).await;
            resolved_calls.push(call);
            outputs.push((requested.id.clone(), output));
        }

        transcript.push(ChatMessage::assistant_with_tools(
            turn.content.clone(),
            resolved_calls,
        ));
        for (call_id, output) in outputs {
            transcript.push(ChatMessage::tool_output(call_id, output));
        }

        let (answer, final_usage) = self.gateway.generate_final_response(&transcript).await?;

        Ok(DispatchOutcome {
            answer: answer.trim().to_string(),
            usage: vec![
                ScopedUsage::new(UsageScope::ToolSelection, selection_usage),
                ScopedUsage::new(UsageScope::FinalAnswer, final_usage),
            ],
            invoked_tools,
        })
    }

    /// Execute one requested call. Unparseable arguments, unknown tool
    /// names and execution errors all fold into a structured error object
    /// serialized as the call's output.
    async fn execute_requested(&self, requested: &RequestedToolCall) -> (ToolCall, String) {
        let arguments: serde_json::Value = match serde_json::from_str(&requested.arguments) {
            Ok(value) => value,
            Err(e) => {
                warn!(tool = %requested.name, error = %e, "Unparseable tool arguments");
                let call = ToolCall {
                    id: requested.id.clone(),
                    name: requested.name.clone(),
                    arguments: serde_json::Value::String(requested.arguments.clone()),
                };
                let output = serde_json::json!({
                    "error": format!("invalid arguments for {}: {e}", requested.name)
                })
                .to_string();
                return (call, output);
            }
        };

        let call = ToolCall {
            id: requested.id.clone(),
            name: requested.name.clone(),
            arguments,
        };

        let output = match self.tools.execute(&call).await {
            Ok(result) => result.output,
            Err(e) => {
                warn!(tool = %requested.name, error = %e, "Tool execution failed");
                serde_json::json!({ "error": e.to_string() }).to_string()
            }
        };

        (call, output)
    }
}
