//! OpenAI-compatible gateway implementation.
//!
//! Works with any endpoint exposing `/v1/chat/completions`. Each of the
//! five pipeline call sites maps onto one chat-completion request with a
//! purpose-specific system prompt and model; intent detection uses a
//! structured-output JSON schema so the verdict parses into the closed
//! [`ContextNeed`] enumeration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shelftalk_config::PipelineConfig;
use shelftalk_core::error::GatewayError;
use shelftalk_core::gateway::{ModelGateway, ModelTurn, RequestedToolCall};
use shelftalk_core::intent::IntentEnvelope;
use shelftalk_core::message::{ChatMessage, CompactEntry, Role};
use shelftalk_core::tool::ToolDefinition;
use shelftalk_core::usage::UsageRecord;
use tracing::{debug, warn};

const TITLE_INSTRUCTIONS: &str =
    "Create a 3-8 word concise title for a book-recommendation chat.";

const INTENT_INSTRUCTIONS: &str = "You decide how much prior conversation is needed to answer \
    the user's latest message. Work in any language: short affirmations, pronouns and \
    continuation markers refer back to the previous exchange regardless of language. \
    Return JSON with one field context_need: 'none' when the message stands alone, \
    'last_message' when it refers to the previous exchange, 'full' when it depends on the \
    broader conversation.";

const TOOL_SELECTION_INSTRUCTIONS: &str = "You are a book recommendation assistant. Use the \
    provided tools to look up catalog data whenever the user asks about books; answer \
    directly only when no catalog data is needed.";

/// Which model serves which call site.
#[derive(Debug, Clone)]
pub struct GatewayModels {
    pub chat: String,
    pub title: String,
    pub intent: String,
    pub summary: String,
}

impl Default for GatewayModels {
    fn default() -> Self {
        Self {
            chat: "gpt-4.1".into(),
            title: "gpt-4.1-mini".into(),
            intent: "gpt-4.1-mini".into(),
            summary: "gpt-4.1-mini".into(),
        }
    }
}

/// An OpenAI-compatible model gateway.
pub struct OpenAiGateway {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    models: GatewayModels,
    temperature: f32,
    max_answer_tokens: u32,
}

impl OpenAiGateway {
    /// Create a new gateway against an OpenAI-compatible endpoint.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
            models: GatewayModels::default(),
            temperature: 0.7,
            max_answer_tokens: 600,
        }
    }

    /// Build a gateway from pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut gateway = Self::new(
            config.base_url.clone(),
            config.api_key.clone().unwrap_or_default(),
        );
        gateway.models = GatewayModels {
            chat: config.models.chat.clone(),
            title: config.models.title.clone(),
            intent: config.models.intent.clone(),
            summary: config.models.summary.clone(),
        };
        gateway.temperature = config.temperature;
        gateway.max_answer_tokens = config.max_answer_tokens;
        gateway
    }

    /// Override the per-purpose model names.
    pub fn with_models(mut self, models: GatewayModels) -> Self {
        self.models = models;
        self
    }

    /// Override the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn context_to_api(context: &[CompactEntry]) -> Vec<ApiMessage> {
        context.iter().map(ApiMessage::from_entry).collect()
    }

    fn transcript_to_api(transcript: &[ChatMessage]) -> Vec<ApiMessage> {
        transcript.iter().map(ApiMessage::from_chat).collect()
    }

    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    /// One chat-completion round trip.
    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatOutcome, GatewayError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": self.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(request.tools));
        }
        if let Some(format) = request.response_format {
            body["response_format"] = format;
        }

        debug!(model = %request.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(e.to_string())
                } else {
                    GatewayError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(GatewayError::RateLimited { retry_after_secs: 5 });
        }
        if status == 401 || status == 403 {
            return Err(GatewayError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Model endpoint returned error");
            return Err(GatewayError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(format!("Failed to parse response: {e}")))?;

        let usage = usage_from_api(api_response.usage.as_ref(), &api_response.model, request.model);

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::MalformedResponse("No choices in response".into()))?;

        Ok(ChatOutcome {
            message: choice.message,
            usage,
        })
    }
}

/// Convert API usage to a [`UsageRecord`], attributing the model the
/// endpoint reports (falling back to the requested name).
fn usage_from_api(usage: Option<&ApiUsage>, reported_model: &str, requested_model: &str) -> UsageRecord {
    let model = if reported_model.is_empty() {
        requested_model
    } else {
        reported_model
    };
    match usage {
        Some(u) => UsageRecord {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            cached_tokens: u
                .prompt_tokens_details
                .as_ref()
                .map(|d| d.cached_tokens)
                .unwrap_or(0),
            model: model.into(),
        },
        None => UsageRecord::zero(model),
    }
}

struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    tools: &'a [ToolDefinition],
    max_tokens: Option<u32>,
    response_format: Option<serde_json::Value>,
}

struct ChatOutcome {
    message: ApiMessage,
    usage: UsageRecord,
}

/// The JSON schema constraining the intent verdict to the closed enum.
fn intent_response_format() -> serde_json::Value {
    serde_json::json!({
        "type": "json_schema",
        "json_schema": {
            "name": "context_need",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "context_need": {
                        "type": "string",
                        "enum": ["none", "last_message", "full"]
                    }
                },
                "required": ["context_need"],
                "additionalProperties": false
            }
        }
    })
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate_title(&self, text: &str) -> Result<(String, UsageRecord), GatewayError> {
        let outcome = self
            .chat(ChatRequest {
                model: &self.models.title,
                messages: vec![
                    ApiMessage::system(TITLE_INSTRUCTIONS),
                    ApiMessage::user(text),
                ],
                tools: &[],
                max_tokens: Some(32),
                response_format: None,
            })
            .await?;

        let title = outcome
            .message
            .content
            .unwrap_or_default()
            .trim()
            .trim_matches('"')
            .to_string();
        Ok((title, outcome.usage))
    }

    async fn detect_intent(
        &self,
        text: &str,
        recent_exchange: &[CompactEntry],
    ) -> Result<(IntentEnvelope, UsageRecord), GatewayError> {
        let mut messages = vec![ApiMessage::system(INTENT_INSTRUCTIONS)];
        messages.extend(Self::context_to_api(recent_exchange));
        messages.push(ApiMessage::user(text));

        let outcome = self
            .chat(ChatRequest {
                model: &self.models.intent,
                messages,
                tools: &[],
                max_tokens: Some(32),
                response_format: Some(intent_response_format()),
            })
            .await?;

        let raw = outcome.message.content.unwrap_or_default();
        let envelope: IntentEnvelope = serde_json::from_str(raw.trim())
            .map_err(|e| GatewayError::MalformedResponse(format!("intent verdict: {e}")))?;
        Ok((envelope, outcome.usage))
    }

    async fn summarize(
        &self,
        text: &str,
        max_words: usize,
    ) -> Result<(String, UsageRecord), GatewayError> {
        let instructions = format!(
            "Summarize in at most {max_words} words. Keep book titles, author names and \
             numbers exactly as written; keep the user's goals and constraints."
        );
        let outcome = self
            .chat(ChatRequest {
                model: &self.models.summary,
                messages: vec![ApiMessage::system(&instructions), ApiMessage::user(text)],
                tools: &[],
                max_tokens: Some(200),
                response_format: None,
            })
            .await?;

        let summary = outcome.message.content.unwrap_or_default().trim().to_string();
        Ok((summary, outcome.usage))
    }

    async fn generate_with_tools(
        &self,
        user_message: &str,
        context: &[CompactEntry],
        tools: &[ToolDefinition],
    ) -> Result<(ModelTurn, UsageRecord), GatewayError> {
        let mut messages = vec![ApiMessage::system(TOOL_SELECTION_INSTRUCTIONS)];
        messages.extend(Self::context_to_api(context));
        messages.push(ApiMessage::user(user_message));

        let outcome = self
            .chat(ChatRequest {
                model: &self.models.chat,
                messages,
                tools,
                max_tokens: Some(self.max_answer_tokens),
                response_format: None,
            })
            .await?;

        let tool_calls = outcome
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| RequestedToolCall {
                id: if tc.id.is_empty() {
                    uuid::Uuid::new_v4().to_string()
                } else {
                    tc.id
                },
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let turn = ModelTurn {
            content: outcome.message.content.unwrap_or_default(),
            tool_calls,
        };
        Ok((turn, outcome.usage))
    }

    async fn generate_final_response(
        &self,
        transcript: &[ChatMessage],
    ) -> Result<(String, UsageRecord), GatewayError> {
        let outcome = self
            .chat(ChatRequest {
                model: &self.models.chat,
                messages: Self::transcript_to_api(transcript),
                tools: &[],
                max_tokens: Some(self.max_answer_tokens),
                response_format: None,
            })
            .await?;

        let text = outcome.message.content.unwrap_or_default().trim().to_string();
        Ok((text, outcome.usage))
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn system(content: &str) -> Self {
        Self {
            role: "system".into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn user(content: &str) -> Self {
        Self {
            role: "user".into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn role_name(role: Role) -> String {
        match role {
            Role::User => "user".into(),
            Role::Assistant => "assistant".into(),
            Role::System => "system".into(),
            Role::Tool => "tool".into(),
        }
    }

    fn from_entry(entry: &CompactEntry) -> Self {
        Self {
            role: Self::role_name(entry.role),
            content: Some(entry.content.clone()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn from_chat(message: &ChatMessage) -> Self {
        Self {
            role: Self::role_name(message.role),
            content: Some(message.content.clone()),
            tool_calls: if message.tool_calls.is_empty() {
                None
            } else {
                Some(
                    message
                        .tool_calls
                        .iter()
                        .map(|tc| ApiToolCall {
                            id: tc.id.clone(),
                            r#type: "function".into(),
                            function: ApiFunction {
                                name: tc.name.clone(),
                                arguments: tc.arguments.to_string(),
                            },
                        })
                        .collect(),
                )
            },
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    #[serde(default)]
    prompt_tokens_details: Option<ApiPromptTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct ApiPromptTokensDetails {
    #[serde(default)]
    cached_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelftalk_core::tool::ToolCall;

    #[test]
    fn context_conversion_keeps_roles() {
        let context = vec![
            CompactEntry::user("any fantasy picks?"),
            CompactEntry::assistant("Try The Hobbit."),
        ];
        let api = OpenAiGateway::context_to_api(&context);
        assert_eq!(api.len(), 2);
        assert_eq!(api[0].role, "user");
        assert_eq!(api[1].role, "assistant");
    }

    #[test]
    fn transcript_conversion_serializes_tool_calls() {
        let transcript = vec![
            ChatMessage::assistant_with_tools(
                "",
                vec![ToolCall {
                    id: "call_1".into(),
                    name: "get_book_recommendations".into(),
                    arguments: serde_json::json!({"genres": ["fantasy"]}),
                }],
            ),
            ChatMessage::tool_output("call_1", r#"{"recommendations":[]}"#),
        ];
        let api = OpenAiGateway::transcript_to_api(&transcript);
        let tc = api[0].tool_calls.as_ref().unwrap();
        assert_eq!(tc[0].function.name, "get_book_recommendations");
        assert!(tc[0].function.arguments.contains("fantasy"));
        assert_eq!(api[1].role, "tool");
        assert_eq!(api[1].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn usage_extraction_includes_cached_tokens() {
        let data = r#"{
            "model": "gpt-4.1-2025-04-14",
            "choices": [{"message": {"role": "assistant", "content": "ok"}}],
            "usage": {
                "prompt_tokens": 100,
                "completion_tokens": 20,
                "prompt_tokens_details": {"cached_tokens": 64}
            }
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let usage = usage_from_api(parsed.usage.as_ref(), &parsed.model, "gpt-4.1");
        assert_eq!(usage.input_tokens, 100);
        assert_eq!(usage.output_tokens, 20);
        assert_eq!(usage.cached_tokens, 64);
        assert_eq!(usage.model, "gpt-4.1-2025-04-14");
    }

    #[test]
    fn missing_usage_falls_back_to_zero_with_requested_model() {
        let usage = usage_from_api(None, "", "gpt-4.1-mini");
        assert!(usage.is_zero());
        assert_eq!(usage.model, "gpt-4.1-mini");
    }

    #[test]
    fn intent_schema_constrains_to_closed_enum() {
        let format = intent_response_format();
        let values = format["json_schema"]["schema"]["properties"]["context_need"]["enum"]
            .as_array()
            .unwrap();
        assert_eq!(values.len(), 3);
        assert!(values.contains(&serde_json::json!("last_message")));
    }

    #[test]
    fn parse_tool_call_response() {
        let data = r#"{
            "model": "gpt-4.1",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {
                            "name": "get_book_recommendations",
                            "arguments": "{\"genres\":[\"fantasy\"],\"limit\":5}"
                        }
                    }]
                }
            }],
            "usage": {"prompt_tokens": 50, "completion_tokens": 12}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let tc = parsed.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(tc[0].function.name, "get_book_recommendations");
        assert!(parsed.choices[0].message.content.is_none());
    }

    #[test]
    fn summarize_instructions_preserve_entities() {
        // The prompt text is the contract: concrete nouns survive the digest.
        let instructions = format!(
            "Summarize in at most {} words. Keep book titles, author names and \
             numbers exactly as written; keep the user's goals and constraints.",
            80
        );
        assert!(instructions.contains("book titles"));
        assert!(instructions.contains("author names"));
        assert!(instructions.contains("numbers"));
    }

    #[test]
    fn from_config_wires_models_and_endpoint() {
        let mut config = PipelineConfig::default();
        config.models.chat = "gpt-4o".into();
        config.base_url = "https://example.test/v1/".into();
        let gateway = OpenAiGateway::from_config(&config);
        assert_eq!(gateway.models.chat, "gpt-4o");
        assert_eq!(gateway.base_url, "https://example.test/v1");
    }
}
