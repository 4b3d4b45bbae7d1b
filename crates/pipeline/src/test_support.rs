//! Scripted gateway for pipeline tests.
//!
//! Each call site pops from its own queue of scripted results; unscripted
//! calls fall back to benign defaults so tests only script what they
//! assert on. Inputs are recorded for inspection.

use async_trait::async_trait;
use shelftalk_core::error::GatewayError;
use shelftalk_core::gateway::{ModelGateway, ModelTurn};
use shelftalk_core::intent::{ContextNeed, IntentEnvelope};
use shelftalk_core::message::{ChatMessage, CompactEntry};
use shelftalk_core::tool::ToolDefinition;
use shelftalk_core::usage::UsageRecord;
use std::collections::VecDeque;
use std::sync::Mutex;

type Scripted<T> = Mutex<VecDeque<Result<(T, UsageRecord), GatewayError>>>;

#[derive(Default)]
struct Recorded {
    intent_calls: usize,
    summarize_calls: usize,
    final_calls: usize,
    intent_exchanges: Vec<Vec<CompactEntry>>,
    with_tools_contexts: Vec<Vec<CompactEntry>>,
    final_transcripts: Vec<Vec<ChatMessage>>,
}

pub struct ScriptedGateway {
    titles: Scripted<String>,
    intents: Scripted<IntentEnvelope>,
    summaries: Scripted<String>,
    tool_turns: Scripted<ModelTurn>,
    finals: Scripted<String>,
    recorded: Mutex<Recorded>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            titles: Mutex::new(VecDeque::new()),
            intents: Mutex::new(VecDeque::new()),
            summaries: Mutex::new(VecDeque::new()),
            tool_turns: Mutex::new(VecDeque::new()),
            finals: Mutex::new(VecDeque::new()),
            recorded: Mutex::new(Recorded::default()),
        }
    }

    pub fn usage(input: u32, output: u32) -> UsageRecord {
        UsageRecord {
            input_tokens: input,
            output_tokens: output,
            cached_tokens: 0,
            model: "gpt-4.1".into(),
        }
    }

    fn utility_usage(input: u32, output: u32) -> UsageRecord {
        UsageRecord {
            input_tokens: input,
            output_tokens: output,
            cached_tokens: 0,
            model: "gpt-4.1-mini".into(),
        }
    }

    pub fn push_title(&self, result: Result<(String, UsageRecord), GatewayError>) {
        self.titles.lock().unwrap().push_back(result);
    }

    pub fn push_intent(&self, result: Result<(IntentEnvelope, UsageRecord), GatewayError>) {
        self.intents.lock().unwrap().push_back(result);
    }

    pub fn push_summary(&self, result: Result<(String, UsageRecord), GatewayError>) {
        self.summaries.lock().unwrap().push_back(result);
    }

    pub fn push_tool_turn(&self, result: Result<(ModelTurn, UsageRecord), GatewayError>) {
        self.tool_turns.lock().unwrap().push_back(result);
    }

    pub fn push_final(&self, result: Result<(String, UsageRecord), GatewayError>) {
        self.finals.lock().unwrap().push_back(result);
    }

    pub fn intent_calls(&self) -> usize {
        self.recorded.lock().unwrap().intent_calls
    }

    pub fn summarize_calls(&self) -> usize {
        self.recorded.lock().unwrap().summarize_calls
    }

    pub fn final_calls(&self) -> usize {
        self.recorded.lock().unwrap().final_calls
    }

    pub fn recorded_intent_exchanges(&self) -> Vec<Vec<CompactEntry>> {
        self.recorded.lock().unwrap().intent_exchanges.clone()
    }

    pub fn recorded_with_tools_contexts(&self) -> Vec<Vec<CompactEntry>> {
        self.recorded.lock().unwrap().with_tools_contexts.clone()
    }

    pub fn recorded_final_transcripts(&self) -> Vec<Vec<ChatMessage>> {
        self.recorded.lock().unwrap().final_transcripts.clone()
    }
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_title(&self, _text: &str) -> Result<(String, UsageRecord), GatewayError> {
        self.titles
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(("Test chat".into(), Self::utility_usage(10, 4))))
    }

    async fn detect_intent(
        &self,
        _text: &str,
        recent_exchange: &[CompactEntry],
    ) -> Result<(IntentEnvelope, UsageRecord), GatewayError> {
        {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.intent_calls += 1;
            recorded.intent_exchanges.push(recent_exchange.to_vec());
        }
        self.intents.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok((
                IntentEnvelope::new(ContextNeed::None),
                Self::utility_usage(20, 2),
            ))
        })
    }

    async fn summarize(
        &self,
        text: &str,
        _max_words: usize,
    ) -> Result<(String, UsageRecord), GatewayError> {
        self.recorded.lock().unwrap().summarize_calls += 1;
        self.summaries.lock().unwrap().pop_front().unwrap_or_else(|| {
            let snippet: String = text.chars().take(40).collect();
            Ok((format!("digest: {snippet}"), Self::utility_usage(50, 12)))
        })
    }

    async fn generate_with_tools(
        &self,
        _user_message: &str,
        context: &[CompactEntry],
        _tools: &[ToolDefinition],
    ) -> Result<(ModelTurn, UsageRecord), GatewayError> {
        {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.with_tools_contexts.push(context.to_vec());
        }
        self.tool_turns.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok((
                ModelTurn::text("I'd be happy to help with books."),
                Self::usage(60, 12),
            ))
        })
    }

    async fn generate_final_response(
        &self,
        transcript: &[ChatMessage],
    ) -> Result<(String, UsageRecord), GatewayError> {
        {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.final_calls += 1;
            recorded.final_transcripts.push(transcript.to_vec());
        }
        self.finals
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(("Here is what I found.".into(), Self::usage(120, 30))))
    }
}
