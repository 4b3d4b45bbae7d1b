//! The chat pipeline — the top-level state machine for one exchange.
//!
//! Steps run strictly in order and each output is consumed exactly once:
//! ensure conversation → persist user message → invalidate cache →
//! classify intent → assemble context → dispatch/answer → maybe summarize
//! answer → persist assistant message → aggregate usage and price →
//! persist usage. A failure after the user message is persisted leaves it
//! persisted and surfaces the error; no partial assistant message is ever
//! fabricated.

use crate::assembler::ContextAssembler;
use crate::cache::ContextCache;
use crate::classifier::IntentClassifier;
use crate::dispatch::ToolDispatchLoop;
use crate::summarizer::Summarizer;
use shelftalk_config::PipelineConfig;
use shelftalk_core::error::{Error, StorageError};
use shelftalk_core::gateway::ModelGateway;
use shelftalk_core::intent::ContextNeed;
use shelftalk_core::message::{
    Conversation, ConversationId, MessageId, MessageUsage, NewMessage,
};
use shelftalk_core::repository::Repository;
use shelftalk_core::tool::ToolRegistry;
use shelftalk_core::usage::{ScopedUsage, UsageScope};
use shelftalk_telemetry::{ModelRates, PricingTable, UsageAccountant};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything the caller gets back for one completed exchange.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub conversation_id: ConversationId,
    pub request_message_id: MessageId,
    pub response_message_id: MessageId,
    pub answer: String,
    pub context_need: ContextNeed,
    /// Aggregated usage as persisted on the assistant message.
    pub usage: MessageUsage,
    /// Per-call-site breakdown in call order.
    pub breakdown: Vec<ScopedUsage>,
}

pub struct ChatPipeline {
    repo: Arc<dyn Repository>,
    gateway: Arc<dyn ModelGateway>,
    cache: Arc<ContextCache>,
    assembler: ContextAssembler,
    classifier: IntentClassifier,
    summarizer: Arc<Summarizer>,
    dispatch: ToolDispatchLoop,
    accountant: UsageAccountant,
}

impl ChatPipeline {
    /// Wire a pipeline from its collaborators and configuration.
    pub fn new(
        repo: Arc<dyn Repository>,
        gateway: Arc<dyn ModelGateway>,
        tools: Arc<ToolRegistry>,
        pricing: Arc<PricingTable>,
        config: &PipelineConfig,
    ) -> Self {
        for (model, rates) in &config.pricing {
            pricing.set(
                model.clone(),
                ModelRates::new(rates.input, rates.output, rates.cached_input),
            );
        }

        let cache = Arc::new(ContextCache::new(Duration::from_secs(
            config.context.cache_ttl_secs,
        )));
        let summarizer = Arc::new(Summarizer::new(gateway.clone(), &config.summarize));
        let assembler = ContextAssembler::new(
            repo.clone(),
            cache.clone(),
            summarizer.clone(),
            &config.context,
        );
        let classifier = IntentClassifier::new(repo.clone(), gateway.clone());
        let dispatch = ToolDispatchLoop::new(gateway.clone(), tools);
        let accountant = UsageAccountant::new(pricing);

        Self {
            repo,
            gateway,
            cache,
            assembler,
            classifier,
            summarizer,
            dispatch,
            accountant,
        }
    }

    /// Handle one user message end to end.
    pub async fn handle_user_message(
        &self,
        conversation_id: Option<ConversationId>,
        user_text: &str,
    ) -> Result<ChatOutcome, Error> {
        let mut breakdown: Vec<ScopedUsage> = Vec::new();

        // ── Conversation bootstrap ──
        let conversation = self
            .ensure_conversation(conversation_id, user_text, &mut breakdown)
            .await?;
        let cid = conversation.id;
        info!(conversation_id = cid, "Processing user message");

        // ── Persist user message (summarized when long) ──
        let (summary, summary_usage) = self.summarizer.summarize_user_message(user_text).await;
        if let Some(u) = summary_usage {
            breakdown.push(u);
        }
        let user_msg = self
            .repo
            .create_message(NewMessage::user(cid, user_text, summary))
            .await?;
        self.cache.invalidate(cid);

        // ── Classify intent ──
        let (intent, intent_usage) = self
            .classifier
            .classify(user_text, cid, user_msg.id)
            .await;
        if let Some(u) = intent_usage {
            breakdown.push(u);
        }
        debug!(need = %intent.context_need, "Context need classified");

        // ── Assemble compact context ──
        let context = self
            .assembler
            .compact_context(cid, intent.context_need)
            .await?;
        breakdown.extend(context.usage);

        // ── Dispatch / answer ──
        let outcome = self.dispatch.answer(user_text, &context.entries).await?;
        breakdown.extend(outcome.usage);

        // ── Summarize long answer ──
        let (answer_summary, answer_usage) = self
            .summarizer
            .summarize_assistant_message(&outcome.answer)
            .await;
        if let Some(u) = answer_usage {
            breakdown.push(u);
        }

        // ── Persist assistant message ──
        let assistant_msg = self
            .repo
            .create_message(NewMessage::assistant(
                cid,
                user_msg.id,
                outcome.answer.clone(),
                answer_summary,
            ))
            .await?;
        self.cache.invalidate(cid);

        // ── Aggregate usage, price, persist ──
        let usage = self.accountant.settle(&breakdown);
        self.repo.set_message_usage(assistant_msg.id, &usage).await?;
        for detail in &breakdown {
            let price = self.accountant.price_detail(detail);
            self.repo
                .add_usage_detail(assistant_msg.id, detail, price)
                .await?;
        }

        info!(
            conversation_id = cid,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            price = usage.price,
            tools = outcome.invoked_tools.len(),
            "Turn complete"
        );

        Ok(ChatOutcome {
            conversation_id: cid,
            request_message_id: user_msg.id,
            response_message_id: assistant_msg.id,
            answer: outcome.answer,
            context_need: intent.context_need,
            usage,
            breakdown,
        })
    }

    /// Resolve or create the conversation for this run. Title generation
    /// failing must not lose the turn; it degrades to a snippet title.
    async fn ensure_conversation(
        &self,
        conversation_id: Option<ConversationId>,
        user_text: &str,
        breakdown: &mut Vec<ScopedUsage>,
    ) -> Result<Conversation, Error> {
        match conversation_id {
            Some(id) => {
                let conversation = self
                    .repo
                    .get_conversation(id)
                    .await?
                    .ok_or(StorageError::ConversationNotFound(id))?;
                Ok(conversation)
            }
            None => {
                let title = match self.gateway.generate_title(user_text).await {
                    Ok((title, usage)) => {
                        breakdown.push(ScopedUsage::new(UsageScope::Title, usage));
                        let title = title.trim().to_string();
                        if title.is_empty() {
                            snippet_title(user_text)
                        } else {
                            title
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Title generation failed, using snippet");
                        snippet_title(user_text)
                    }
                };
                let conversation = self.repo.create_conversation(Some(title), None).await?;
                info!(conversation_id = conversation.id, "Conversation created");
                Ok(conversation)
            }
        }
    }
}

fn snippet_title(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "New chat".into();
    }
    let snippet: String = trimmed.chars().take(48).collect();
    if trimmed.chars().count() > 48 {
        format!("{snippet}…")
    } else {
        snippet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedGateway;
    use shelftalk_catalog::{StaticCatalog, default_registry};
    use shelftalk_core::error::GatewayError;
    use shelftalk_core::gateway::{ModelTurn, RequestedToolCall};
    use shelftalk_core::intent::IntentEnvelope;
    use shelftalk_core::usage::UsageRecord;
    use shelftalk_storage::InMemoryRepository;

    struct Fixture {
        repo: Arc<InMemoryRepository>,
        gateway: Arc<ScriptedGateway>,
        pipeline: ChatPipeline,
    }

    fn fixture() -> Fixture {
        fixture_with(PipelineConfig::default())
    }

    fn fixture_with(config: PipelineConfig) -> Fixture {
        let repo = Arc::new(InMemoryRepository::new());
        let gateway = Arc::new(ScriptedGateway::new());
        let registry = Arc::new(default_registry(Arc::new(StaticCatalog::sample())));
        let pricing = Arc::new(PricingTable::with_defaults());
        let pipeline = ChatPipeline::new(
            repo.clone(),
            gateway.clone(),
            registry,
            pricing,
            &config,
        );
        Fixture {
            repo,
            gateway,
            pipeline,
        }
    }

    fn tool_request() -> ModelTurn {
        ModelTurn {
            content: String::new(),
            tool_calls: vec![RequestedToolCall {
                id: "call_1".into(),
                name: "get_book_recommendations".into(),
                arguments: r#"{"genres":["fantasy"],"limit":3}"#.into(),
            }],
        }
    }

    #[tokio::test]
    async fn first_message_bootstraps_conversation_with_title() {
        let f = fixture();
        f.gateway.push_title(Ok((
            "Fantasy recommendations".into(),
            ScriptedGateway::usage(12, 5),
        )));
        f.gateway.push_tool_turn(Ok((
            ModelTurn::text("Tell me what you like to read!"),
            ScriptedGateway::usage(80, 20),
        )));

        let outcome = f
            .pipeline
            .handle_user_message(None, "hi, I need book ideas")
            .await
            .unwrap();

        let conversation = f
            .repo
            .get_conversation(outcome.conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.title.as_deref(), Some("Fantasy recommendations"));
        assert_eq!(outcome.answer, "Tell me what you like to read!");

        // First message: no history, so no intent call was made.
        assert_eq!(f.gateway.intent_calls(), 0);
        assert_eq!(outcome.context_need, ContextNeed::None);
    }

    #[tokio::test]
    async fn title_failure_degrades_to_snippet_not_abort() {
        let f = fixture();
        f.gateway
            .push_title(Err(GatewayError::Network("down".into())));

        let outcome = f
            .pipeline
            .handle_user_message(None, "recommend me a mystery novel please")
            .await
            .unwrap();

        let conversation = f
            .repo
            .get_conversation(outcome.conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            conversation.title.as_deref(),
            Some("recommend me a mystery novel please")
        );
    }

    #[tokio::test]
    async fn unknown_conversation_id_is_an_error() {
        let f = fixture();
        let err = f
            .pipeline
            .handle_user_message(Some(404), "hello?")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::ConversationNotFound(404))
        ));
    }

    #[tokio::test]
    async fn long_user_message_gets_stored_summary() {
        let f = fixture();
        f.gateway.push_summary(Ok((
            "Wants sprawling epics with maps and appendices.".into(),
            ScriptedGateway::usage(140, 18),
        )));

        let long_text = "I want something long and immersive ".repeat(15);
        assert!(long_text.chars().count() > 400);

        let outcome = f
            .pipeline
            .handle_user_message(None, &long_text)
            .await
            .unwrap();

        let stored = f.repo.message(outcome.request_message_id).unwrap();
        let summary = stored.summary.unwrap();
        assert!(summary.chars().count() < long_text.chars().count());
        assert!(
            outcome
                .breakdown
                .iter()
                .any(|s| s.scope == UsageScope::Summary)
        );
    }

    #[tokio::test]
    async fn tool_turn_aggregates_usage_across_all_calls() {
        let f = fixture();
        f.gateway.push_title(Ok((
            "Fantasy picks".into(),
            UsageRecord {
                input_tokens: 10,
                output_tokens: 5,
                cached_tokens: 0,
                model: "gpt-4.1-mini".into(),
            },
        )));
        f.gateway
            .push_tool_turn(Ok((tool_request(), ScriptedGateway::usage(200, 30))));
        f.gateway.push_final(Ok((
            "From the catalog: The Hobbit.".into(),
            UsageRecord {
                input_tokens: 400,
                output_tokens: 80,
                cached_tokens: 50,
                model: "gpt-4.1".into(),
            },
        )));

        let outcome = f
            .pipeline
            .handle_user_message(None, "recommend me a fantasy book")
            .await
            .unwrap();

        // title (10/5) + tool selection (200/30) + final (400/80).
        assert_eq!(outcome.usage.input_tokens, 610);
        assert_eq!(outcome.usage.output_tokens, 115);
        assert_eq!(outcome.usage.cached_tokens, 50);
        assert_eq!(outcome.usage.model, "gpt-4.1");
        assert!(outcome.usage.price > 0.0);

        // The aggregate is persisted on the assistant message…
        let stored = f.repo.message(outcome.response_message_id).unwrap();
        assert_eq!(stored.usage.unwrap(), outcome.usage);

        // …and the per-scope breakdown is persisted alongside it.
        let details = f.repo.usage_details_for(outcome.response_message_id);
        assert_eq!(details.len(), outcome.breakdown.len());
        let scopes: Vec<UsageScope> = details.iter().map(|d| d.detail.scope).collect();
        assert!(scopes.contains(&UsageScope::Title));
        assert!(scopes.contains(&UsageScope::ToolSelection));
        assert!(scopes.contains(&UsageScope::FinalAnswer));
    }

    #[tokio::test]
    async fn request_response_pair_is_linked() {
        let f = fixture();
        let outcome = f
            .pipeline
            .handle_user_message(None, "hello there")
            .await
            .unwrap();

        let user = f.repo.message(outcome.request_message_id).unwrap();
        let assistant = f.repo.message(outcome.response_message_id).unwrap();
        assert!(user.request_id.is_none());
        assert_eq!(assistant.request_id, Some(user.id));
        assert_eq!(assistant.conversation_id, user.conversation_id);
    }

    #[tokio::test]
    async fn follow_up_serves_context_including_latest_user_message() {
        let f = fixture();

        // Turn one.
        let first = f
            .pipeline
            .handle_user_message(None, "any fantasy picks?")
            .await
            .unwrap();

        // Turn two: classifier asks for the last exchange.
        f.gateway.push_intent(Ok((
            IntentEnvelope::new(ContextNeed::LastMessage),
            ScriptedGateway::usage(30, 3),
        )));
        f.pipeline
            .handle_user_message(Some(first.conversation_id), "yes")
            .await
            .unwrap();

        // The tool-selection call saw a fresh (post-invalidation) context
        // slice whose last entry is the triggering "yes".
        let contexts = f.gateway.recorded_with_tools_contexts();
        let second_context = &contexts[1];
        assert_eq!(second_context.len(), 2);
        assert_eq!(second_context.last().unwrap().content, "yes");
    }

    #[tokio::test]
    async fn generation_failure_keeps_user_message_and_surfaces_error() {
        let f = fixture();
        let first = f
            .pipeline
            .handle_user_message(None, "hello")
            .await
            .unwrap();
        let cid = first.conversation_id;

        f.gateway
            .push_tool_turn(Err(GatewayError::Timeout("model deadline".into())));

        let before = f.repo.list_messages(cid, 0, 100).await.unwrap().total;
        let err = f
            .pipeline
            .handle_user_message(Some(cid), "second question")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Gateway(_)));

        // The user message is durably persisted; no assistant reply was
        // fabricated for it.
        let page = f.repo.list_messages(cid, 0, 100).await.unwrap();
        assert_eq!(page.total, before + 1);
        let last = page.items.last().unwrap();
        assert_eq!(last.text, "second question");
        assert!(last.request_id.is_none());
    }

    #[tokio::test]
    async fn direct_answer_never_reports_zero_usage_as_success() {
        let f = fixture();
        f.gateway.push_tool_turn(Ok((
            ModelTurn::text("Hi!"),
            ScriptedGateway::usage(42, 7),
        )));

        let outcome = f.pipeline.handle_user_message(None, "hi").await.unwrap();
        assert!(outcome.usage.input_tokens > 0);
        assert!(
            outcome
                .breakdown
                .iter()
                .any(|s| s.scope == UsageScope::FinalAnswer)
        );
    }

    #[tokio::test]
    async fn config_pricing_override_applies() {
        let mut config = PipelineConfig::default();
        config.pricing.insert(
            "house-model".into(),
            shelftalk_config::PriceOverride {
                input: 1.0,
                output: 2.0,
                cached_input: 0.0,
            },
        );
        let f = fixture_with(config);

        f.gateway
            .push_title(Ok(("Chat".into(), UsageRecord::zero(""))));
        f.gateway.push_tool_turn(Ok((
            ModelTurn::text("Hello!"),
            UsageRecord {
                input_tokens: 1_000_000,
                output_tokens: 0,
                cached_tokens: 0,
                model: "house-model".into(),
            },
        )));

        let outcome = f.pipeline.handle_user_message(None, "hi").await.unwrap();
        assert!((outcome.usage.price - 1.0).abs() < 1e-9);
    }
}
