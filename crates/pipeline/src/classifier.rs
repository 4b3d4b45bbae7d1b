//! Intent classification: how much history does this message need?
//!
//! Keyword heuristics cannot recognize affirmations or pronoun references
//! across languages, so the verdict comes from a model call analyzing the
//! message together with the latest exchange. The only local short-circuit
//! is structural: a conversation with no prior messages has no context to
//! need. Any classification failure falls toward the context-inclusive
//! side — never toward dropping context — and is logged, not raised.

use shelftalk_core::gateway::ModelGateway;
use shelftalk_core::intent::{ContextNeed, IntentEnvelope};
use shelftalk_core::message::{CompactEntry, ConversationId, MessageId};
use shelftalk_core::repository::Repository;
use shelftalk_core::usage::{ScopedUsage, UsageScope};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct IntentClassifier {
    repo: Arc<dyn Repository>,
    gateway: Arc<dyn ModelGateway>,
}

impl IntentClassifier {
    pub fn new(repo: Arc<dyn Repository>, gateway: Arc<dyn ModelGateway>) -> Self {
        Self { repo, gateway }
    }

    /// Classify the context need of the just-persisted user message.
    ///
    /// `current_message_id` identifies that message so it is excluded from
    /// the recent exchange handed to the model.
    pub async fn classify(
        &self,
        user_text: &str,
        conversation_id: ConversationId,
        current_message_id: MessageId,
    ) -> (IntentEnvelope, Option<ScopedUsage>) {
        let recent = match self.recent_exchange(conversation_id, current_message_id).await {
            Ok(recent) => recent,
            Err(e) => {
                warn!(error = %e, "Could not load recent exchange, defaulting to last_message");
                return (IntentEnvelope::new(ContextNeed::LastMessage), None);
            }
        };

        // First message of a conversation: nothing to refer back to.
        if recent.is_empty() {
            debug!(conversation_id, "No history, context need is none");
            return (IntentEnvelope::new(ContextNeed::None), None);
        }

        match self.gateway.detect_intent(user_text, &recent).await {
            Ok((envelope, usage)) => {
                debug!(conversation_id, need = %envelope.context_need, "Intent classified");
                (
                    envelope,
                    Some(ScopedUsage::new(UsageScope::Intent, usage)),
                )
            }
            Err(e) => {
                warn!(error = %e, "Intent classification failed, defaulting to last_message");
                (IntentEnvelope::new(ContextNeed::LastMessage), None)
            }
        }
    }

    /// The latest user/assistant pair preceding the current message.
    async fn recent_exchange(
        &self,
        conversation_id: ConversationId,
        current_message_id: MessageId,
    ) -> Result<Vec<CompactEntry>, shelftalk_core::error::StorageError> {
        let probe = self.repo.list_messages(conversation_id, 0, 1).await?;
        if probe.total <= 1 {
            return Ok(Vec::new());
        }

        // Fetch the last three messages: the current one plus up to one
        // preceding exchange.
        let offset = probe.total.saturating_sub(3);
        let page = self
            .repo
            .list_messages(conversation_id, offset, 3)
            .await?;

        Ok(page
            .items
            .iter()
            .filter(|m| m.id != current_message_id)
            .map(CompactEntry::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedGateway;
    use shelftalk_core::error::GatewayError;
    use shelftalk_core::message::{NewMessage, Role};
    use shelftalk_storage::InMemoryRepository;

    struct Fixture {
        repo: Arc<InMemoryRepository>,
        gateway: Arc<ScriptedGateway>,
        classifier: IntentClassifier,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryRepository::new());
        let gateway = Arc::new(ScriptedGateway::new());
        let classifier = IntentClassifier::new(repo.clone(), gateway.clone());
        Fixture {
            repo,
            gateway,
            classifier,
        }
    }

    #[tokio::test]
    async fn first_message_needs_no_context_without_model_call() {
        let f = fixture();
        let conv = f.repo.create_conversation(None, None).await.unwrap();
        let msg = f
            .repo
            .create_message(NewMessage::user(conv.id, "recommend me a fantasy book", None))
            .await
            .unwrap();

        let (envelope, usage) = f
            .classifier
            .classify("recommend me a fantasy book", conv.id, msg.id)
            .await;
        assert_eq!(envelope.context_need, ContextNeed::None);
        assert!(usage.is_none());
        assert_eq!(f.gateway.intent_calls(), 0);
    }

    #[tokio::test]
    async fn bare_affirmation_goes_to_the_model_with_the_last_exchange() {
        let f = fixture();
        let conv = f.repo.create_conversation(None, None).await.unwrap();
        let req = f
            .repo
            .create_message(NewMessage::user(conv.id, "any fantasy picks?", None))
            .await
            .unwrap();
        f.repo
            .create_message(NewMessage::assistant(
                conv.id,
                req.id,
                "Would you like epic or cozy fantasy?",
                None,
            ))
            .await
            .unwrap();
        let current = f
            .repo
            .create_message(NewMessage::user(conv.id, "yes", None))
            .await
            .unwrap();

        f.gateway.push_intent(Ok((
            IntentEnvelope::new(ContextNeed::LastMessage),
            ScriptedGateway::usage(40, 3),
        )));

        let (envelope, usage) = f.classifier.classify("yes", conv.id, current.id).await;
        assert_eq!(envelope.context_need, ContextNeed::LastMessage);
        assert_eq!(usage.unwrap().scope, UsageScope::Intent);

        // The model saw the previous pair but not the current message.
        let exchanges = f.gateway.recorded_intent_exchanges();
        assert_eq!(exchanges.len(), 1);
        let exchange = &exchanges[0];
        assert_eq!(exchange.len(), 2);
        assert_eq!(exchange[0].role, Role::User);
        assert_eq!(exchange[0].content, "any fantasy picks?");
        assert!(exchange.iter().all(|e| e.content != "yes"));
    }

    #[tokio::test]
    async fn gateway_failure_falls_back_to_last_message() {
        let f = fixture();
        let conv = f.repo.create_conversation(None, None).await.unwrap();
        let req = f
            .repo
            .create_message(NewMessage::user(conv.id, "q", None))
            .await
            .unwrap();
        f.repo
            .create_message(NewMessage::assistant(conv.id, req.id, "a", None))
            .await
            .unwrap();
        let current = f
            .repo
            .create_message(NewMessage::user(conv.id, "and then?", None))
            .await
            .unwrap();

        f.gateway
            .push_intent(Err(GatewayError::Network("broken pipe".into())));

        let (envelope, usage) = f.classifier.classify("and then?", conv.id, current.id).await;
        assert_eq!(envelope.context_need, ContextNeed::LastMessage);
        assert!(usage.is_none());
    }

    #[tokio::test]
    async fn full_need_verdict_passes_through() {
        let f = fixture();
        let conv = f.repo.create_conversation(None, None).await.unwrap();
        let req = f
            .repo
            .create_message(NewMessage::user(conv.id, "let's compare everything so far", None))
            .await
            .unwrap();
        f.repo
            .create_message(NewMessage::assistant(conv.id, req.id, "sure", None))
            .await
            .unwrap();
        let current = f
            .repo
            .create_message(NewMessage::user(
                conv.id,
                "which of all those books was the longest?",
                None,
            ))
            .await
            .unwrap();

        f.gateway.push_intent(Ok((
            IntentEnvelope::new(ContextNeed::Full),
            ScriptedGateway::usage(60, 4),
        )));

        let (envelope, _) = f
            .classifier
            .classify("which of all those books was the longest?", conv.id, current.id)
            .await;
        assert_eq!(envelope.context_need, ContextNeed::Full);
    }
}
