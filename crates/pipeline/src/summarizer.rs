//! Summarization: per-message digests and the context cascade primitive.
//!
//! Both trigger points share the gateway's `summarize` call. A failed
//! summarization never fails the turn — a long message is simply stored
//! without a summary, and an oversized context stays uncompressed until
//! the next attempt.

use shelftalk_config::SummarizeConfig;
use shelftalk_core::error::GatewayError;
use shelftalk_core::gateway::ModelGateway;
use shelftalk_core::message::CompactEntry;
use shelftalk_core::usage::{ScopedUsage, UsageRecord, UsageScope};
use std::sync::Arc;
use tracing::warn;

const DIGEST_PREFIX: &str = "Conversation so far: ";

pub struct Summarizer {
    gateway: Arc<dyn ModelGateway>,
    user_threshold: usize,
    assistant_threshold: usize,
    max_words: usize,
}

impl Summarizer {
    pub fn new(gateway: Arc<dyn ModelGateway>, config: &SummarizeConfig) -> Self {
        Self {
            gateway,
            user_threshold: config.user_threshold,
            assistant_threshold: config.assistant_threshold,
            max_words: config.max_words,
        }
    }

    /// Summarize a user message when it exceeds the user threshold.
    pub async fn summarize_user_message(
        &self,
        text: &str,
    ) -> (Option<String>, Option<ScopedUsage>) {
        self.summarize_if_long(text, self.user_threshold).await
    }

    /// Summarize an assistant answer when it exceeds the assistant threshold.
    pub async fn summarize_assistant_message(
        &self,
        text: &str,
    ) -> (Option<String>, Option<ScopedUsage>) {
        self.summarize_if_long(text, self.assistant_threshold).await
    }

    async fn summarize_if_long(
        &self,
        text: &str,
        threshold: usize,
    ) -> (Option<String>, Option<ScopedUsage>) {
        if text.chars().count() <= threshold {
            return (None, None);
        }
        match self.gateway.summarize(text, self.max_words).await {
            Ok((summary, usage)) => {
                let scoped = ScopedUsage::new(UsageScope::Summary, usage);
                let summary = summary.trim().to_string();
                if summary.is_empty() {
                    (None, Some(scoped))
                } else {
                    (Some(summary), Some(scoped))
                }
            }
            Err(e) => {
                warn!(error = %e, "Message summarization failed, storing without summary");
                (None, None)
            }
        }
    }

    /// Compress the older portion of an assembled context into one digest
    /// entry. The digest content is guaranteed strictly shorter than the
    /// rendered text it replaces.
    pub async fn digest_context(
        &self,
        older: &[CompactEntry],
    ) -> Result<(CompactEntry, UsageRecord), GatewayError> {
        let rendered = older
            .iter()
            .map(|e| format!("{}: {}", e.role, e.content))
            .collect::<Vec<_>>()
            .join("\n");

        let (digest, usage) = self.gateway.summarize(&rendered, self.max_words).await?;

        let budget = rendered
            .chars()
            .count()
            .saturating_sub(DIGEST_PREFIX.chars().count() + 1);
        let digest = digest.trim();
        let body: String = if digest.is_empty() {
            rendered.chars().take(budget.min(400)).collect()
        } else if digest.chars().count() > budget {
            digest.chars().take(budget).collect()
        } else {
            digest.to_string()
        };

        Ok((
            CompactEntry::system(format!("{DIGEST_PREFIX}{body}")),
            usage,
        ))
    }
}
