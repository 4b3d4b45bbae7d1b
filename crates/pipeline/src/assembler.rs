//! Compact-context assembly backed by the repository and the TTL cache.
//!
//! On a cache miss the assembler pulls the most recent slice of persisted
//! history (summaries preferred over full text), applies the cascade when
//! the assembled content is oversized, caches the result, and serves the
//! slice the classified need asks for. Cache hits only ever slice — a
//! `last_message` read never shrinks a cached full entry.

use crate::cache::ContextCache;
use crate::summarizer::Summarizer;
use shelftalk_core::error::Error;
use shelftalk_core::intent::ContextNeed;
use shelftalk_core::message::{CompactEntry, ConversationId};
use shelftalk_core::repository::Repository;
use shelftalk_core::usage::{ScopedUsage, UsageScope};
use shelftalk_config::ContextConfig;
use std::sync::Arc;
use tracing::{debug, warn};

/// Assembled context plus any usage a cascade summarization incurred.
pub struct AssembledContext {
    pub entries: Vec<CompactEntry>,
    pub usage: Vec<ScopedUsage>,
}

impl AssembledContext {
    fn empty() -> Self {
        Self {
            entries: Vec::new(),
            usage: Vec::new(),
        }
    }
}

pub struct ContextAssembler {
    repo: Arc<dyn Repository>,
    cache: Arc<ContextCache>,
    summarizer: Arc<Summarizer>,
    max_messages: usize,
    cascade_threshold: usize,
}

impl ContextAssembler {
    pub fn new(
        repo: Arc<dyn Repository>,
        cache: Arc<ContextCache>,
        summarizer: Arc<Summarizer>,
        config: &ContextConfig,
    ) -> Self {
        Self {
            repo,
            cache,
            summarizer,
            max_messages: config.max_messages,
            cascade_threshold: config.cascade_threshold,
        }
    }

    /// Produce the compact context slice for the classified need.
    pub async fn compact_context(
        &self,
        conversation_id: ConversationId,
        need: ContextNeed,
    ) -> Result<AssembledContext, Error> {
        if need == ContextNeed::None {
            return Ok(AssembledContext::empty());
        }
        let limit = need.entry_limit(self.max_messages);

        if let Some(entries) = self.cache.get(conversation_id) {
            debug!(conversation_id, %need, "Context cache hit");
            return Ok(AssembledContext {
                entries: tail(&entries, limit),
                usage: Vec::new(),
            });
        }

        debug!(conversation_id, %need, "Context cache miss, assembling");
        let entries_and_usage = self.assemble(conversation_id).await?;
        self.cache
            .set(conversation_id, entries_and_usage.entries.clone());

        Ok(AssembledContext {
            entries: tail(&entries_and_usage.entries, limit),
            usage: entries_and_usage.usage,
        })
    }

    /// Load the most recent `max_messages` from storage (oldest-first) and
    /// cascade when the assembled content is oversized.
    async fn assemble(
        &self,
        conversation_id: ConversationId,
    ) -> Result<AssembledContext, Error> {
        let cap = self.max_messages as u64;
        let mut page = self.repo.list_messages(conversation_id, 0, cap).await?;
        if page.total > cap {
            let offset = page.total - cap;
            page = self.repo.list_messages(conversation_id, offset, cap).await?;
        }

        let mut entries: Vec<CompactEntry> =
            page.items.iter().map(CompactEntry::from).collect();
        let mut usage = Vec::new();

        let total_chars: usize = entries.iter().map(|e| e.content.chars().count()).sum();
        if total_chars > self.cascade_threshold && entries.len() > 2 {
            let split = entries.len() - 2;
            match self.summarizer.digest_context(&entries[..split]).await {
                Ok((digest, digest_usage)) => {
                    debug!(
                        conversation_id,
                        replaced = split,
                        "Context cascade compressed older history"
                    );
                    let mut compacted = Vec::with_capacity(3);
                    compacted.push(digest);
                    compacted.extend_from_slice(&entries[split..]);
                    entries = compacted;
                    usage.push(ScopedUsage::new(UsageScope::Summary, digest_usage));
                }
                Err(e) => {
                    warn!(error = %e, "Context digest failed, keeping uncompressed context");
                }
            }
        }

        Ok(AssembledContext { entries, usage })
    }
}

fn tail(entries: &[CompactEntry], limit: usize) -> Vec<CompactEntry> {
    let start = entries.len().saturating_sub(limit);
    entries[start..].to_vec()
}
