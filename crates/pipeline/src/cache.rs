//! TTL cache for assembled compact context, keyed by conversation id.
//!
//! This is the only mutable state shared between pipeline runs. The lock
//! is scoped to individual map operations and is never held across an
//! await point; expiry uses the monotonic clock.

use shelftalk_core::message::{CompactEntry, ConversationId};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

struct CacheSlot {
    expires_at: Instant,
    entries: Vec<CompactEntry>,
}

/// A time-to-live cache of compact context per conversation.
pub struct ContextCache {
    ttl: Duration,
    slots: Mutex<HashMap<ConversationId, CacheSlot>>,
}

impl ContextCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the cached entries for a conversation, evicting them first
    /// when expired.
    pub fn get(&self, conversation_id: ConversationId) -> Option<Vec<CompactEntry>> {
        let mut slots = self.slots.lock().unwrap();
        match slots.get(&conversation_id) {
            Some(slot) if slot.expires_at > Instant::now() => Some(slot.entries.clone()),
            Some(_) => {
                slots.remove(&conversation_id);
                None
            }
            None => None,
        }
    }

    /// Store freshly assembled entries with the configured TTL.
    pub fn set(&self, conversation_id: ConversationId, entries: Vec<CompactEntry>) {
        let mut slots = self.slots.lock().unwrap();
        slots.insert(
            conversation_id,
            CacheSlot {
                expires_at: Instant::now() + self.ttl,
                entries,
            },
        );
    }

    /// Drop the entry for a conversation. Called on every message write.
    pub fn invalidate(&self, conversation_id: ConversationId) {
        let mut slots = self.slots.lock().unwrap();
        if slots.remove(&conversation_id).is_some() {
            debug!(conversation_id, "Context cache invalidated");
        }
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.slots.lock().unwrap().clear();
    }

    /// Number of live (possibly expired) slots.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
