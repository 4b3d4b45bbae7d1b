//! In-memory repository — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use shelftalk_core::error::StorageError;
use shelftalk_core::message::{
    Conversation, ConversationId, MessageId, MessagePage, MessageUsage, NewMessage, StoredMessage,
};
use shelftalk_core::repository::Repository;
use shelftalk_core::usage::ScopedUsage;
use std::sync::Mutex;

/// One recorded per-scope usage line.
#[derive(Debug, Clone)]
pub struct UsageDetailRow {
    pub message_id: MessageId,
    pub detail: ScopedUsage,
    pub price: f64,
}

#[derive(Default)]
struct Inner {
    conversations: Vec<Conversation>,
    messages: Vec<StoredMessage>,
    usage_details: Vec<UsageDetailRow>,
    next_conversation_id: i64,
    next_message_id: i64,
}

/// A repository that stores everything in process memory, mimicking the
/// SQLite backend's autoincrement ids and request-link validation.
pub struct InMemoryRepository {
    inner: Mutex<Inner>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_conversation_id: 1,
                next_message_id: 1,
                ..Inner::default()
            }),
        }
    }

    /// Fetch a single message by id (test helper).
    pub fn message(&self, id: MessageId) -> Option<StoredMessage> {
        let inner = self.inner.lock().unwrap();
        inner.messages.iter().find(|m| m.id == id).cloned()
    }

    /// All recorded usage details for a message (test helper).
    pub fn usage_details_for(&self, message_id: MessageId) -> Vec<UsageDetailRow> {
        let inner = self.inner.lock().unwrap();
        inner
            .usage_details
            .iter()
            .filter(|d| d.message_id == message_id)
            .cloned()
            .collect()
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create_conversation(
        &self,
        title: Option<String>,
        summary: Option<String>,
    ) -> Result<Conversation, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        let conversation = Conversation {
            id: inner.next_conversation_id,
            title,
            summary,
            created_at: Utc::now(),
        };
        inner.next_conversation_id += 1;
        inner.conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, StorageError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.conversations.iter().find(|c| c.id == id).cloned())
    }

    async fn create_message(&self, message: NewMessage) -> Result<StoredMessage, StorageError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(request_id) = message.request_id {
            let valid = inner.messages.iter().any(|m| {
                m.id == request_id
                    && m.conversation_id == message.conversation_id
                    && m.request_id.is_none()
            });
            if !valid {
                return Err(StorageError::InvalidRequestLink {
                    request_id,
                    conversation_id: message.conversation_id,
                });
            }
        }

        let stored = StoredMessage {
            id: inner.next_message_id,
            conversation_id: message.conversation_id,
            request_id: message.request_id,
            text: message.text,
            summary: message.summary,
            usage: None,
            created_at: Utc::now(),
        };
        inner.next_message_id += 1;
        inner.messages.push(stored.clone());
        Ok(stored)
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        offset: u64,
        limit: u64,
    ) -> Result<MessagePage, StorageError> {
        let inner = self.inner.lock().unwrap();
        let all: Vec<&StoredMessage> = inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .collect();
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(MessagePage {
            items,
            total,
            offset,
            limit,
        })
    }

    async fn set_message_usage(
        &self,
        message_id: MessageId,
        usage: &MessageUsage,
    ) -> Result<bool, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.messages.iter_mut().find(|m| m.id == message_id) {
            Some(m) => {
                m.usage = Some(usage.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn add_usage_detail(
        &self,
        message_id: MessageId,
        detail: &ScopedUsage,
        price: f64,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap();
        inner.usage_details.push(UsageDetailRow {
            message_id,
            detail: detail.clone(),
            price,
        });
        Ok(())
    }
}
