//! Repository trait — the narrow seam over persistent storage.
//!
//! The pipeline never sees SQL. It creates conversations and messages,
//! pages through history oldest-first, and attaches usage metrics after
//! generation. Schema and migrations belong to the implementing crate.

use crate::error::StorageError;
use crate::message::{
    Conversation, ConversationId, MessageId, MessagePage, MessageUsage, NewMessage, StoredMessage,
};
use crate::usage::ScopedUsage;
use async_trait::async_trait;

/// The message store collaborator.
///
/// Implementations must uphold the request-link invariant: a message's
/// `request_id`, when present, references an existing *user* message in
/// the *same* conversation ([`StorageError::InvalidRequestLink`] otherwise).
#[async_trait]
pub trait Repository: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Create a conversation.
    async fn create_conversation(
        &self,
        title: Option<String>,
        summary: Option<String>,
    ) -> std::result::Result<Conversation, StorageError>;

    /// Fetch a conversation by id.
    async fn get_conversation(
        &self,
        id: ConversationId,
    ) -> std::result::Result<Option<Conversation>, StorageError>;

    /// Persist a message, validating its request link.
    async fn create_message(
        &self,
        message: NewMessage,
    ) -> std::result::Result<StoredMessage, StorageError>;

    /// Page through a conversation's messages ordered oldest → newest.
    /// `total` on the returned page counts the whole conversation.
    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        offset: u64,
        limit: u64,
    ) -> std::result::Result<MessagePage, StorageError>;

    /// Attach aggregated usage metrics to a message. Returns false when
    /// the message does not exist.
    async fn set_message_usage(
        &self,
        message_id: MessageId,
        usage: &MessageUsage,
    ) -> std::result::Result<bool, StorageError>;

    /// Record one per-call-site usage line for a message.
    async fn add_usage_detail(
        &self,
        message_id: MessageId,
        detail: &ScopedUsage,
        price: f64,
    ) -> std::result::Result<(), StorageError>;
}
