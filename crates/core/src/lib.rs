//! # Shelftalk Core
//!
//! Domain types, traits, and error definitions for the shelftalk dialogue
//! orchestrator. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator of the pipeline is defined as a trait here:
//! the message store ([`Repository`]), the book catalog ([`BookCatalog`]),
//! the generative model ([`ModelGateway`]), and the retrieval tools
//! ([`Tool`]). Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod catalog;
pub mod error;
pub mod gateway;
pub mod intent;
pub mod message;
pub mod repository;
pub mod tool;
pub mod usage;

// Re-export key types at crate root for ergonomics
pub use catalog::{BookCatalog, BookQuery, BookRecord, BookSummary};
pub use error::{CatalogError, Error, GatewayError, Result, StorageError, ToolError};
pub use gateway::{ModelGateway, ModelTurn, RequestedToolCall};
pub use intent::{ContextNeed, IntentEnvelope};
pub use message::{
    ChatMessage, CompactEntry, Conversation, ConversationId, MessageId, MessagePage,
    MessageUsage, NewMessage, Role, StoredMessage,
};
pub use repository::Repository;
pub use tool::{Tool, ToolCall, ToolDefinition, ToolOutput, ToolRegistry};
pub use usage::{ScopedUsage, UsageRecord, UsageScope};
