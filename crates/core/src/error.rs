//! Error types for the shelftalk domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all shelftalk operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Generative model errors ---
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    // --- Message store errors ---
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // --- Catalog / retrieval errors ---
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures from the generative-model collaborator.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by model endpoint, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures from the message store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage error: {0}")]
    Backend(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(i64),

    #[error(
        "request_id {request_id} does not reference a user message in conversation {conversation_id}"
    )]
    InvalidRequestLink {
        request_id: i64,
        conversation_id: i64,
    },
}

/// Failures from the book catalog collaborator.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Catalog query failed: {0}")]
    QueryFailed(String),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Failures from tool lookup and execution.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}
