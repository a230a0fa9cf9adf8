//! Error types for the Maitred domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] aggregates them.

use thiserror::Error;

/// The top-level error type for all Maitred operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Completion gateway errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Database errors ---
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    // --- Conversation store errors ---
    #[error("Conversation store error: {0}")]
    Store(#[from] StoreError),

    // --- Missing or blank caller input ---
    #[error("{0}")]
    InvalidInput(String),

    // --- Generated SQL refused by the guard ---
    #[error("Generated SQL was rejected: {reason}")]
    UnsafeQuery { sql: String, reason: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the hosted completion API.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures talking to the relational database.
///
/// The driver message is carried verbatim so it can be surfaced to the caller.
#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Failed to decode column '{column}': {reason}")]
    Decode { column: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("No conversation exists for '{0}'")]
    UnknownIdentity(String),

    #[error("System message may only appear at the start of a conversation")]
    MisplacedSystemMessage,

    #[error("Storage error: {0}")]
    Storage(String),
}
