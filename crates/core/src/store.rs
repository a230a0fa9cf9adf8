//! ConversationStore trait — storage primitives for per-caller memory.
//!
//! The store only keeps conversations. Seeding a new conversation with fresh
//! context is orchestrated above it, so backings can be swapped freely.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::{Conversation, Message};

/// The core ConversationStore trait.
///
/// Implementations: in-memory (default), JSON file.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The backend name (e.g., "in_memory", "file").
    fn name(&self) -> &str;

    /// Get the conversation for an identity.
    async fn get(&self, identity: &str) -> Result<Option<Conversation>, StoreError>;

    /// Insert a conversation, replacing any existing one for the same identity.
    async fn insert(&self, conversation: Conversation) -> Result<(), StoreError>;

    /// Append to an existing conversation and return its new length.
    ///
    /// Fails with [`StoreError::UnknownIdentity`] when the identity has no
    /// conversation; append never creates one implicitly.
    async fn append(&self, identity: &str, message: Message) -> Result<usize, StoreError>;

    /// Remove an identity's conversation. Returns whether one existed.
    async fn remove(&self, identity: &str) -> Result<bool, StoreError>;

    /// Number of stored conversations.
    async fn len(&self) -> Result<usize, StoreError>;

    /// All identities with a stored conversation.
    async fn identities(&self) -> Result<Vec<String>, StoreError>;
}
