//! In-memory conversation store, the default. Lost on restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use maitred_core::error::StoreError;
use maitred_core::message::{Conversation, Message};
use maitred_core::store::ConversationStore;
use tokio::sync::RwLock;

/// Conversations keyed by caller identity.
pub struct InMemoryStore {
    conversations: Arc<RwLock<HashMap<String, Conversation>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            conversations: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get(&self, identity: &str) -> Result<Option<Conversation>, StoreError> {
        Ok(self.conversations.read().await.get(identity).cloned())
    }

    async fn insert(&self, conversation: Conversation) -> Result<(), StoreError> {
        self.conversations
            .write()
            .await
            .insert(conversation.identity.clone(), conversation);
        Ok(())
    }

    async fn append(&self, identity: &str, message: Message) -> Result<usize, StoreError> {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .get_mut(identity)
            .ok_or_else(|| StoreError::UnknownIdentity(identity.to_string()))?;
        conversation.push(message)?;
        Ok(conversation.len())
    }

    async fn remove(&self, identity: &str) -> Result<bool, StoreError> {
        Ok(self.conversations.write().await.remove(identity).is_some())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.conversations.read().await.len())
    }

    async fn identities(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.conversations.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
