//! File-based conversation store.
//!
//! Conversations are held in memory and written to a single JSON file (an
//! object keyed by identity) after every mutation, so they survive a restart.
//!
//! Default location: `~/.maitred/conversations.json`

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use maitred_core::error::StoreError;
use maitred_core::message::{Conversation, Message};
use maitred_core::store::ConversationStore;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A file-backed conversation store.
///
/// The file is read once on creation. A missing file starts empty; an
/// unreadable one is logged and replaced on the next write.
pub struct FileStore {
    path: PathBuf,
    conversations: Arc<RwLock<HashMap<String, Conversation>>>,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        let conversations = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = conversations.len(), "File conversation store loaded");
        Self {
            path,
            conversations: Arc::new(RwLock::new(conversations)),
        }
    }

    /// Default path: `~/.maitred/conversations.json`
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".maitred").join("conversations.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> HashMap<String, Conversation> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return HashMap::new(),
        };

        match serde_json::from_str(&content) {
            Ok(conversations) => conversations,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupted conversation file");
                HashMap::new()
            }
        }
    }

    /// Write the current state while the caller still holds the write lock.
    fn flush(&self, conversations: &HashMap<String, Conversation>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Storage(format!("Failed to create conversation directory: {e}"))
            })?;
        }

        let content = serde_json::to_string_pretty(conversations)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize conversations: {e}")))?;

        std::fs::write(&self.path, content)
            .map_err(|e| StoreError::Storage(format!("Failed to write conversation file: {e}")))
    }
}

#[async_trait]
impl ConversationStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, identity: &str) -> Result<Option<Conversation>, StoreError> {
        Ok(self.conversations.read().await.get(identity).cloned())
    }

    // Each mutation is undone in memory when the write fails, so memory never
    // holds state the file does not.

    async fn insert(&self, conversation: Conversation) -> Result<(), StoreError> {
        let mut conversations = self.conversations.write().await;
        let identity = conversation.identity.clone();
        let previous = conversations.insert(identity.clone(), conversation);

        if let Err(e) = self.flush(&conversations) {
            match previous {
                Some(previous) => conversations.insert(identity, previous),
                None => conversations.remove(&identity),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn append(&self, identity: &str, message: Message) -> Result<usize, StoreError> {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .get_mut(identity)
            .ok_or_else(|| StoreError::UnknownIdentity(identity.to_string()))?;
        let before = conversation.clone();
        conversation.push(message)?;
        let len = conversation.len();

        if let Err(e) = self.flush(&conversations) {
            conversations.insert(identity.to_string(), before);
            return Err(e);
        }
        Ok(len)
    }

    async fn remove(&self, identity: &str) -> Result<bool, StoreError> {
        let mut conversations = self.conversations.write().await;
        let Some(removed) = conversations.remove(identity) else {
            return Ok(false);
        };

        if let Err(e) = self.flush(&conversations) {
            conversations.insert(identity.to_string(), removed);
            return Err(e);
        }
        Ok(true)
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
