//! Conversation memory: seeds, extends and clears per-caller conversations.
//!
//! Sits above a [`ConversationStore`] and a [`DataSource`]. A conversation is
//! created on first use with a freshly rendered context snapshot; if any fetch
//! fails, the store is left untouched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use maitred_core::data::DataSource;
use maitred_core::error::{Result, StoreError};
use maitred_core::message::{Conversation, Message};
use maitred_core::store::ConversationStore;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

use crate::context::{ContextBuilder, PromptStyle};

type LockMap = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

pub struct ConversationMemory {
    store: Arc<dyn ConversationStore>,
    data: Arc<dyn DataSource>,
    order_limit: u32,
    idle_ttl: Option<chrono::Duration>,
    locks: LockMap,
}

/// Exclusive hold on one identity, released on drop.
///
/// The map entry is removed on release when no other task is waiting, so the
/// map only holds identities with work in flight.
pub struct IdentityGuard<'a> {
    locks: &'a LockMap,
    identity: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdentityGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map, one held by our guard.
        if locks
            .get(&self.identity)
            .is_some_and(|m| Arc::strong_count(m) <= 2)
        {
            locks.remove(&self.identity);
        }
        drop(locks);
        self.guard.take();
    }
}

impl ConversationMemory {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        data: Arc<dyn DataSource>,
        order_limit: u32,
    ) -> Self {
        Self {
            store,
            data,
            order_limit,
            idle_ttl: None,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Rebuild conversations idle for longer than `secs`. 0 disables expiry.
    pub fn with_idle_ttl_secs(mut self, secs: u64) -> Self {
        self.idle_ttl = match secs {
            0 => None,
            secs => Some(chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))),
        };
        self
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Serialize work on one identity. Different identities do not contend.
    pub async fn lock(&self, identity: &str) -> IdentityGuard<'_> {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks
                .entry(identity.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        IdentityGuard {
            locks: &self.locks,
            identity: identity.to_string(),
            guard: Some(mutex.lock_owned().await),
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Render a fresh context snapshot.
    pub async fn build_context(&self, style: PromptStyle) -> Result<String> {
        let rows = self.data.snapshot(self.order_limit).await?;
        Ok(ContextBuilder::render(&rows, style))
    }

    fn is_expired(&self, conversation: &Conversation) -> bool {
        self.idle_ttl
            .is_some_and(|ttl| conversation.is_idle_for(ttl, Utc::now()))
    }

    /// Return the identity's conversation, creating it from fresh data if absent
    /// or expired.
    pub async fn get_or_create(&self, identity: &str) -> Result<Conversation> {
        if let Some(conversation) = self.store.get(identity).await? {
            if !self.is_expired(&conversation) {
                return Ok(conversation);
            }
            info!(identity = %identity, "Conversation expired, rebuilding context");
        }

        let context = self.build_context(PromptStyle::Conversational).await?;
        let conversation = Conversation::seeded(identity, context);
        self.store.insert(conversation.clone()).await?;
        info!(identity = %identity, "Initialized new conversation");
        Ok(conversation)
    }

    /// Append a message; fails if the identity has no conversation.
    pub async fn append(&self, identity: &str, message: Message) -> Result<usize> {
        let len = self.store.append(identity, message).await?;
        debug!(identity = %identity, history_len = len, "Appended message");
        Ok(len)
    }

    /// Drop the identity's conversation. Returns whether one existed.
    pub async fn clear(&self, identity: &str) -> Result<bool> {
        let existed = self.store.remove(identity).await?;
        if existed {
            info!(identity = %identity, "Cleared conversation");
        }
        Ok(existed)
    }

    /// The identity's conversation as it stands; expired ones count as absent.
    pub async fn history(&self, identity: &str) -> Result<Conversation> {
        match self.store.get(identity).await? {
            Some(conversation) if !self.is_expired(&conversation) => Ok(conversation),
            _ => Err(StoreError::UnknownIdentity(identity.to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maitred_core::error::{DatabaseError, Error};
    use maitred_core::message::Role;
    use maitred_database::StaticDataSource;
    use maitred_memory::InMemoryStore;

    fn memory(data: Arc<StaticDataSource>) -> (ConversationMemory, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (ConversationMemory::new(store.clone(), data, 10), store)
    }

    #[tokio::test]
    async fn new_identity_gets_seeded_conversation() {
        let (memory, _) = memory(Arc::new(StaticDataSource::sample()));
        let conv = memory.get_or_create("alice").await.unwrap();

        assert_eq!(conv.len(), 1);
        let system = &conv.messages()[0];
        assert_eq!(system.role, Role::System);
        assert!(system.content.contains("MENU ITEMS:\n- Margherita Pizza ($12.50)"));
        assert!(system.content.contains("RECENT ORDERS:\n- Order 2: Pending"));
        assert!(system.content.contains("USERS:\n- Carla (manager)"));
    }

    #[tokio::test]
    async fn existing_conversation_is_not_refetched() {
        let data = Arc::new(StaticDataSource::sample());
        let (memory, _) = memory(data.clone());

        memory.get_or_create("alice").await.unwrap();
        memory.append("alice", Message::user("Hi")).await.unwrap();
        let conv = memory.get_or_create("alice").await.unwrap();

        assert_eq!(conv.len(), 2);
        assert_eq!(data.snapshot_count(), 1);
    }

    #[tokio::test]
    async fn pairs_grow_history_by_two() {
        let (memory, _) = memory(Arc::new(StaticDataSource::sample()));
        memory.get_or_create("alice").await.unwrap();

        let n = 4;
        let mut len = 0;
        for i in 0..n {
            memory.append("alice", Message::user(format!("q{i}"))).await.unwrap();
            len = memory
                .append("alice", Message::assistant(format!("a{i}")))
                .await
                .unwrap();
        }
        assert_eq!(len, 1 + 2 * n);
    }

    #[tokio::test]
    async fn failed_snapshot_leaves_store_unmodified() {
        let data = Arc::new(StaticDataSource::sample());
        data.fail_with(DatabaseError::Connect("connection refused".into()));
        let (memory, store) = memory(data);

        let err = memory.get_or_create("alice").await.unwrap_err();
        assert!(matches!(err, Error::Database(DatabaseError::Connect(_))));
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn clear_then_rebuild_uses_current_data() {
        let data = Arc::new(StaticDataSource::sample());
        let (memory, _) = memory(data.clone());
        memory.get_or_create("alice").await.unwrap();

        data.set_rows(Default::default());
        assert!(memory.clear("alice").await.unwrap());
        assert!(!memory.clear("alice").await.unwrap());

        let conv = memory.get_or_create("alice").await.unwrap();
        assert!(conv.system_context().unwrap().contains("MENU ITEMS:\n- (none)"));
    }

    #[tokio::test]
    async fn append_without_conversation_fails() {
        let (memory, _) = memory(Arc::new(StaticDataSource::sample()));
        let err = memory.append("ghost", Message::user("Hi")).await.unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::UnknownIdentity(_))));
    }

    #[tokio::test]
    async fn history_of_unknown_identity_is_error() {
        let (memory, _) = memory(Arc::new(StaticDataSource::sample()));
        assert!(matches!(
            memory.history("ghost").await,
            Err(Error::Store(StoreError::UnknownIdentity(_)))
        ));
    }

    #[tokio::test]
    async fn idle_conversation_is_rebuilt() {
        let data = Arc::new(StaticDataSource::sample());
        let store = Arc::new(InMemoryStore::new());
        let memory = ConversationMemory::new(store.clone(), data.clone(), 10).with_idle_ttl_secs(60);

        let mut stale = Conversation::seeded("alice", "old context");
        stale.push(Message::user("Hi")).unwrap();
        stale.updated_at = Utc::now() - chrono::Duration::minutes(5);
        store.insert(stale).await.unwrap();

        assert!(memory.history("alice").await.is_err());
        let conv = memory.get_or_create("alice").await.unwrap();
        assert_eq!(conv.len(), 1);
        assert_ne!(conv.system_context(), Some("old context"));
        assert_eq!(data.snapshot_count(), 1);
    }

    #[tokio::test]
    async fn zero_ttl_never_expires() {
        let store = Arc::new(InMemoryStore::new());
        let memory = ConversationMemory::new(store.clone(), Arc::new(StaticDataSource::sample()), 10)
            .with_idle_ttl_secs(0);

        let mut old = Conversation::seeded("alice", "old context");
        old.updated_at = Utc::now() - chrono::Duration::days(30);
        store.insert(old).await.unwrap();

        let conv = memory.get_or_create("alice").await.unwrap();
        assert_eq!(conv.system_context(), Some("old context"));
    }

    #[tokio::test]
    async fn lock_is_per_identity() {
        let (memory, _) = memory(Arc::new(StaticDataSource::sample()));
        let _alice = memory.lock("alice").await;

        // A different identity is not blocked.
        let bob = tokio::time::timeout(std::time::Duration::from_millis(100), memory.lock("bob")).await;
        assert!(bob.is_ok());

        // The same identity waits.
        let again =
            tokio::time::timeout(std::time::Duration::from_millis(50), memory.lock("alice")).await;
        assert!(again.is_err());
    }

    #[tokio::test]
    async fn released_locks_leave_no_entries() {
        let (memory, _) = memory(Arc::new(StaticDataSource::sample()));

        for i in 0..100 {
            let identity = format!("guest-{i}");
            let _guard = memory.lock(&identity).await;
            memory.get_or_create(&identity).await.unwrap();
            memory.clear(&identity).await.unwrap();
        }

        assert_eq!(memory.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn waiting_task_keeps_the_entry() {
        let memory = Arc::new(memory(Arc::new(StaticDataSource::sample())).0);
        let first = memory.lock("alice").await;

        let waiter = {
            let memory = memory.clone();
            tokio::spawn(async move {
                let _second = memory.lock("alice").await;
            })
        };
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        drop(first);
        assert_eq!(memory.tracked_locks(), 1);

        waiter.await.unwrap();
        assert_eq!(memory.tracked_locks(), 0);
    }
}
