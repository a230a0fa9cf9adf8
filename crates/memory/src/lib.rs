//! Conversation store implementations for Maitred.

pub mod file_backend;
pub mod in_memory;

pub use file_backend::FileStore;
pub use in_memory::InMemoryStore;

use std::path::PathBuf;
use std::sync::Arc;

use maitred_config::MemoryConfig;
use maitred_core::store::ConversationStore;
use tracing::{info, warn};

/// Build the configured conversation store.
///
/// Unknown backend names fall back to the in-memory store.
pub fn build_store(config: &MemoryConfig) -> Arc<dyn ConversationStore> {
    match config.backend.as_str() {
        "file" => {
            let path = config
                .path
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(FileStore::default_path);
            info!(path = %path.display(), "Using file conversation store");
            Arc::new(FileStore::new(path))
        }
        "in_memory" => Arc::new(InMemoryStore::new()),
        other => {
            warn!(backend = other, "Unknown memory backend, using in_memory");
            Arc::new(InMemoryStore::new())
        }
    }
}
