//! # Maitred Core
//!
//! Domain types, traits, and error definitions for the Maitred restaurant
//! assistant. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! Every external collaborator is a trait here:
//! - [`Provider`] — the hosted completion API
//! - [`DataSource`] — the restaurant database
//! - [`ConversationStore`] — per-caller conversation memory
//!
//! Implementations live in their respective crates, so tests can swap in
//! scripted providers and static rows.

pub mod data;
pub mod error;
pub mod message;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use data::{ContextRows, DataSource, MenuItem, OrderSummary, QueryResult, StaffMember};
pub use error::{DatabaseError, Error, ProviderError, Result, StoreError};
pub use message::{Conversation, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use store::ConversationStore;
