//! # Maitred Assistant
//!
//! Turns restaurant data and a completion provider into answers:
//!
//! - [`ContextBuilder`] renders menu, order and staff rows into a system prompt
//! - [`ConversationMemory`] keeps one seeded conversation per caller
//! - [`Assistant`] implements stateful chat, one-shot Q&A and
//!   natural-language-to-SQL on top of both

pub mod assistant;
pub mod context;
pub mod memory;
pub mod text_to_sql;

#[cfg(test)]
mod test_helpers;

pub use assistant::{AskOutcome, Assistant, ChatOutcome, QueryOutcome};
pub use context::{ContextBuilder, PromptStyle};
pub use memory::{ConversationMemory, IdentityGuard};
