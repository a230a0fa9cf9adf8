//! Message and Conversation domain types.
//!
//! A conversation belongs to one caller identity. Its first message is the
//! system context; after that only user and assistant turns are appended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Grounding context built from restaurant data
    System,
    /// The caller
    User,
    /// The model
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// An ordered message history owned by one caller identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// The caller identity this conversation belongs to
    pub identity: String,

    /// Ordered messages; index 0 is the system context
    messages: Vec<Message>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Start a conversation seeded with a single system message.
    pub fn seeded(identity: impl Into<String>, system_context: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            identity: identity.into(),
            messages: vec![Message::system(system_context)],
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a user or assistant message.
    ///
    /// System messages are only accepted through [`Conversation::seeded`].
    pub fn push(&mut self, message: Message) -> Result<(), StoreError> {
        if message.role == Role::System {
            return Err(StoreError::MisplacedSystemMessage);
        }
        self.updated_at = Utc::now();
        self.messages.push(message);
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The system context this conversation was seeded with.
    pub fn system_context(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    /// Whether the conversation has been idle for longer than `ttl`.
    pub fn is_idle_for(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.updated_at) > ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("What's on the menu?");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "What's on the menu?");
    }

    #[test]
    fn seeded_conversation_starts_with_system() {
        let conv = Conversation::seeded("u1", "context");
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].role, Role::System);
        assert_eq!(conv.system_context(), Some("context"));
    }

    #[test]
    fn push_rejects_second_system_message() {
        let mut conv = Conversation::seeded("u1", "context");
        let err = conv.push(Message::system("again")).unwrap_err();
        assert!(matches!(err, StoreError::MisplacedSystemMessage));
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn pairs_grow_by_two() {
        let mut conv = Conversation::seeded("u1", "context");
        for i in 0..3 {
            conv.push(Message::user(format!("q{i}"))).unwrap();
            conv.push(Message::assistant(format!("a{i}"))).unwrap();
        }
        assert_eq!(conv.len(), 1 + 2 * 3);
        assert!(conv.updated_at >= conv.created_at);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert!(json.contains("\"assistant\""));
    }

    #[test]
    fn idle_detection() {
        let conv = Conversation::seeded("u1", "context");
        let later = conv.updated_at + chrono::Duration::seconds(120);
        assert!(conv.is_idle_for(chrono::Duration::seconds(60), later));
        assert!(!conv.is_idle_for(chrono::Duration::seconds(600), later));
    }
}
