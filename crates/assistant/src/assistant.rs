//! The three request behaviors: contextual chat, one-shot Q&A, and
//! natural-language-to-SQL.

use std::sync::Arc;

use maitred_config::{AppConfig, ChatMode, CompletionConfig, SamplingConfig};
use maitred_core::data::{DataSource, QueryResult};
use maitred_core::error::{Error, Result};
use maitred_core::message::{Conversation, Message};
use maitred_core::provider::{Provider, ProviderRequest};
use maitred_core::store::ConversationStore;
use maitred_security::SqlGuard;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::PromptStyle;
use crate::memory::ConversationMemory;
use crate::text_to_sql;

/// Reply to a stateful chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub answer: String,
    /// Messages in the conversation after this turn, system message included.
    pub history_len: usize,
}

/// Reply to a one-shot question, with the context it was answered from.
#[derive(Debug, Clone, Serialize)]
pub struct AskOutcome {
    pub answer: String,
    pub context: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub sql: String,
    pub result: QueryResult,
    pub answer: Option<String>,
}

pub struct Assistant {
    provider: Arc<dyn Provider>,
    data: Arc<dyn DataSource>,
    memory: ConversationMemory,
    guard: SqlGuard,
    model: String,
    mode: ChatMode,
    sampling: CompletionConfig,
    allowed_tables: Vec<String>,
    narrate: bool,
}

fn require<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("Missing {what}")));
    }
    Ok(trimmed)
}

impl Assistant {
    pub fn new(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        data: Arc<dyn DataSource>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        let memory = ConversationMemory::new(store, data.clone(), config.context.recent_orders_limit)
            .with_idle_ttl_secs(config.memory.idle_ttl_secs);

        Self {
            provider,
            data,
            memory,
            guard: SqlGuard::from_config(&config.query),
            model: config.provider.model.clone(),
            mode: config.gateway.chat_mode,
            sampling: config.completion.clone(),
            allowed_tables: config.query.allowed_tables.clone(),
            narrate: config.query.narrate,
        }
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn data(&self) -> &Arc<dyn DataSource> {
        &self.data
    }

    async fn complete(&self, messages: Vec<Message>, sampling: SamplingConfig) -> Result<String> {
        let request = ProviderRequest::new(&self.model, messages)
            .with_temperature(sampling.temperature)
            .with_max_tokens(sampling.max_tokens);
        let response = self.provider.complete(request).await.inspect_err(|e| {
            warn!(provider = self.provider.name(), error = %e, "Completion failed");
        })?;
        Ok(response.content)
    }

    /// Stateful contextual chat.
    ///
    /// The user message is stored before the completion call, so a failed call
    /// leaves it in the history without a reply.
    pub async fn chat(&self, identity: &str, message: &str) -> Result<ChatOutcome> {
        let identity = require(identity, "user-id header")?;
        let message = require(message, "message")?;

        let _guard = self.memory.lock(identity).await;

        let mut conversation = self.memory.get_or_create(identity).await?;
        let user = Message::user(message);
        conversation.push(user.clone())?;
        self.memory.append(identity, user).await?;

        debug!(identity = %identity, history_len = conversation.len(), "Sending chat turn");
        let answer = self
            .complete(conversation.messages().to_vec(), self.sampling.chat)
            .await?;

        let history_len = self
            .memory
            .append(identity, Message::assistant(answer.clone()))
            .await?;

        Ok(ChatOutcome {
            answer,
            history_len,
        })
    }

    /// Stateless contextual Q&A: fresh context, nothing remembered.
    pub async fn ask(&self, message: &str) -> Result<AskOutcome> {
        let message = require(message, "message")?;

        let context = self.memory.build_context(PromptStyle::OneShot).await?;
        let messages = vec![Message::system(context.clone()), Message::user(message)];
        let answer = self.complete(messages, self.sampling.ask).await?;

        Ok(AskOutcome { answer, context })
    }

    /// Translate a question into SQL, check it, run it, and optionally narrate
    /// the result.
    pub async fn query(&self, message: &str) -> Result<QueryOutcome> {
        let message = require(message, "message")?;

        let reply = self
            .complete(
                text_to_sql::sql_prompt(message, &self.allowed_tables),
                self.sampling.sql,
            )
            .await?;
        let generated = text_to_sql::extract_sql(&reply);
        debug!(sql = %generated, "Generated SQL");

        let sql = self.guard.check(&generated).map_err(|rejection| {
            warn!(sql = %generated, reason = %rejection, "Rejected generated SQL");
            Error::UnsafeQuery {
                sql: generated.clone(),
                reason: rejection.to_string(),
            }
        })?;

        let result = self.data.execute(&sql).await?;
        info!(rows = result.row_count(), "Executed generated query");

        let answer = if self.narrate {
            let prompt = text_to_sql::narration_prompt(message, &sql, &result);
            Some(self.complete(prompt, self.sampling.narrate).await?)
        } else {
            None
        };

        Ok(QueryOutcome {
            sql,
            result,
            answer,
        })
    }

    /// Drop an identity's conversation. Returns whether one existed.
    pub async fn clear(&self, identity: &str) -> Result<bool> {
        let identity = require(identity, "user-id header")?;
        let _guard = self.memory.lock(identity).await;
        self.memory.clear(identity).await
    }

    pub async fn history(&self, identity: &str) -> Result<Conversation> {
        let identity = require(identity, "user-id header")?;
        self.memory.history(identity).await
    }

    /// Render the context prompt the given style would send right now.
    pub async fn context(&self, style: PromptStyle) -> Result<String> {
        self.memory.build_context(style).await
    }
}
