//! `/ai` endpoints.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use maitred_config::ChatMode;
use maitred_core::data::QueryResult;
use maitred_core::message::Message;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::SharedState;
use crate::error::ApiError;

/// Header carrying the caller identity in stateful mode.
pub const USER_ID_HEADER: &str = "user-id";

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_history_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_used: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub user_id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub sql_query: String,
    pub result: QueryResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

fn user_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest("Missing user-id header".into()))
}

fn message(payload: Result<Json<MessageRequest>, JsonRejection>) -> Result<String, ApiError> {
    let Json(body) = payload?;
    body.message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing message".into()))
}

/// `POST /ai/chat`: contextual chat, with memory in stateful mode.
pub async fn chat_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    match state.assistant.mode() {
        ChatMode::Stateful => {
            let identity = user_id(&headers)?;
            let message = message(payload)?;
            debug!(identity = %identity, "Chat request");

            let outcome = state.assistant.chat(&identity, &message).await?;
            Ok(Json(ChatResponse {
                answer: outcome.answer,
                chat_history_length: Some(outcome.history_len),
                context_used: None,
            }))
        }
        ChatMode::Stateless => {
            let message = message(payload)?;
            debug!("Stateless chat request");

            let outcome = state.assistant.ask(&message).await?;
            Ok(Json(ChatResponse {
                answer: outcome.answer,
                chat_history_length: None,
                context_used: state.expose_context.then_some(outcome.context),
            }))
        }
    }
}

/// `POST /ai/clear`: forget the caller's conversation.
pub async fn clear_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, ApiError> {
    if state.assistant.mode() == ChatMode::Stateless {
        return Ok(Json(StatusResponse {
            status: "Stateless mode: no chat memory to clear".into(),
        }));
    }

    let identity = user_id(&headers)?;
    let existed = state.assistant.clear(&identity).await?;
    info!(identity = %identity, existed, "Clear request");
    Ok(Json(StatusResponse {
        status: "Chat memory cleared".into(),
    }))
}

/// `GET /ai/history`: the caller's stored messages.
pub async fn history_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<HistoryResponse>, ApiError> {
    if state.assistant.mode() == ChatMode::Stateless {
        return Err(ApiError::NotFound(
            "Chat history is not kept in stateless mode".into(),
        ));
    }

    let identity = user_id(&headers)?;
    let conversation = state.assistant.history(&identity).await?;
    Ok(Json(HistoryResponse {
        user_id: identity,
        messages: conversation.messages().to_vec(),
    }))
}

/// `POST /ai/query`: answer a question by generating and running SQL.
pub async fn query_handler(
    State(state): State<SharedState>,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let message = message(payload)?;
    let outcome = state.assistant.query(&message).await?;
    Ok(Json(QueryResponse {
        sql_query: outcome.sql,
        result: outcome.result,
        answer: outcome.answer,
    }))
}
