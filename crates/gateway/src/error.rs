//! API errors and their JSON bodies.
//!
//! Every failure is returned as `{"error": "..."}`; a rejected generated
//! statement also carries `sql_query`.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use maitred_core::error::{Error, StoreError};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400: missing header, body or message.
    BadRequest(String),
    /// 404: no conversation for the caller.
    NotFound(String),
    /// 422: generated SQL refused before execution.
    UnsafeQuery { sql: String, message: String },
    /// 500: database or completion failure, message surfaced as-is.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, sql_query) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::UnsafeQuery { sql, message } => {
                (StatusCode::UNPROCESSABLE_ENTITY, message, Some(sql))
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
        };

        (status, Json(ErrorResponse { error, sql_query })).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::UnsafeQuery { sql, reason } => ApiError::UnsafeQuery {
                sql,
                message: format!("Unsafe query rejected: {reason}"),
            },
            Error::Store(StoreError::UnknownIdentity(identity)) => {
                ApiError::NotFound(format!("No chat history for '{identity}'"))
            }
            other => {
                warn!(error = %other, "Request failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maitred_core::error::{DatabaseError, ProviderError};

    #[test]
    fn core_errors_map_to_status() {
        let cases = [
            (Error::InvalidInput("Missing message".into()), StatusCode::BAD_REQUEST),
            (
                Error::Store(StoreError::UnknownIdentity("alice".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                Error::UnsafeQuery {
                    sql: "DROP TABLE users".into(),
                    reason: "no".into(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                Error::Database(DatabaseError::Query("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                Error::Provider(ProviderError::Timeout("slow".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn internal_message_is_surfaced() {
        let api = ApiError::from(Error::Database(DatabaseError::Query(
            "relation \"orders\" does not exist".into(),
        )));
        match api {
            ApiError::Internal(msg) => assert!(msg.contains("relation \"orders\" does not exist")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
