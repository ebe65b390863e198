use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::responses::JsonResponse;

/// Single error taxonomy shared by the HTTP surface, the executor and the
/// webhook ingress path. Every variant maps to exactly one status code.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("circuit breaker open for {service}")]
    BreakerOpen { service: String },

    #[error("operation timed out")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("connector failure: {0}")]
    ConnectorFailure(String),

    #[error("internal error")]
    Internal(#[source] anyhow::Error),

    #[error("worker queue overloaded")]
    Overloaded,
}

impl EngineError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound => StatusCode::NOT_FOUND,
            EngineError::Unauthorized => StatusCode::UNAUTHORIZED,
            EngineError::Forbidden => StatusCode::FORBIDDEN,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::BreakerOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            EngineError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::ConnectorFailure(_) => StatusCode::BAD_GATEWAY,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Category string used for the execution-log status/message prefix and
    /// for structured tracing fields, never shown to callers verbatim.
    pub fn category(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::NotFound => "not_found",
            EngineError::Unauthorized => "unauthorized",
            EngineError::Forbidden => "forbidden",
            EngineError::Conflict(_) => "conflict",
            EngineError::BreakerOpen { .. } => "breaker_open",
            EngineError::Timeout => "timeout",
            EngineError::Cancelled => "cancelled",
            EngineError::ConnectorFailure(_) => "connector_failure",
            EngineError::Internal(_) => "internal",
            EngineError::Overloaded => "overloaded",
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => EngineError::NotFound,
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                EngineError::Conflict(db_err.message().to_string())
            }
            other => EngineError::Internal(other.into()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if matches!(self, EngineError::Internal(_)) {
            tracing::error!(error = %self, "internal error");
        }
        let body: JsonResponse<()> = JsonResponse::err(self.to_string());
        (status, Json(body)).into_response()
    }
}
