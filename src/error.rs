// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses and chat replies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Expected outcome when a user has no grants left.
    #[error("Request quota exhausted")]
    QuotaExhausted { free_daily_limit: u32 },

    #[error("Generation backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Telegram API error: {0}")]
    Transport(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    /// Text shown to the chat user for this error.
    pub fn user_message(&self) -> String {
        match self {
            AppError::QuotaExhausted { free_daily_limit } => format!(
                "⚠️ Request limit reached.\n\nFree plan: {} requests per day.\n\n\
                 💎 Get a subscription for more: /plans",
                free_daily_limit
            ),
            AppError::BackendUnavailable(msg) => format!("❌ Error: {}", msg),
            AppError::NotFound(msg) => format!("❌ Not found: {}", msg),
            AppError::BadRequest(msg) => format!("❌ {}", msg),
            AppError::Persistence(_)
            | AppError::Unauthorized
            | AppError::Transport(_)
            | AppError::Internal(_) => {
                "❌ Something went wrong on our side. Please try again later.".to_string()
            }
        }
    }

    /// Emit the logging signal for this error kind.
    pub fn log(&self) {
        match self {
            AppError::QuotaExhausted { .. } => tracing::info!("Quota exhausted"),
            AppError::NotFound(msg) => tracing::debug!(details = %msg, "Not found"),
            AppError::BadRequest(msg) => tracing::debug!(details = %msg, "Bad request"),
            AppError::Unauthorized => tracing::warn!("Unauthorized request"),
            AppError::BackendUnavailable(msg) => {
                tracing::warn!(error = %msg, "Generation backend failure")
            }
            AppError::Transport(msg) => tracing::warn!(error = %msg, "Telegram API failure"),
            AppError::Persistence(msg) => tracing::error!(error = %msg, "Persistence error"),
            AppError::Internal(err) => tracing::error!(error = %err, "Internal server error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();

        let (status, error, details) = match &self {
            AppError::QuotaExhausted { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "quota_exhausted", None)
            }
            AppError::BackendUnavailable(msg) => (
                StatusCode::BAD_GATEWAY,
                "backend_unavailable",
                Some(msg.clone()),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::Transport(msg) => {
                (StatusCode::BAD_GATEWAY, "transport_error", Some(msg.clone()))
            }
            AppError::Persistence(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "persistence_error", None)
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
