// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Telegram webhook authentication middleware.

use crate::middleware::auth::tokens_match;
use crate::AppState;
use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Header Telegram sets to the secret given in `setWebhook`.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Require the configured path UUID and secret-token header on webhook routes.
pub async fn require_telegram_secret(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if uuid != state.config.webhook_path_uuid {
        tracing::warn!(
            received_uuid = %uuid,
            "Security Alert: Webhook path UUID mismatch"
        );
        return Err(StatusCode::NOT_FOUND);
    }

    let secret = request
        .headers()
        .get(SECRET_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok());

    let is_valid = secret
        .map(|s| tokens_match(s, &state.config.webhook_secret_token))
        .unwrap_or(false);

    if !is_valid {
        tracing::warn!(
            has_header = secret.is_some(),
            "Blocked webhook request with invalid secret token"
        );
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}
