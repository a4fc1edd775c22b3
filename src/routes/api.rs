// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Operator API routes.

use crate::error::{AppError, Result};
use crate::models::{plan::CURRENCY_RUB, Entitlement, Payment, ServiceStats, Tier};
use crate::services::Activation;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Operator routes (require the admin bearer token).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/stats", get(get_stats))
        .route("/api/users/{user_id}/entitlement", get(get_entitlement))
        .route("/api/payments", post(create_payment))
        .route("/api/payments/{reference}/complete", post(complete_payment))
}

// ─── Stats ───────────────────────────────────────────────────

async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<ServiceStats>> {
    Ok(Json(state.db.stats().await?))
}

// ─── Entitlements ────────────────────────────────────────────

async fn get_entitlement(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<Entitlement>> {
    state
        .entitlements
        .get(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
}

// ─── Payments ────────────────────────────────────────────────

/// Request to open a pending payment for an external gateway.
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub user_id: i64,
    pub plan: String,
}

async fn create_payment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<Payment>)> {
    let payment = state
        .subscriptions
        .record_pending(request.user_id, &request.plan, CURRENCY_RUB)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// Result of confirming a payment.
#[derive(Debug, Serialize)]
pub struct CompletePaymentResponse {
    /// `false` when the reference had already been applied
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_expiry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_remaining: Option<i64>,
}

async fn complete_payment(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> Result<Json<CompletePaymentResponse>> {
    let response = match state.subscriptions.complete(&reference).await? {
        Activation::Applied(applied) => CompletePaymentResponse {
            applied: true,
            tier: Some(applied.tier),
            tier_expiry: Some(format_utc_rfc3339(applied.tier_expiry)),
            requests_remaining: Some(applied.requests_remaining),
        },
        Activation::AlreadyApplied => CompletePaymentResponse {
            applied: false,
            tier: None,
            tier_expiry: None,
            requests_remaining: None,
        },
    };
    Ok(Json(response))
}
