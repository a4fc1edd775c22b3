// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! chat-relay API server
//!
//! Receives Telegram updates by webhook, answers them through a
//! text-generation backend and serves the operator API.

use chat_relay::{config::Config, db::Database, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting chat-relay");

    // Firestore when a project is configured, otherwise in-memory
    let db = Database::connect(config.gcp_project_id.as_deref()).await?;

    let state = Arc::new(AppState::new(config.clone(), db)?);
    tracing::info!(
        free_daily_limit = config.free_daily_limit,
        context_limit = config.context_limit,
        admins = config.admin_user_ids.len(),
        "Services initialized"
    );

    // Build router
    let app = chat_relay::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chat_relay=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
