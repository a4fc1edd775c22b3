// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook route for Telegram updates.
//!
//! Authentication (path UUID and secret header) is applied in
//! routes/mod.rs. Once authenticated, every update is answered with 200 so
//! Telegram does not redeliver it; failures are logged and, where a chat is
//! known, reported to the user.

use crate::commands::Command;
use crate::error::AppError;
use crate::models::{plan, ChatModel, Entitlement, ServiceStats, UserProfile};
use crate::services::subscription::parse_invoice_payload;
use crate::services::Activation;
use crate::AppState;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::post,
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/telegram/webhook/{uuid}", post(handle_update))
}

// ─── Update payload (subset of the Bot API types) ────────────

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub pre_checkout_query: Option<PreCheckoutQuery>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub successful_payment: Option<SuccessfulPayment>,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

impl User {
    fn profile(&self) -> UserProfile {
        UserProfile {
            username: self.username.clone(),
            first_name: self.first_name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct PreCheckoutQuery {
    pub id: String,
    pub from: User,
    pub invoice_payload: String,
}

#[derive(Debug, Deserialize)]
pub struct SuccessfulPayment {
    pub currency: String,
    pub total_amount: i64,
    pub invoice_payload: String,
    pub telegram_payment_charge_id: String,
}

// ─── Handler ─────────────────────────────────────────────────

/// Handle an incoming update (POST).
async fn handle_update(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> StatusCode {
    let update: Update = match serde_json::from_value(payload) {
        Ok(u) => u,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse Telegram update");
            return StatusCode::OK; // Still return 200 to avoid redelivery
        }
    };

    tracing::debug!(update_id = update.update_id, "Telegram update received");

    let result = if let Some(query) = update.pre_checkout_query {
        handle_pre_checkout(&state, query).await
    } else if let Some(message) = update.message {
        handle_message(&state, message).await
    } else {
        Ok(())
    };

    if let Err(e) = result {
        e.log();
    }

    StatusCode::OK
}

async fn handle_pre_checkout(state: &AppState, query: PreCheckoutQuery) -> Result<(), AppError> {
    let known_plan = parse_invoice_payload(&query.invoice_payload)
        .is_some_and(|(plan_id, _)| plan::find(plan_id).is_some());

    if known_plan {
        state
            .telegram
            .answer_pre_checkout_query(&query.id, true, None)
            .await
    } else {
        tracing::warn!(
            user_id = query.from.id,
            payload = %query.invoice_payload,
            "Rejected checkout for unknown plan"
        );
        state
            .telegram
            .answer_pre_checkout_query(&query.id, false, Some("Plan not found"))
            .await
    }
}

async fn handle_message(state: &AppState, message: Message) -> Result<(), AppError> {
    let Some(from) = message.from.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat.id;

    let outcome = if let Some(payment) = &message.successful_payment {
        handle_successful_payment(state, payment).await.map(Some)
    } else if let Some(text) = message.text.as_deref() {
        match Command::parse(text) {
            Some(command) => run_command(state, chat_id, from, command).await,
            None => chat(state, chat_id, from, text).await.map(Some),
        }
    } else {
        Ok(None)
    };

    let reply = match outcome {
        Ok(Some(reply)) => reply,
        Ok(None) => return Ok(()),
        Err(e) => {
            e.log();
            e.user_message()
        }
    };

    state.telegram.send_message(chat_id, &reply).await
}

async fn chat(state: &AppState, chat_id: i64, from: &User, text: &str) -> Result<String, AppError> {
    if let Err(e) = state.telegram.send_chat_action(chat_id, "typing").await {
        tracing::debug!(error = %e, "Typing indicator failed");
    }

    state.chat.handle_text(from.id, &from.profile(), text).await
}

/// Run a command. `Ok(None)` means nothing is sent back.
async fn run_command(
    state: &AppState,
    chat_id: i64,
    from: &User,
    command: Command<'_>,
) -> Result<Option<String>, AppError> {
    let free_daily_limit = state.config.free_daily_limit;

    let reply = match command {
        Command::Start => {
            let entitlement = state.entitlements.ensure(from.id, &from.profile()).await?;
            welcome_text(entitlement.first_name.as_deref(), free_daily_limit)
        }
        Command::Help => help_text(),
        Command::Clear => {
            state.conversations.clear(from.id).await?;
            "🗑 Chat history cleared!".to_string()
        }
        Command::Profile => {
            let entitlement = state.entitlements.ensure(from.id, &from.profile()).await?;
            profile_text(&entitlement, free_daily_limit)
        }
        Command::Plans => plans_text(),
        Command::Model(None) => {
            let entitlement = state.entitlements.ensure(from.id, &from.profile()).await?;
            models_text(entitlement.selected_model)
        }
        Command::Model(Some(id)) => {
            let model = ChatModel::from_id(&id.to_ascii_lowercase())
                .ok_or_else(|| AppError::NotFound(format!("model {}", id)))?;
            state.entitlements.set_model(from.id, model).await?;
            format!("✅ AI model changed to {}!", model)
        }
        Command::Buy(None) => {
            return Err(AppError::BadRequest(
                "Usage: /buy <plan>. See /plans.".to_string(),
            ))
        }
        Command::Buy(Some(id)) => {
            let plan = plan::find(&id.to_ascii_lowercase())
                .ok_or_else(|| AppError::NotFound(format!("plan {}", id)))?;
            state.telegram.send_invoice(chat_id, plan, from.id).await?;
            tracing::info!(user_id = from.id, plan = plan.id, "Invoice sent");
            return Ok(None);
        }
        Command::Admin => {
            if !state.config.is_admin(from.id) {
                return Ok(None);
            }
            admin_text(&state.db.stats().await?)
        }
    };

    Ok(Some(reply))
}

async fn handle_successful_payment(
    state: &AppState,
    payment: &SuccessfulPayment,
) -> Result<String, AppError> {
    let (plan_id, user_id) = parse_invoice_payload(&payment.invoice_payload).ok_or_else(|| {
        AppError::BadRequest(format!("unrecognised invoice {}", payment.invoice_payload))
    })?;
    let reference = payment.telegram_payment_charge_id.as_str();

    state
        .subscriptions
        .record_pending_with_reference(
            reference,
            user_id,
            plan_id,
            payment.total_amount as f64,
            &payment.currency,
        )
        .await?;

    let reply = match state.subscriptions.activate(user_id, plan_id, reference).await? {
        Activation::Applied(applied) => {
            let name = plan::find(plan_id).map_or(plan_id, |p| p.display_name);
            format!(
                "🎉 Payment successful!\n\n\
                 {} subscription is active until {}.\n\
                 Enjoy! 🚀",
                name,
                applied.tier_expiry.format("%Y-%m-%d")
            )
        }
        Activation::AlreadyApplied => "✅ This payment has already been applied.".to_string(),
    };
    Ok(reply)
}

// ─── Reply texts ─────────────────────────────────────────────

fn welcome_text(first_name: Option<&str>, free_daily_limit: u32) -> String {
    let models: Vec<&str> = ChatModel::ALL.iter().map(|m| m.id()).collect();
    format!(
        "👋 Hi, {}!\n\n\
         I'm an AI assistant with access to several models: {}.\n\n\
         📨 Just send a message and I'll answer!\n\n\
         🆓 Free: {} requests per day\n\
         💎 Subscription: more requests, see /plans",
        first_name.unwrap_or("there"),
        models.join(", "),
        free_daily_limit
    )
}

fn help_text() -> String {
    "❓ Help\n\n\
     🔹 Just send a message and the AI will answer\n\
     🔹 /clear: clear chat history\n\
     🔹 /model: choose the AI model\n\
     🔹 /plans: subscription plans\n\
     🔹 /buy <plan>: pay with Telegram Stars\n\
     🔹 /profile: your profile and remaining requests\n\n\
     💡 The AI remembers the context of the conversation!"
        .to_string()
}

fn plans_text() -> String {
    let lines: Vec<String> = plan::PLANS
        .iter()
        .map(|p| format!("• {} or {} ⭐", p.summary(), p.stars_price))
        .collect();
    format!(
        "💎 Subscription plans\n\n{}\n\nBuy with /buy <plan>, e.g. /buy pro",
        lines.join("\n")
    )
}

fn models_text(current: ChatModel) -> String {
    let ids: Vec<&str> = ChatModel::ALL.iter().map(|m| m.id()).collect();
    format!(
        "🤖 Current model: {}\n\nAvailable: {}\n\nChange with /model <id>",
        current,
        ids.join(", ")
    )
}

/// Profile as the user would see it right now, with lazy reset and expiry
/// applied to a copy so stale counters are not shown.
fn profile_text(entitlement: &Entitlement, free_daily_limit: u32) -> String {
    let now = Utc::now();
    let mut view = entitlement.clone();
    view.reset_daily(now);
    view.expire_if_lapsed(now);

    let plan_name = plan::for_tier(view.tier).map_or("Free", |p| p.display_name);
    let remaining = match view.remaining_for_display(free_daily_limit) {
        None => "∞".to_string(),
        Some(n) if view.tier.is_paid() => n.to_string(),
        Some(n) => format!("{}/{}", n, free_daily_limit),
    };
    let expiry = view
        .tier_expiry
        .map(|t| format!(" (until {})", t.format("%Y-%m-%d")))
        .unwrap_or_default();

    format!(
        "👤 Your profile\n\n\
         🆔 ID: {}\n\
         📅 Registered: {}\n\n\
         💎 Subscription: {}{}\n\
         🤖 AI model: {}\n\
         📊 Requests left: {}\n\
         📈 Total requests: {}",
        view.user_id,
        view.registered_at.format("%Y-%m-%d"),
        plan_name,
        expiry,
        view.selected_model,
        remaining,
        view.total_requests
    )
}

fn admin_text(stats: &ServiceStats) -> String {
    let revenue = if stats.revenue_by_currency.is_empty() {
        "0".to_string()
    } else {
        stats
            .revenue_by_currency
            .iter()
            .map(|(currency, amount)| format!("{} {}", amount, currency))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "📊 Admin panel\n\n\
         👥 Users: {}\n\
         💎 Paid: {}\n\
         📨 Requests: {}\n\
         💰 Revenue: {}",
        stats.total_users, stats.paid_users, stats.total_requests, revenue
    )
}
