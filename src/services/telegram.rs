// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Telegram Bot API client.
//!
//! Handles:
//! - Text replies, split to the Bot API message size limit
//! - Typing indicator while a reply is generated
//! - Telegram Stars invoices and pre-checkout answers

use crate::error::AppError;
use crate::models::plan::{SubscriptionPlan, CURRENCY_STARS};
use crate::services::subscription::invoice_payload;
use serde::Deserialize;
use serde_json::json;

/// Maximum length of one outbound message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Envelope every Bot API method returns.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API client.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    /// Create a client for the bot identified by `token`.
    pub fn new(api_base: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        }
    }

    /// Send `text`, split into as many messages as needed.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), AppError> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            self.call(
                "sendMessage",
                json!({
                    "chat_id": chat_id,
                    "text": chunk,
                }),
            )
            .await?;
        }
        Ok(())
    }

    /// Show a chat action such as `typing`.
    pub async fn send_chat_action(&self, chat_id: i64, action: &str) -> Result<(), AppError> {
        self.call(
            "sendChatAction",
            json!({
                "chat_id": chat_id,
                "action": action,
            }),
        )
        .await
    }

    /// Send a Telegram Stars invoice for `plan`.
    pub async fn send_invoice(
        &self,
        chat_id: i64,
        plan: &SubscriptionPlan,
        user_id: i64,
    ) -> Result<(), AppError> {
        let title = format!("{} subscription", plan.display_name);
        let description = if plan.is_unlimited() {
            format!("Unlimited access for {} days.", plan.duration_days)
        } else {
            format!(
                "AI access for {} days. {} requests.",
                plan.duration_days, plan.request_allotment
            )
        };

        self.call(
            "sendInvoice",
            json!({
                "chat_id": chat_id,
                "title": title,
                "description": description,
                "payload": invoice_payload(plan.id, user_id),
                "provider_token": "",
                "currency": CURRENCY_STARS,
                "prices": [{ "label": title, "amount": plan.stars_price }],
            }),
        )
        .await
    }

    /// Approve or reject a pending checkout.
    pub async fn answer_pre_checkout_query(
        &self,
        query_id: &str,
        ok: bool,
        error_message: Option<&str>,
    ) -> Result<(), AppError> {
        let mut body = json!({
            "pre_checkout_query_id": query_id,
            "ok": ok,
        });
        if let Some(message) = error_message {
            body["error_message"] = json!(message);
        }
        self.call("answerPreCheckoutQuery", body).await
    }

    /// Invoke a Bot API method and check the `ok` envelope.
    async fn call(&self, method: &str, body: serde_json::Value) -> Result<(), AppError> {
        let url = format!("{}/{}", self.base_url, method);

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            // The request URL embeds the bot token.
            .map_err(|e| {
                AppError::Transport(format!("{} request failed: {}", method, e.without_url()))
            })?;

        let status = response.status();
        let envelope: Option<ApiResponse> = response.json().await.ok();

        match envelope {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(ApiResponse { description, .. }) => Err(AppError::Transport(format!(
                "{} failed with HTTP {}: {}",
                method,
                status.as_u16(),
                description.unwrap_or_default()
            ))),
            None => Err(AppError::Transport(format!(
                "{} failed with HTTP {}",
                method,
                status.as_u16()
            ))),
        }
    }
}

/// Split `text` into pieces of at most `max_chars` characters.
///
/// Cuts fall on character boundaries only; no re-wrapping at words or lines.
/// Empty input yields no pieces.
pub fn split_message(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let cut = rest
            .char_indices()
            .nth(max_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(cut);
        chunks.push(head);
        rest = tail;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_long_reply() {
        let text = "a".repeat(10_000);
        let lengths: Vec<usize> = split_message(&text, MAX_MESSAGE_CHARS)
            .iter()
            .map(|c| c.chars().count())
            .collect();
        assert_eq!(lengths, vec![4096, 4096, 1808]);
    }

    #[test]
    fn test_split_short_and_exact() {
        assert_eq!(split_message("hello", MAX_MESSAGE_CHARS), vec!["hello"]);

        let exact = "b".repeat(MAX_MESSAGE_CHARS);
        assert_eq!(split_message(&exact, MAX_MESSAGE_CHARS).len(), 1);

        assert!(split_message("", MAX_MESSAGE_CHARS).is_empty());
    }

    #[test]
    fn test_split_never_breaks_multibyte_chars() {
        let text = "привет🙂".repeat(1000);
        let chunks = split_message(&text, MAX_MESSAGE_CHARS);

        assert_eq!(chunks.concat(), text);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_MESSAGE_CHARS));
        assert_eq!(chunks[0].chars().count(), MAX_MESSAGE_CHARS);
    }

    #[test]
    fn test_base_url_includes_token() {
        let client = TelegramClient::new("https://api.telegram.org/", "123:abc");
        assert_eq!(client.base_url, "https://api.telegram.org/bot123:abc");
    }

    #[tokio::test]
    async fn test_transport_error_omits_token() {
        // Nothing listens on the discard port.
        let client = TelegramClient::new("http://127.0.0.1:9", "123456:SECRETTOKEN");

        let err = client.send_message(1, "hi").await.unwrap_err();

        assert!(matches!(err, AppError::Transport(_)));
        let text = err.to_string();
        assert!(text.contains("sendMessage"));
        assert!(!text.contains("SECRETTOKEN"));
        assert!(!text.contains("/bot"));
    }
}
