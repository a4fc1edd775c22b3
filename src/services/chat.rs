// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chat orchestration: quota gate, context, generation, log.

use crate::error::AppError;
use crate::models::{ChatMessage, Entitlement, Role, UserProfile};
use crate::services::{ConversationLog, EntitlementService, GenerationClient};

/// Turns one inbound user message into one generated reply.
#[derive(Clone)]
pub struct ChatService {
    entitlements: EntitlementService,
    conversations: ConversationLog,
    generator: GenerationClient,
    system_prompt: String,
}

impl ChatService {
    pub fn new(
        entitlements: EntitlementService,
        conversations: ConversationLog,
        generator: GenerationClient,
        system_prompt: String,
    ) -> Self {
        Self {
            entitlements,
            conversations,
            generator,
            system_prompt,
        }
    }

    /// Answer `text` for `user_id`.
    ///
    /// A grant is consumed before the backend is called and refunded if the
    /// call fails. The exchange is logged only when a reply was produced.
    pub async fn handle_text(
        &self,
        user_id: i64,
        profile: &UserProfile,
        text: &str,
    ) -> Result<String, AppError> {
        let entitlement = self.entitlements.ensure(user_id, profile).await?;

        let grant = self
            .entitlements
            .consume(user_id)
            .await?
            .ok_or(AppError::QuotaExhausted {
                free_daily_limit: self.entitlements.free_daily_limit(),
            })?;

        let reply = match self.generate(user_id, &entitlement, text).await {
            Ok(reply) => reply,
            Err(err) => {
                if let Err(refund_err) = self.entitlements.refund(user_id, grant).await {
                    tracing::error!(
                        user_id,
                        error = %refund_err,
                        "Refund after failed generation failed"
                    );
                }
                return Err(err);
            }
        };

        self.conversations
            .append_exchange(user_id, text, &reply)
            .await?;

        tracing::info!(
            user_id,
            model = %entitlement.selected_model,
            reply_chars = reply.chars().count(),
            "Reply generated"
        );
        Ok(reply)
    }

    async fn generate(
        &self,
        user_id: i64,
        entitlement: &Entitlement,
        text: &str,
    ) -> Result<String, AppError> {
        let history = self.conversations.context(user_id).await?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::new(Role::System, self.system_prompt.as_str()));
        messages.extend(history);
        messages.push(ChatMessage::new(Role::User, text));

        self.generator
            .generate(entitlement.selected_model, &messages)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use dashmap::DashMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn service(db: &Database) -> ChatService {
        // Nothing listens on the discard port.
        service_with(db, "http://127.0.0.1:9/", Duration::from_secs(2))
    }

    fn service_with(db: &Database, url: &str, timeout: Duration) -> ChatService {
        let entitlements = EntitlementService::new(db.clone(), Arc::new(DashMap::new()), 5);
        let conversations = ConversationLog::new(db.clone(), 10);
        let generator = GenerationClient::new(url, timeout).unwrap();
        ChatService::new(entitlements, conversations, generator, "be nice".to_string())
    }

    /// Serve a backend that answers only after `delay`.
    async fn slow_backend(delay: Duration) -> String {
        let app = axum::Router::new().route(
            "/",
            axum::routing::post(move || async move {
                tokio::time::sleep(delay).await;
                axum::Json(serde_json::json!({ "response": "too late" }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_unreachable_backend_refunds_grant() {
        let db = Database::in_memory();
        let chat = service(&db);

        let err = chat
            .handle_text(1, &UserProfile::default(), "hello")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BackendUnavailable(_)));
        let ent = db.get_entitlement(1).await.unwrap().unwrap();
        assert_eq!(ent.requests_used_today, 0);
        assert_eq!(ent.total_requests, 0);
        assert!(db.recent_messages(1, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backend_timeout_refunds_grant() {
        let db = Database::in_memory();
        let url = slow_backend(Duration::from_secs(5)).await;
        let chat = service_with(&db, &url, Duration::from_millis(300));

        let err = chat
            .handle_text(1, &UserProfile::default(), "hello")
            .await
            .unwrap_err();

        match err {
            AppError::BackendUnavailable(msg) => assert!(msg.contains("timed out")),
            other => panic!("unexpected error: {:?}", other),
        }
        let ent = db.get_entitlement(1).await.unwrap().unwrap();
        assert_eq!(ent.requests_used_today, 0);
        assert_eq!(ent.total_requests, 0);
        assert!(db.recent_messages(1, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_quota_skips_backend() {
        let db = Database::in_memory();
        let chat = service(&db);
        let mut ent = Entitlement::new(1, chrono::Utc::now());
        ent.requests_used_today = 5;
        db.upsert_entitlement(&ent).await.unwrap();

        let err = chat
            .handle_text(1, &UserProfile::default(), "hello")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::QuotaExhausted {
                free_daily_limit: 5
            }
        ));
    }
}
