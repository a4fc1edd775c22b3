// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Entitlements (one document per user)
//! - Messages (append-only conversation log)
//! - Payments (ledger keyed by provider reference)

use crate::db::collections;
use crate::error::AppError;
use crate::models::{ConversationEntry, Entitlement, Payment, ServiceStats};

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| {
                AppError::Persistence(format!("Failed to connect to Firestore: {}", e))
            })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Persistence(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a disconnected client (offline mode).
    ///
    /// All database operations will return a persistence error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client.as_ref().ok_or_else(|| {
            AppError::Persistence("Database not connected (offline mode)".to_string())
        })
    }

    // ─── Entitlement Operations ──────────────────────────────────

    /// Get a user's entitlement record.
    pub async fn get_entitlement(&self, user_id: i64) -> Result<Option<Entitlement>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ENTITLEMENTS)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }

    /// Create or replace a user's entitlement record.
    pub async fn upsert_entitlement(&self, entitlement: &Entitlement) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ENTITLEMENTS)
            .document_id(entitlement.user_id.to_string())
            .object(entitlement)
            .execute()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;
        Ok(())
    }

    // ─── Conversation Operations ─────────────────────────────────

    /// Append one entry to a user's conversation log.
    pub async fn append_message(&self, entry: &ConversationEntry) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::MESSAGES)
            .document_id(message_doc_id(entry))
            .object(entry)
            .execute()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;
        Ok(())
    }

    /// Most recent `limit` entries for a user, oldest first.
    pub async fn recent_messages(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<ConversationEntry>, AppError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut entries: Vec<ConversationEntry> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::MESSAGES)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id)]))
            .order_by([("created_at", firestore::FirestoreQueryDirection::Descending)])
            .limit(u32::try_from(limit).unwrap_or(u32::MAX))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;

        entries.reverse();
        Ok(entries)
    }

    /// Delete every entry in a user's conversation log.
    ///
    /// Returns the number of entries deleted.
    pub async fn clear_messages(&self, user_id: i64) -> Result<usize, AppError> {
        let entries: Vec<ConversationEntry> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::MESSAGES)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;

        let count = entries.len();
        self.batch_delete(&entries, collections::MESSAGES, message_doc_id)
            .await?;

        tracing::debug!(user_id, count, "Deleted conversation entries");
        Ok(count)
    }

    // ─── Payment Operations ──────────────────────────────────────

    /// Get a payment by its provider reference.
    pub async fn get_payment(&self, reference: &str) -> Result<Option<Payment>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PAYMENTS)
            .obj()
            .one(&payment_doc_id(reference))
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }

    /// Create a payment record unless one already exists for its reference.
    ///
    /// Returns the existing record on conflict, which is left untouched.
    pub async fn insert_payment_if_absent(
        &self,
        payment: &Payment,
    ) -> Result<Option<Payment>, AppError> {
        let inserted: Result<Payment, _> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::PAYMENTS)
            .document_id(payment_doc_id(&payment.reference))
            .object(payment)
            .execute()
            .await;

        match inserted {
            Ok(_) => Ok(None),
            Err(e) => match self.get_payment(&payment.reference).await? {
                Some(existing) => Ok(Some(existing)),
                None => Err(AppError::Persistence(e.to_string())),
            },
        }
    }

    // ─── Atomic Activation ───────────────────────────────────────

    /// Write an activated entitlement and its completed payment together.
    ///
    /// The payment is re-read inside the transaction. Returns `false` without
    /// writing anything if it is already completed.
    pub async fn commit_activation(
        &self,
        entitlement: &Entitlement,
        payment: &Payment,
    ) -> Result<bool, AppError> {
        let client = self.get_client()?;
        let doc_id = payment_doc_id(&payment.reference);

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to begin transaction: {}", e)))?;

        let current: Option<Payment> = client
            .fluent()
            .select()
            .by_id_in(collections::PAYMENTS)
            .obj()
            .one(&doc_id)
            .await
            .map_err(|e| {
                AppError::Persistence(format!("Failed to read payment in transaction: {}", e))
            })?;

        if current.is_some_and(|p| p.is_completed()) {
            let _ = transaction.rollback().await;
            return Ok(false);
        }

        client
            .fluent()
            .update()
            .in_col(collections::ENTITLEMENTS)
            .document_id(entitlement.user_id.to_string())
            .object(entitlement)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Persistence(format!("Failed to add entitlement to transaction: {}", e))
            })?;

        client
            .fluent()
            .update()
            .in_col(collections::PAYMENTS)
            .document_id(&doc_id)
            .object(payment)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Persistence(format!("Failed to add payment to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Persistence(format!("Transaction commit failed: {}", e)))?;

        Ok(true)
    }

    // ─── Aggregates ──────────────────────────────────────────────

    /// Compute service-wide totals.
    ///
    /// Scans every entitlement and completed payment; this is an operator
    /// view and is not on any chat path.
    pub async fn stats(&self) -> Result<ServiceStats, AppError> {
        let client = self.get_client()?;

        let entitlements: Vec<Entitlement> = client
            .fluent()
            .select()
            .from(collections::ENTITLEMENTS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;

        let payments: Vec<Payment> = client
            .fluent()
            .select()
            .from(collections::PAYMENTS)
            .filter(|q| q.for_all([q.field("status").eq("completed")]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;

        let mut stats = ServiceStats::default();
        entitlements.iter().for_each(|e| stats.add_user(e));
        payments.iter().for_each(|p| stats.add_payment(p));
        Ok(stats)
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client.begin_transaction().await.map_err(|e| {
                AppError::Persistence(format!("Failed to begin transaction: {}", e))
            })?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Persistence(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Persistence(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Document ID for a conversation entry: user, insertion time and role.
fn message_doc_id(entry: &ConversationEntry) -> String {
    let role = match entry.role {
        crate::models::Role::System => "system",
        crate::models::Role::User => "user",
        crate::models::Role::Assistant => "assistant",
    };
    format!(
        "{}_{}_{}",
        entry.user_id,
        urlencoding::encode(&entry.created_at),
        role
    )
}

/// Provider references are opaque; encode them so `/` cannot split the path.
fn payment_doc_id(reference: &str) -> String {
    urlencoding::encode(reference).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_message_doc_id_is_path_safe() {
        let entry = ConversationEntry {
            user_id: 7,
            role: Role::Assistant,
            content: "hi".to_string(),
            created_at: "2026-01-02T03:04:05.000000001Z".to_string(),
        };
        let id = message_doc_id(&entry);
        assert!(id.starts_with("7_2026-01-02T03%3A04%3A05"));
        assert!(id.ends_with("_assistant"));
        assert!(!id.contains('/'));
    }

    #[test]
    fn test_payment_doc_id_encodes_slashes() {
        assert_eq!(payment_doc_id("a/b"), "a%2Fb");
        assert_eq!(payment_doc_id("charge_123"), "charge_123");
    }

    #[tokio::test]
    async fn test_offline_client_reports_persistence_error() {
        let db = FirestoreDb::new_mock();
        let err = db.get_entitlement(1).await.unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
    }
}
