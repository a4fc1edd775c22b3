// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Entitlement service: quota checks against the stored record.
//!
//! Handles:
//! - Lazy creation of the record on first contact
//! - Per-user locking so concurrent requests cannot both pass a stale check
//! - Refunds for grants whose request never produced a reply

use crate::db::Database;
use crate::error::AppError;
use crate::models::{ChatModel, Entitlement, Grant, UserProfile};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Shared per-user locks type for use in AppState.
pub type UserLocks = Arc<DashMap<i64, Arc<Mutex<()>>>>;

/// Quota gate over the entitlement store.
///
/// Every read-modify-write of an entitlement goes through
/// [`EntitlementService::lock_user`]. The lock is per process; a deployment
/// with several instances must route a given user to one instance.
#[derive(Clone)]
pub struct EntitlementService {
    db: Database,
    locks: UserLocks,
    free_daily_limit: u32,
}

impl EntitlementService {
    /// Create a new entitlement service.
    ///
    /// `locks` must be shared with every other service that mutates
    /// entitlements (see [`crate::services::SubscriptionService`]).
    pub fn new(db: Database, locks: UserLocks, free_daily_limit: u32) -> Self {
        Self {
            db,
            locks,
            free_daily_limit,
        }
    }

    pub fn free_daily_limit(&self) -> u32 {
        self.free_daily_limit
    }

    /// Acquire the user's lock. Held until the guard is dropped.
    pub(crate) async fn lock_user(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Load the record, creating and storing a default one if absent.
    ///
    /// Caller must hold the user's lock.
    pub(crate) async fn load_or_create(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Entitlement, AppError> {
        if let Some(entitlement) = self.db.get_entitlement(user_id).await? {
            return Ok(entitlement);
        }

        let entitlement = Entitlement::new(user_id, now);
        self.db.upsert_entitlement(&entitlement).await?;
        tracing::info!(user_id, "Entitlement created");
        Ok(entitlement)
    }

    /// Get the stored record without creating one.
    pub async fn get(&self, user_id: i64) -> Result<Option<Entitlement>, AppError> {
        self.db.get_entitlement(user_id).await
    }

    /// Make sure the user has a record, refreshing profile fields.
    pub async fn ensure(
        &self,
        user_id: i64,
        profile: &UserProfile,
    ) -> Result<Entitlement, AppError> {
        let _guard = self.lock_user(user_id).await;

        let mut entitlement = self.load_or_create(user_id, Utc::now()).await?;
        if entitlement.merge_profile(profile) {
            self.db.upsert_entitlement(&entitlement).await?;
        }
        Ok(entitlement)
    }

    /// Check the quota and consume one request if allowed.
    pub async fn authorize_and_consume(&self, user_id: i64) -> Result<bool, AppError> {
        Ok(self.consume(user_id).await?.is_some())
    }

    /// Like [`Self::authorize_and_consume`], but reports which grant fired.
    pub async fn consume(&self, user_id: i64) -> Result<Option<Grant>, AppError> {
        self.consume_at(user_id, Utc::now()).await
    }

    /// Consume at an explicit time.
    pub async fn consume_at(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Grant>, AppError> {
        let _guard = self.lock_user(user_id).await;

        let mut entitlement = self.load_or_create(user_id, now).await?;
        let before = entitlement.clone();
        let grant = entitlement.authorize_and_consume(now, self.free_daily_limit);

        // A denial can still carry a daily reset or a demotion.
        if entitlement != before {
            self.db.upsert_entitlement(&entitlement).await?;
        }

        match grant {
            Some(grant) => tracing::debug!(
                user_id,
                ?grant,
                total_requests = entitlement.total_requests,
                "Request granted"
            ),
            None => tracing::info!(
                user_id,
                tier = %entitlement.tier,
                used_today = entitlement.requests_used_today,
                "Request denied: quota exhausted"
            ),
        }

        Ok(grant)
    }

    /// Reverse a grant whose request failed.
    pub async fn refund(&self, user_id: i64, grant: Grant) -> Result<(), AppError> {
        self.refund_at(user_id, grant, Utc::now()).await
    }

    pub async fn refund_at(
        &self,
        user_id: i64,
        grant: Grant,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let _guard = self.lock_user(user_id).await;

        let Some(mut entitlement) = self.db.get_entitlement(user_id).await? else {
            tracing::warn!(user_id, "Refund for unknown user ignored");
            return Ok(());
        };

        entitlement.refund(grant, now);
        self.db.upsert_entitlement(&entitlement).await?;
        tracing::info!(user_id, ?grant, "Grant refunded");
        Ok(())
    }

    /// Record the user's preferred generation backend.
    pub async fn set_model(&self, user_id: i64, model: ChatModel) -> Result<(), AppError> {
        let _guard = self.lock_user(user_id).await;

        let mut entitlement = self.load_or_create(user_id, Utc::now()).await?;
        entitlement.selected_model = model;
        self.db.upsert_entitlement(&entitlement).await?;
        tracing::info!(user_id, model = %model, "Model selected");
        Ok(())
    }
}
