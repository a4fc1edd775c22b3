// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user entitlement record and the quota decision logic that runs over it.
//!
//! Everything in this module is pure: the caller supplies `now` and persists
//! the mutated record. Serialising concurrent updates for one user is the
//! job of [`crate::services::EntitlementService`].

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ChatModel, SubscriptionPlan, Tier};

/// Sentinel for `requests_remaining` meaning "no limit".
pub const UNLIMITED_REQUESTS: i64 = -1;

/// Default number of free grants per calendar day.
pub const DEFAULT_FREE_DAILY_LIMIT: u32 = 5;

/// Entitlement record stored in Firestore, one per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entitlement {
    /// Telegram user ID (also used as document ID)
    pub user_id: i64,
    pub tier: Tier,
    /// When the paid tier lapses. Always `None` for Free.
    #[serde(default)]
    pub tier_expiry: Option<DateTime<Utc>>,
    /// Paid-tier balance, or [`UNLIMITED_REQUESTS`]
    #[serde(default)]
    pub requests_remaining: i64,
    /// Free grants used on `last_request_date`
    #[serde(default)]
    pub requests_used_today: u32,
    /// Calendar day (UTC) of the last daily reset check
    pub last_request_date: NaiveDate,
    /// Lifetime grant counter
    #[serde(default)]
    pub total_requests: u64,
    #[serde(default)]
    pub selected_model: ChatModel,

    // ─── Profile ─────────────────────────────────────────────────
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    pub registered_at: DateTime<Utc>,
}

/// Profile fields captured from the messaging platform on contact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub username: Option<String>,
    pub first_name: Option<String>,
}

/// Which branch of the quota check granted a request.
///
/// Returned so a grant can be reversed precisely if the request it paid for
/// never produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Unlimited,
    Paid,
    Free,
}

/// Outcome of applying a plan to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanApplied {
    pub tier: Tier,
    pub tier_expiry: DateTime<Utc>,
    pub requests_remaining: i64,
}

impl Entitlement {
    /// Fresh Free-tier record for a user seen for the first time.
    pub fn new(user_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            tier: Tier::Free,
            tier_expiry: None,
            requests_remaining: 0,
            requests_used_today: 0,
            last_request_date: now.date_naive(),
            total_requests: 0,
            selected_model: ChatModel::default(),
            username: None,
            first_name: None,
            registered_at: now,
        }
    }

    /// Copy newer profile data onto the record. Returns `true` if anything changed.
    pub fn merge_profile(&mut self, profile: &UserProfile) -> bool {
        let mut changed = false;
        if profile.username.is_some() && self.username != profile.username {
            self.username = profile.username.clone();
            changed = true;
        }
        if profile.first_name.is_some() && self.first_name != profile.first_name {
            self.first_name = profile.first_name.clone();
            changed = true;
        }
        changed
    }

    pub fn is_unlimited(&self) -> bool {
        self.requests_remaining == UNLIMITED_REQUESTS
    }

    /// Zero the daily counter if the record was last checked on an earlier day.
    ///
    /// Returns `true` if the record changed.
    pub fn reset_daily(&mut self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        if self.last_request_date == today {
            return false;
        }
        self.requests_used_today = 0;
        self.last_request_date = today;
        true
    }

    /// Demote a lapsed paid tier to Free, forfeiting its balance.
    ///
    /// Returns `true` if the record changed.
    pub fn expire_if_lapsed(&mut self, now: DateTime<Utc>) -> bool {
        if self.tier == Tier::Free {
            return false;
        }
        match self.tier_expiry {
            Some(expiry) if expiry < now => {
                self.tier = Tier::Free;
                self.tier_expiry = None;
                self.requests_remaining = 0;
                true
            }
            _ => false,
        }
    }

    /// Run the quota check and consume one request if allowed.
    ///
    /// Order matters: daily reset, expiry, unlimited, paid balance, free
    /// allowance. A denial leaves the counters untouched, although the reset
    /// and expiry steps may still have modified the record.
    pub fn authorize_and_consume(
        &mut self,
        now: DateTime<Utc>,
        free_daily_limit: u32,
    ) -> Option<Grant> {
        self.reset_daily(now);
        self.expire_if_lapsed(now);

        if self.is_unlimited() {
            self.total_requests += 1;
            return Some(Grant::Unlimited);
        }

        if self.tier != Tier::Free && self.requests_remaining > 0 {
            self.requests_remaining -= 1;
            self.total_requests += 1;
            return Some(Grant::Paid);
        }

        if self.requests_used_today < free_daily_limit {
            self.requests_used_today += 1;
            self.total_requests += 1;
            return Some(Grant::Free);
        }

        None
    }

    /// Give back a grant whose request failed.
    ///
    /// A free grant made on an earlier day is not returned to today's
    /// allowance since the daily counter has already been reset.
    ///
    /// A paid grant refunded after a renewal landed mid-request is credited
    /// to the new plan's balance, leaving it one above the plan size.
    pub fn refund(&mut self, grant: Grant, now: DateTime<Utc>) {
        match grant {
            Grant::Unlimited => {}
            Grant::Paid => {
                if self.tier != Tier::Free && !self.is_unlimited() {
                    self.requests_remaining += 1;
                }
            }
            Grant::Free => {
                if self.last_request_date == now.date_naive() {
                    self.requests_used_today = self.requests_used_today.saturating_sub(1);
                }
            }
        }
        self.total_requests = self.total_requests.saturating_sub(1);
    }

    /// Switch to a plan, replacing any previous tier and balance.
    pub fn apply_plan(&mut self, plan: &SubscriptionPlan, now: DateTime<Utc>) -> PlanApplied {
        let expiry = now + Duration::days(plan.duration_days);
        self.tier = plan.tier;
        self.tier_expiry = Some(expiry);
        self.requests_remaining = plan.request_allotment;

        PlanApplied {
            tier: plan.tier,
            tier_expiry: expiry,
            requests_remaining: plan.request_allotment,
        }
    }

    /// Requests the user can still make, for display. `None` means unlimited.
    pub fn remaining_for_display(&self, free_daily_limit: u32) -> Option<i64> {
        if self.is_unlimited() {
            return None;
        }
        if self.tier == Tier::Free {
            return Some(i64::from(free_daily_limit.saturating_sub(self.requests_used_today)));
        }
        Some(self.requests_remaining)
    }
}
