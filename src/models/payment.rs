//! Payment ledger records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

/// One payment, keyed by the provider's reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Provider-issued reference (also used as document ID)
    pub reference: String,
    pub user_id: i64,
    /// Plan identifier being purchased
    pub plan: String,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn pending(
        reference: impl Into<String>,
        user_id: i64,
        plan: &str,
        amount: f64,
        currency: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            reference: reference.into(),
            user_id,
            plan: plan.to_string(),
            amount,
            currency: currency.to_string(),
            status: PaymentStatus::Pending,
            created_at: now,
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = PaymentStatus::Completed;
        self.completed_at = Some(now);
    }
}
