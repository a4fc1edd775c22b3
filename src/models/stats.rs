//! Operator-facing aggregate counters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Service-wide totals for the admin view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub total_users: u64,
    /// Users whose stored tier is not Free (lapsed tiers count until next use)
    pub paid_users: u64,
    pub total_requests: u64,
    /// Sum of completed payment amounts, across currencies
    pub total_revenue: f64,
    /// Completed payment amounts keyed by currency code
    #[serde(default)]
    pub revenue_by_currency: BTreeMap<String, f64>,
}

impl ServiceStats {
    /// Fold one entitlement record into the totals.
    pub fn add_user(&mut self, entitlement: &crate::models::Entitlement) {
        self.total_users += 1;
        if entitlement.tier.is_paid() {
            self.paid_users += 1;
        }
        self.total_requests += entitlement.total_requests;
    }

    /// Fold one payment into the totals. Pending payments are ignored.
    pub fn add_payment(&mut self, payment: &crate::models::Payment) {
        if payment.is_completed() {
            self.total_revenue += payment.amount;
            *self
                .revenue_by_currency
                .entry(payment.currency.clone())
                .or_default() += payment.amount;
        }
    }
}
