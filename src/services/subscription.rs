//! Subscription purchase: pending payments and idempotent activation.

use crate::db::Database;
use crate::error::AppError;
use crate::models::{plan, Payment, PlanApplied};
use crate::services::EntitlementService;
use chrono::{DateTime, Utc};

/// Result of an activation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// The plan was applied to the user's entitlement.
    Applied(PlanApplied),
    /// The payment reference was already completed; nothing changed.
    AlreadyApplied,
}

impl Activation {
    pub fn is_applied(&self) -> bool {
        matches!(self, Activation::Applied(_))
    }
}

/// Invoice payload prefix for subscription purchases.
const PAYLOAD_PREFIX: &str = "sub";

/// Build the invoice payload `sub_<plan>_<user_id>`.
pub fn invoice_payload(plan_id: &str, user_id: i64) -> String {
    format!("{}_{}_{}", PAYLOAD_PREFIX, plan_id, user_id)
}

/// Parse an invoice payload into `(plan_id, user_id)`.
pub fn parse_invoice_payload(payload: &str) -> Option<(&str, i64)> {
    let mut parts = payload.splitn(3, '_');
    if parts.next()? != PAYLOAD_PREFIX {
        return None;
    }
    let plan_id = parts.next()?;
    let user_id = parts.next()?.parse().ok()?;
    Some((plan_id, user_id))
}

#[derive(Clone)]
pub struct SubscriptionService {
    db: Database,
    entitlements: EntitlementService,
}

impl SubscriptionService {
    pub fn new(db: Database, entitlements: EntitlementService) -> Self {
        Self { db, entitlements }
    }

    /// Open a pending payment with a freshly generated reference.
    ///
    /// Used when an external gateway will confirm the payment later.
    pub async fn record_pending(
        &self,
        user_id: i64,
        plan_id: &str,
        currency: &str,
    ) -> Result<Payment, AppError> {
        let plan = plan::find(plan_id)
            .ok_or_else(|| AppError::NotFound(format!("plan {}", plan_id)))?;
        let amount = plan
            .price_in(currency)
            .ok_or_else(|| AppError::BadRequest(format!("unsupported currency {}", currency)))?;

        let reference = uuid::Uuid::new_v4().to_string();
        self.record_pending_with_reference(
            &reference,
            user_id,
            plan.id,
            f64::from(amount),
            currency,
        )
        .await
    }

    /// Open a pending payment under a provider-issued reference.
    ///
    /// If the reference is already known the stored record is returned as is;
    /// a completed payment is never reset to pending.
    pub async fn record_pending_with_reference(
        &self,
        reference: &str,
        user_id: i64,
        plan_id: &str,
        amount: f64,
        currency: &str,
    ) -> Result<Payment, AppError> {
        if plan::find(plan_id).is_none() {
            return Err(AppError::NotFound(format!("plan {}", plan_id)));
        }

        let _guard = self.entitlements.lock_user(user_id).await;

        let payment = Payment::pending(reference, user_id, plan_id, amount, currency, Utc::now());
        if let Some(existing) = self.db.insert_payment_if_absent(&payment).await? {
            return Ok(existing);
        }
        tracing::info!(
            user_id,
            plan = plan_id,
            reference,
            amount,
            currency,
            "Payment pending"
        );
        Ok(payment)
    }

    /// Confirm a known pending payment and activate its plan.
    pub async fn complete(&self, reference: &str) -> Result<Activation, AppError> {
        let payment = self
            .db
            .get_payment(reference)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("payment {}", reference)))?;

        self.activate(payment.user_id, &payment.plan, reference).await
    }

    /// Apply a plan to a user for a confirmed payment.
    ///
    /// A reference that is already completed is not applied again.
    pub async fn activate(
        &self,
        user_id: i64,
        plan_id: &str,
        reference: &str,
    ) -> Result<Activation, AppError> {
        self.activate_at(user_id, plan_id, reference, Utc::now()).await
    }

    pub async fn activate_at(
        &self,
        user_id: i64,
        plan_id: &str,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Activation, AppError> {
        let plan = plan::find(plan_id)
            .ok_or_else(|| AppError::NotFound(format!("plan {}", plan_id)))?;

        let _guard = self.entitlements.lock_user(user_id).await;

        let existing = self.db.get_payment(reference).await?;
        if let Some(payment) = &existing {
            if payment.user_id != user_id || payment.plan != plan.id {
                return Err(AppError::BadRequest(format!(
                    "payment {} belongs to another user or plan",
                    reference
                )));
            }
            if payment.is_completed() {
                tracing::info!(user_id, reference, "Payment already applied (idempotent skip)");
                return Ok(Activation::AlreadyApplied);
            }
        }

        let mut entitlement = self.entitlements.load_or_create(user_id, now).await?;
        let applied = entitlement.apply_plan(plan, now);

        let mut payment = existing.unwrap_or_else(|| {
            Payment::pending(
                reference,
                user_id,
                plan.id,
                f64::from(plan.price),
                crate::models::plan::CURRENCY_RUB,
                now,
            )
        });
        payment.complete(now);
        if !self.db.commit_activation(&entitlement, &payment).await? {
            tracing::info!(user_id, reference, "Payment completed concurrently (idempotent skip)");
            return Ok(Activation::AlreadyApplied);
        }

        tracing::info!(
            user_id,
            plan = plan.id,
            reference,
            tier_expiry = %crate::time_utils::format_utc_rfc3339(applied.tier_expiry),
            "Subscription activated"
        );

        Ok(Activation::Applied(applied))
    }
}
