//! In-process store used for local development and tests.
//!
//! Mirrors the Firestore operations one for one. Nothing survives a restart.

use crate::models::{ConversationEntry, Entitlement, Payment, ServiceStats};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Default)]
struct Collections {
    entitlements: DashMap<i64, Entitlement>,
    messages: DashMap<i64, Vec<ConversationEntry>>,
    payments: DashMap<String, Payment>,
}

/// Shared in-memory store. Clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryDb {
    inner: Arc<Collections>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_entitlement(&self, user_id: i64) -> Option<Entitlement> {
        self.inner
            .entitlements
            .get(&user_id)
            .map(|e| e.value().clone())
    }

    pub fn upsert_entitlement(&self, entitlement: &Entitlement) {
        self.inner
            .entitlements
            .insert(entitlement.user_id, entitlement.clone());
    }

    pub fn append_message(&self, entry: &ConversationEntry) {
        self.inner
            .messages
            .entry(entry.user_id)
            .or_default()
            .push(entry.clone());
    }

    pub fn recent_messages(&self, user_id: i64, limit: usize) -> Vec<ConversationEntry> {
        self.inner
            .messages
            .get(&user_id)
            .map(|log| {
                let start = log.len().saturating_sub(limit);
                log[start..].to_vec()
            })
            .unwrap_or_default()
    }

    pub fn clear_messages(&self, user_id: i64) -> usize {
        self.inner
            .messages
            .remove(&user_id)
            .map(|(_, log)| log.len())
            .unwrap_or(0)
    }

    pub fn get_payment(&self, reference: &str) -> Option<Payment> {
        self.inner
            .payments
            .get(reference)
            .map(|p| p.value().clone())
    }

    /// Store `payment` unless its reference is taken; returns the existing record.
    pub fn insert_payment_if_absent(&self, payment: &Payment) -> Option<Payment> {
        match self.inner.payments.entry(payment.reference.clone()) {
            Entry::Occupied(slot) => Some(slot.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(payment.clone());
                None
            }
        }
    }

    /// Write both records unless the payment is already completed.
    pub fn commit_activation(&self, entitlement: &Entitlement, payment: &Payment) -> bool {
        match self.inner.payments.entry(payment.reference.clone()) {
            Entry::Occupied(mut slot) => {
                if slot.get().is_completed() {
                    return false;
                }
                slot.insert(payment.clone());
            }
            Entry::Vacant(slot) => {
                slot.insert(payment.clone());
            }
        }
        self.upsert_entitlement(entitlement);
        true
    }

    pub fn stats(&self) -> ServiceStats {
        let mut stats = ServiceStats::default();
        for entry in self.inner.entitlements.iter() {
            stats.add_user(entry.value());
        }
        for entry in self.inner.payments.iter() {
            stats.add_payment(entry.value());
        }
        stats
    }
}
