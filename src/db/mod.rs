//! Database layer (Firestore, or in-memory for local runs and tests).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{ConversationEntry, Entitlement, Payment, ServiceStats};

/// Collection names as constants.
pub mod collections {
    /// Entitlement records (keyed by user_id)
    pub const ENTITLEMENTS: &str = "entitlements";
    pub const MESSAGES: &str = "messages";
    /// Payment ledger (keyed by provider reference)
    pub const PAYMENTS: &str = "payments";
}

/// Storage backend selected at startup.
#[derive(Clone)]
pub enum Database {
    Firestore(FirestoreDb),
    Memory(MemoryDb),
}

impl Database {
    /// Connect to Firestore when a project is configured, else use memory.
    pub async fn connect(gcp_project_id: Option<&str>) -> Result<Self, AppError> {
        match gcp_project_id {
            Some(project) => Ok(Database::Firestore(FirestoreDb::new(project).await?)),
            None => {
                tracing::warn!("GCP_PROJECT_ID not set, using in-memory store");
                Ok(Database::Memory(MemoryDb::new()))
            }
        }
    }

    pub fn in_memory() -> Self {
        Database::Memory(MemoryDb::new())
    }

    pub async fn get_entitlement(&self, user_id: i64) -> Result<Option<Entitlement>, AppError> {
        match self {
            Database::Firestore(db) => db.get_entitlement(user_id).await,
            Database::Memory(db) => Ok(db.get_entitlement(user_id)),
        }
    }

    pub async fn upsert_entitlement(&self, entitlement: &Entitlement) -> Result<(), AppError> {
        match self {
            Database::Firestore(db) => db.upsert_entitlement(entitlement).await,
            Database::Memory(db) => {
                db.upsert_entitlement(entitlement);
                Ok(())
            }
        }
    }

    pub async fn append_message(&self, entry: &ConversationEntry) -> Result<(), AppError> {
        match self {
            Database::Firestore(db) => db.append_message(entry).await,
            Database::Memory(db) => {
                db.append_message(entry);
                Ok(())
            }
        }
    }

    pub async fn recent_messages(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<ConversationEntry>, AppError> {
        match self {
            Database::Firestore(db) => db.recent_messages(user_id, limit).await,
            Database::Memory(db) => Ok(db.recent_messages(user_id, limit)),
        }
    }

    pub async fn clear_messages(&self, user_id: i64) -> Result<usize, AppError> {
        match self {
            Database::Firestore(db) => db.clear_messages(user_id).await,
            Database::Memory(db) => Ok(db.clear_messages(user_id)),
        }
    }

    pub async fn get_payment(&self, reference: &str) -> Result<Option<Payment>, AppError> {
        match self {
            Database::Firestore(db) => db.get_payment(reference).await,
            Database::Memory(db) => Ok(db.get_payment(reference)),
        }
    }

    /// Store a new payment; returns the existing record if the reference is taken.
    pub async fn insert_payment_if_absent(
        &self,
        payment: &Payment,
    ) -> Result<Option<Payment>, AppError> {
        match self {
            Database::Firestore(db) => db.insert_payment_if_absent(payment).await,
            Database::Memory(db) => Ok(db.insert_payment_if_absent(payment)),
        }
    }

    /// Atomically store an activated entitlement with its completed payment.
    ///
    /// Returns `false`, writing nothing, when the payment is already completed.
    pub async fn commit_activation(
        &self,
        entitlement: &Entitlement,
        payment: &Payment,
    ) -> Result<bool, AppError> {
        match self {
            Database::Firestore(db) => db.commit_activation(entitlement, payment).await,
            Database::Memory(db) => Ok(db.commit_activation(entitlement, payment)),
        }
    }

    pub async fn stats(&self) -> Result<ServiceStats, AppError> {
        match self {
            Database::Firestore(db) => db.stats().await,
            Database::Memory(db) => Ok(db.stats()),
        }
    }
}
