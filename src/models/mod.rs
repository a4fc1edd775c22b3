// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod chat;
pub mod entitlement;
pub mod payment;
pub mod plan;
pub mod stats;

pub use chat::{ChatMessage, ChatModel, ConversationEntry, Role};
pub use entitlement::{Entitlement, Grant, PlanApplied, UserProfile};
pub use payment::{Payment, PaymentStatus};
pub use plan::{SubscriptionPlan, Tier};
pub use stats::ServiceStats;
