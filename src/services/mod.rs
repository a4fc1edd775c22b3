// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod chat;
pub mod conversation;
pub mod entitlement;
pub mod generation;
pub mod subscription;
pub mod telegram;

pub use chat::ChatService;
pub use conversation::ConversationLog;
pub use entitlement::{EntitlementService, UserLocks};
pub use generation::GenerationClient;
pub use subscription::{Activation, SubscriptionService};
pub use telegram::TelegramClient;
