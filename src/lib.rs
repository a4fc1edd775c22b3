// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! chat-relay: a Telegram front end for a text-generation API
//!
//! This crate provides the webhook and operator API for a conversational
//! proxy that gates requests by daily quota and paid subscription tier.

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Database;
use error::AppError;
use services::{
    ChatService, ConversationLog, EntitlementService, GenerationClient, SubscriptionService,
    TelegramClient, UserLocks,
};
use std::sync::Arc;
use std::time::Duration;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub entitlements: EntitlementService,
    pub subscriptions: SubscriptionService,
    pub conversations: ConversationLog,
    pub chat: ChatService,
    pub telegram: TelegramClient,
}

impl AppState {
    /// Wire every service over one store and one set of per-user locks.
    pub fn new(config: Config, db: Database) -> Result<Self, AppError> {
        let locks: UserLocks = Arc::new(dashmap::DashMap::new());

        let entitlements =
            EntitlementService::new(db.clone(), locks, config.free_daily_limit);
        let subscriptions = SubscriptionService::new(db.clone(), entitlements.clone());
        let conversations = ConversationLog::new(db.clone(), config.context_limit);
        let generator = GenerationClient::new(
            config.generation_api_url.clone(),
            Duration::from_secs(config.generation_timeout_secs),
        )?;
        let chat = ChatService::new(
            entitlements.clone(),
            conversations.clone(),
            generator,
            config.system_prompt.clone(),
        );
        let telegram = TelegramClient::new(&config.telegram_api_base, &config.telegram_bot_token);

        Ok(Self {
            config,
            db,
            entitlements,
            subscriptions,
            conversations,
            chat,
            telegram,
        })
    }
}
