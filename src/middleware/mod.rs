// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, security headers).

pub mod auth;
pub mod security;
pub mod telegram_auth;

pub use auth::require_admin;
pub use telegram_auth::require_telegram_secret;
