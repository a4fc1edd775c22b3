//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as environment variables by the deployment (or a
//! local `.env` file) and read once at startup.

use std::env;
use std::str::FromStr;

use crate::models::entitlement::DEFAULT_FREE_DAILY_LIMIT;

/// Default number of history entries sent as context.
pub const DEFAULT_CONTEXT_LIMIT: usize = 10;

/// Default upper bound on a single generation call.
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Be friendly and informative.";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Telegram Bot API base URL (overridable for tests)
    pub telegram_api_base: String,
    /// Path component of the webhook URL
    pub webhook_path_uuid: String,
    /// Telegram user IDs allowed to use `/admin`
    pub admin_user_ids: Vec<i64>,
    /// Generation backend endpoint
    pub generation_api_url: String,
    pub generation_timeout_secs: u64,
    pub system_prompt: String,
    /// Free grants per calendar day
    pub free_daily_limit: u32,
    /// History entries sent as context
    pub context_limit: usize,
    /// GCP project ID; Firestore is used only when this is set
    pub gcp_project_id: Option<String>,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// Telegram bot token
    pub telegram_bot_token: String,
    /// Value Telegram echoes in `X-Telegram-Bot-Api-Secret-Token`
    pub webhook_secret_token: String,
    /// Bearer token for the operator API
    pub admin_api_token: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            telegram_api_base: env::var("TELEGRAM_API_BASE")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            webhook_path_uuid: required("WEBHOOK_PATH_UUID")?,
            admin_user_ids: parse_id_list(&env::var("ADMIN_USER_IDS").unwrap_or_default())?,
            generation_api_url: env::var("GENERATION_API_URL")
                .unwrap_or_else(|_| "https://text.pollinations.ai/".to_string()),
            generation_timeout_secs: parse_or(
                "GENERATION_TIMEOUT_SECS",
                DEFAULT_GENERATION_TIMEOUT_SECS,
            )?,
            system_prompt: env::var("SYSTEM_PROMPT")
                .unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string()),
            free_daily_limit: parse_or("FREE_DAILY_LIMIT", DEFAULT_FREE_DAILY_LIMIT)?,
            context_limit: parse_or("CONTEXT_LIMIT", DEFAULT_CONTEXT_LIMIT)?,
            gcp_project_id: env::var("GCP_PROJECT_ID")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            telegram_bot_token: required("TELEGRAM_BOT_TOKEN")?,
            webhook_secret_token: required("TELEGRAM_WEBHOOK_SECRET")?,
            admin_api_token: required("ADMIN_API_TOKEN")?,
        })
    }

    /// Fixed configuration for tests. Uses the in-memory store.
    pub fn test_default() -> Self {
        Self {
            telegram_api_base: "http://127.0.0.1:9".to_string(),
            webhook_path_uuid: "test-webhook-uuid".to_string(),
            admin_user_ids: vec![1000],
            generation_api_url: "http://127.0.0.1:9/".to_string(),
            generation_timeout_secs: 5,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            free_daily_limit: DEFAULT_FREE_DAILY_LIMIT,
            context_limit: DEFAULT_CONTEXT_LIMIT,
            gcp_project_id: None,
            port: 8080,
            telegram_bot_token: "123:test-bot-token".to_string(),
            webhook_secret_token: "test_secret_token".to_string(),
            admin_api_token: "test_admin_token".to_string(),
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_user_ids.contains(&user_id)
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Parse a comma-separated list of Telegram user IDs.
fn parse_id_list(raw: &str) -> Result<Vec<i64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| ConfigError::Invalid("ADMIN_USER_IDS", s.to_string()))
        })
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
