// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Text-generation backend client.
//!
//! One JSON POST per request, bounded by a timeout. Failures are reported as
//! [`AppError::BackendUnavailable`] carrying the raw status or transport
//! error; nothing is retried.

use crate::error::AppError;
use crate::models::{ChatMessage, ChatModel};
use serde::Serialize;
use std::time::Duration;

/// Request body understood by the backend.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    messages: &'a [ChatMessage],
    model: &'a str,
}

/// Generation backend client.
#[derive(Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl GenerationClient {
    /// Create a client for `url` with a per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http,
            url: url.into(),
            timeout,
        })
    }

    /// Generate a reply for the ordered message list.
    pub async fn generate(
        &self,
        model: ChatModel,
        messages: &[ChatMessage],
    ) -> Result<String, AppError> {
        let body = GenerateRequest {
            messages,
            model: model.backend_name(),
        };

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::BackendUnavailable(format!(
                        "request timed out after {}s",
                        self.timeout.as_secs()
                    ))
                } else {
                    AppError::BackendUnavailable(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), model = %model, "Generation API error");
            return Err(AppError::BackendUnavailable(format!(
                "API error: {}",
                status.as_u16()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::BackendUnavailable(e.without_url().to_string()))
    }
}
