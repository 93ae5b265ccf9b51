use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::Translator;
use crate::config::TranslateConfig;
use crate::error::{Result, TextdubError};

const BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text_batch: &'a [String],
    source_lang: &'a str,
    target_lang: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translated_sentences: Vec<String>,
}

/// HTTP batch translator with bounded retry.
///
/// Timeouts, connection failures, 429 and 5xx responses are retried with
/// exponential backoff up to `max_retries`; other non-success statuses and
/// malformed responses are terminal.
pub struct HttpTranslator {
    client: Client,
    config: TranslateConfig,
}

impl HttpTranslator {
    pub fn new(config: TranslateConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("HTTP client creation should not fail");

        Self { client, config }
    }

    async fn request_once(
        &self,
        batch: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> std::result::Result<Vec<String>, RequestFailure> {
        let request = TranslateRequest {
            text_batch: batch,
            source_lang,
            target_lang,
        };

        debug!(
            "Sending batch of {} string(s) to {}",
            batch.len(),
            self.config.endpoint
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    RequestFailure::Transient(format!("Request failed: {}", e))
                } else {
                    RequestFailure::Terminal(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("Service returned {}: {}", status, body.trim());
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(RequestFailure::Transient(message));
            }
            return Err(RequestFailure::Terminal(message));
        }

        let parsed: TranslateResponse = response
            .json()
            .await
            .map_err(|e| RequestFailure::Terminal(format!("Malformed response: {}", e)))?;

        if parsed.translated_sentences.len() != batch.len() {
            return Err(RequestFailure::Terminal(format!(
                "Response has {} strings for a batch of {}",
                parsed.translated_sentences.len(),
                batch.len()
            )));
        }

        Ok(parsed.translated_sentences)
    }
}

enum RequestFailure {
    /// Worth retrying: timeout, connection failure, 429, 5xx
    Transient(String),
    /// Not worth retrying: 4xx, malformed or mismatched response
    Terminal(String),
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate_batch(
        &self,
        batch: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let mut delay = BASE_DELAY;
        let mut attempt = 0u32;
        loop {
            match self.request_once(batch, source_lang, target_lang).await {
                Ok(translations) => return Ok(translations),
                Err(RequestFailure::Terminal(message)) => {
                    return Err(TextdubError::Translation(message));
                }
                Err(RequestFailure::Transient(message)) => {
                    attempt += 1;
                    if attempt > self.config.max_retries {
                        return Err(TextdubError::Translation(format!(
                            "{} (after {} retries)",
                            message, self.config.max_retries
                        )));
                    }
                    warn!(
                        "Translation request failed, retrying in {:.0}s (attempt {}/{}): {}",
                        delay.as_secs_f32(),
                        attempt,
                        self.config.max_retries,
                        message
                    );
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_DELAY);
                }
            }
        }
    }
}
