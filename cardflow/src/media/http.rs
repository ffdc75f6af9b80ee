//! HTTP pronunciation downloader.

use super::providers::AudioDownloader;
use crate::errors::ProviderError;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

const PROVIDER_NAME: &str = "http-audio";

/// Downloads pronunciations from a URL template containing `{word}`.
///
/// Transient failures (network errors and 5xx responses) are retried with
/// exponential backoff; a 404 is reported as "no recording" straight away.
#[derive(Debug, Clone)]
pub struct HttpAudioDownloader {
    client: reqwest::Client,
    url_template: String,
    max_attempts: usize,
    initial_delay: Duration,
    max_delay: Duration,
}

impl HttpAudioDownloader {
    /// Creates a downloader for `url_template`.
    #[must_use]
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url_template: url_template.into(),
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }

    /// Sets the maximum number of attempts per word.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Builds the request URL for `word`.
    #[must_use]
    pub fn url_for(&self, word: &str) -> String {
        self.url_template.replace("{word}", &encode_word(word))
    }

    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.initial_delay.as_secs_f64() * 2f64.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    async fn fetch_once(&self, word: &str) -> Result<Vec<u8>, Attempt> {
        let url = self.url_for(word);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Attempt::Retry(ProviderError::request_failed(PROVIDER_NAME, e.to_string())))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Attempt::Fatal(ProviderError::not_found(PROVIDER_NAME, word)));
        }
        if !status.is_success() {
            let err = ProviderError::request_failed(PROVIDER_NAME, format!("{url} returned {status}"));
            return Err(if status.is_server_error() {
                Attempt::Retry(err)
            } else {
                Attempt::Fatal(err)
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Attempt::Retry(ProviderError::request_failed(PROVIDER_NAME, e.to_string())))?;
        if body.is_empty() {
            return Err(Attempt::Fatal(ProviderError::not_found(PROVIDER_NAME, word)));
        }
        Ok(body.to_vec())
    }
}

enum Attempt {
    Retry(ProviderError),
    Fatal(ProviderError),
}

#[async_trait]
impl AudioDownloader for HttpAudioDownloader {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn download_pronunciation(&self, word: &str, target: &Path) -> Result<(), ProviderError> {
        let mut last_error = ProviderError::request_failed(PROVIDER_NAME, "no attempt made");

        for attempt in 0..self.max_attempts {
            match self.fetch_once(word).await {
                Ok(bytes) => {
                    return tokio::fs::write(target, bytes)
                        .await
                        .map_err(|e| ProviderError::Write {
                            path: target.display().to_string(),
                            reason: e.to_string(),
                        });
                }
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retry(e)) => {
                    if attempt + 1 < self.max_attempts {
                        let delay = self.delay_for_attempt(attempt);
                        tracing::debug!(
                            word = %word,
                            attempt = attempt + 1,
                            error = %e,
                            delay = ?delay,
                            "Pronunciation download failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

/// Percent-encodes everything outside the URL-safe unreserved set.
fn encode_word(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    for byte in word.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}
