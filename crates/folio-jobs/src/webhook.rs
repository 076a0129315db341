//! Webhook callback delivery with retry and signature.
//!
//! Delivers terminal job transitions to caller-supplied callback URLs with
//! HMAC-SHA256 payload signing and exponential backoff on transient
//! failures.

use backon::{ExponentialBuilder, Retryable};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;

use folio_core::{ExtractionResult, ProcessingError};

use crate::status::JobStatus;

/// Error type for webhook delivery.
#[derive(Debug, Clone)]
pub enum WebhookError {
    /// Transient error (5xx, network) - should retry
    Transient(String),
    /// Permanent error (4xx) - should not retry
    Permanent(String),
    /// Configuration error
    Config(String),
}

impl std::fmt::Display for WebhookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient(msg) => write!(f, "Transient error: {}", msg),
            Self::Permanent(msg) => write!(f, "Permanent error: {}", msg),
            Self::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for WebhookError {}

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 100,
            max_delay_ms: 30_000,
            multiplier: 2.0_f32,
        }
    }
}

/// Webhook endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    /// Secret for HMAC signing (optional but recommended).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            secret: None,
            retry_policy: RetryPolicy::default(),
            timeout_secs: 30,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }
}

/// Payload posted to the callback URL on a terminal transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCallback {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExtractionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProcessingError>,
}

/// Webhook delivery service.
pub struct WebhookDelivery {
    client: Client,
    config: WebhookConfig,
}

impl WebhookDelivery {
    pub fn new(config: WebhookConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Deliver a callback to the configured endpoint.
    pub async fn deliver(&self, callback: &JobCallback) -> Result<(), WebhookError> {
        let payload = serde_json::to_string(callback)
            .map_err(|e| WebhookError::Config(format!("Serialization error: {}", e)))?;

        let signature = self.sign_payload(&payload);

        let deliver_once = || async {
            let mut request = self
                .client
                .post(&self.config.url)
                .header("Content-Type", "application/json")
                .header("X-Folio-Event", "job.finished")
                .header("X-Folio-Delivery", uuid::Uuid::new_v4().to_string());
            if !signature.is_empty() {
                request = request.header("X-Folio-Signature", &signature);
            }

            let response = request
                .body(payload.clone())
                .send()
                .await
                .map_err(|e| WebhookError::Transient(format!("Network error: {}", e)))?;

            let status = response.status();
            if status.is_success() {
                Ok(())
            } else if status.is_server_error() {
                Err(WebhookError::Transient(format!("Server error: {}", status)))
            } else {
                let body = response.text().await.unwrap_or_default();
                Err(WebhookError::Permanent(format!(
                    "Client error {}: {}",
                    status, body
                )))
            }
        };

        let policy = &self.config.retry_policy;
        deliver_once
            .retry(
                ExponentialBuilder::default()
                    .with_max_times(policy.max_retries as usize)
                    .with_min_delay(Duration::from_millis(policy.initial_delay_ms))
                    .with_max_delay(Duration::from_millis(policy.max_delay_ms))
                    .with_factor(policy.multiplier),
            )
            .when(|e| matches!(e, WebhookError::Transient(_)))
            .notify(|err, dur| {
                tracing::warn!(
                    "Webhook delivery to {} failed, retrying in {:?}: {:?}",
                    self.config.url,
                    dur,
                    err
                );
            })
            .await
    }

    /// Sign payload with HMAC-SHA256.
    fn sign_payload(&self, payload: &str) -> String {
        match &self.config.secret {
            Some(secret) => {
                let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
                    .expect("HMAC accepts any key length");
                mac.update(payload.as_bytes());
                let result = mac.finalize();
                format!("sha256={}", hex::encode(result.into_bytes()))
            }
            None => String::new(),
        }
    }

    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }
}

impl Clone for WebhookDelivery {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
        }
    }
}

/// Verify a webhook signature.
///
/// Used by callback receivers to confirm the payload origin.
pub fn verify_signature(payload: &str, secret: &str, signature: &str) -> bool {
    let expected = {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        let result = mac.finalize();
        format!("sha256={}", hex::encode(result.into_bytes()))
    };

    // Constant-time comparison to prevent timing attacks
    constant_time_eq(expected.as_bytes(), signature.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_verification() {
        let secret = "my-secret-key";
        let payload = r#"{"job_id":"job-1","status":"completed"}"#;

        let delivery =
            WebhookDelivery::new(WebhookConfig::new("https://example.com").with_secret(secret));
        let signature = delivery.sign_payload(payload);

        assert!(verify_signature(payload, secret, &signature));
        assert!(!verify_signature(payload, "wrong-secret", &signature));
        assert!(!verify_signature("tampered", secret, &signature));
    }

    #[test]
    fn test_unsigned_delivery_has_no_signature() {
        let delivery = WebhookDelivery::new(WebhookConfig::new("https://example.com"));
        assert!(delivery.sign_payload("{}").is_empty());
    }

    #[test]
    fn test_callback_serialization_omits_empty_fields() {
        let callback = JobCallback {
            job_id: "job-1".to_string(),
            status: JobStatus::Cancelled,
            result: None,
            error: None,
        };
        let json = serde_json::to_string(&callback).unwrap();
        assert!(!json.contains("result"));
        assert!(!json.contains("error"));
        assert!(json.contains("cancelled"));
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_delay_ms, 100);
        assert_eq!(policy.max_delay_ms, 30_000);
    }
}
