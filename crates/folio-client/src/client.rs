//! HTTP client implementation for the external extraction service.

use std::collections::HashMap;
use std::time::Duration;

use base64::Engine;
use folio_core::{
    ErrorKind, ExternalServiceConfig, ExtractionResult, MetadataValue, PageText, ProcessingError,
    ProcessingResult, ProcessingStage,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Maximum submission attempts, including the first.
const MAX_ATTEMPTS: u32 = 3;

/// Base delay for linear backoff between attempts.
const BASE_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Outcome of submitting a document to the external service.
#[derive(Debug)]
pub enum ExternalOutcome {
    /// Service extracted synchronously.
    Completed(Box<ExtractionResult>),
    /// Service accepted the document for asynchronous processing.
    Accepted { job_id: String },
}

/// Outcome of polling a remote job.
#[derive(Debug)]
pub enum PollOutcome {
    Completed(Box<ExtractionResult>),
    Pending,
}

#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
    file_name: &'a str,
    mime_type: &'a str,
    /// Base64-encoded document bytes.
    content: String,
    size_bytes: u64,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    status: String,
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    structured_text: Option<String>,
    #[serde(default)]
    pages: Option<Vec<PageEntry>>,
    #[serde(default)]
    metadata: Option<HashMap<String, MetadataValue>>,
}

#[derive(Debug, Deserialize)]
struct PageEntry {
    page_number: u32,
    text: String,
}

/// Client for the external extraction service.
pub struct ExternalClient {
    client: Client,
    config: ExternalServiceConfig,
}

impl ExternalClient {
    /// Create a client from service configuration.
    pub fn new(config: ExternalServiceConfig) -> ProcessingResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ProcessingError::dependency(format!("failed to build http client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    fn headers(&self) -> ProcessingResult<reqwest::header::HeaderMap> {
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {}", self.config.api_key)
            .parse()
            .map_err(|_| ProcessingError::dependency("api key is not a valid header value"))?;
        headers.insert("Authorization", auth);
        Ok(headers)
    }

    /// Estimated cost of sending `size_bytes` to the service.
    pub fn estimate_cost(&self, size_bytes: u64) -> f64 {
        folio_core::strategy::estimate_external_cost(size_bytes, self.config.cost_per_page)
    }

    /// Submit a document for extraction.
    ///
    /// Transient failures (network errors, 408, 429, 5xx) are retried up to
    /// three attempts with linear backoff. Permanent rejections return
    /// immediately with the mapped error.
    pub async fn extract(
        &self,
        content: &[u8],
        mime_type: &str,
        file_name: &str,
    ) -> ProcessingResult<ExternalOutcome> {
        let request = ExtractRequest {
            file_name,
            mime_type,
            content: base64::engine::general_purpose::STANDARD.encode(content),
            size_bytes: content.len() as u64,
        };
        let cost = self.estimate_cost(content.len() as u64);
        let url = format!("{}/extract", self.config.endpoint.trim_end_matches('/'));

        let mut last_error: Option<ProcessingError> = None;
        for attempt in 1..=MAX_ATTEMPTS {
            let response = self
                .client
                .post(&url)
                .headers(self.headers()?)
                .json(&request)
                .send()
                .await;

            let error = match response {
                Ok(resp) if resp.status().is_success() => {
                    let parsed: ExtractResponse = resp.json().await.map_err(|e| {
                        ProcessingError::external(format!("malformed service response: {}", e), false)
                    })?;
                    return parse_outcome(parsed, cost, file_name);
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    ProcessingError::from_http_status(status, &body)
                }
                Err(e) => from_reqwest(e),
            };

            let retryable =
                error.kind == ErrorKind::ExternalServiceError && error.is_recoverable();
            if retryable && attempt < MAX_ATTEMPTS {
                let delay = BASE_RETRY_DELAY * attempt;
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "external extraction attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                last_error = Some(error);
                continue;
            }
            return Err(error);
        }

        Err(last_error
            .unwrap_or_else(|| ProcessingError::external("extraction attempts exhausted", true)))
    }

    /// Check the status of a remote asynchronous job.
    pub async fn poll_status(&self, job_id: &str) -> ProcessingResult<PollOutcome> {
        let url = format!(
            "{}/jobs/{}",
            self.config.endpoint.trim_end_matches('/'),
            job_id
        );

        let response = self
            .client
            .get(&url)
            .headers(self.headers()?)
            .send()
            .await
            .map_err(from_reqwest)?;

        if response.status().as_u16() == 404 {
            return Err(ProcessingError::job_not_found(job_id));
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProcessingError::from_http_status(status, &body));
        }

        let parsed: ExtractResponse = response.json().await.map_err(|e| {
            ProcessingError::external(format!("malformed status response: {}", e), false)
        })?;

        if parsed.status == "completed" {
            match parse_outcome(parsed, 0.0, job_id)? {
                ExternalOutcome::Completed(result) => Ok(PollOutcome::Completed(result)),
                ExternalOutcome::Accepted { .. } => Err(ProcessingError::external(
                    "service reported completed without a result",
                    false,
                )),
            }
        } else {
            Ok(PollOutcome::Pending)
        }
    }

    /// Poll a remote job until it completes or `max_wait` elapses.
    ///
    /// On expiry the remote job is left running and `ProcessingTimeout` is
    /// returned so the caller can keep polling later.
    pub async fn wait_for_completion(
        &self,
        job_id: &str,
        max_wait: Duration,
        interval: Duration,
    ) -> ProcessingResult<ExtractionResult> {
        let deadline = tokio::time::Instant::now() + max_wait;

        loop {
            match self.poll_status(job_id).await? {
                PollOutcome::Completed(result) => return Ok(*result),
                PollOutcome::Pending => {}
            }
            if tokio::time::Instant::now() + interval > deadline {
                return Err(ProcessingError::timeout(format!(
                    "remote job '{}' did not complete within {}s",
                    job_id,
                    max_wait.as_secs()
                ))
                .at_stage(ProcessingStage::Extraction));
            }
            tokio::time::sleep(interval).await;
        }
    }
}

/// Map a reqwest transport failure into the taxonomy. Network-level
/// failures are treated as transient.
fn from_reqwest(err: reqwest::Error) -> ProcessingError {
    if err.is_timeout() {
        ProcessingError::external(format!("request timed out: {}", err), true)
    } else if err.is_connect() || err.is_request() {
        ProcessingError::external(format!("connection failed: {}", err), true)
    } else {
        ProcessingError::external(format!("http error: {}", err), true)
    }
}

fn parse_outcome(
    response: ExtractResponse,
    cost: f64,
    context: &str,
) -> ProcessingResult<ExternalOutcome> {
    match response.status.as_str() {
        "completed" => {
            let text = response.text.ok_or_else(|| {
                ProcessingError::new(
                    ErrorKind::ExtractionFailed,
                    format!("service completed '{}' without text", context),
                )
            })?;

            let mut result = ExtractionResult::new(text);
            result.structured_text = response.structured_text;
            result.page_texts = response.pages.map(|pages| {
                pages
                    .into_iter()
                    .map(|p| PageText::new(p.page_number, p.text))
                    .collect()
            });
            result.metadata = response.metadata.unwrap_or_default();
            result
                .metadata
                .entry("extraction_method".to_string())
                .or_insert_with(|| "external".into());
            result.cost_estimate = cost;
            Ok(ExternalOutcome::Completed(Box::new(result)))
        }
        "processing" => {
            let job_id = response.job_id.ok_or_else(|| {
                ProcessingError::external("service accepted job without a job id", false)
            })?;
            Ok(ExternalOutcome::Accepted { job_id })
        }
        other => Err(ProcessingError::external(
            format!("unknown service status '{}'", other),
            false,
        )),
    }
}
