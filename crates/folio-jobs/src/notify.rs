//! Executor notification.
//!
//! The out-of-process executor normally polls the job table; notification
//! is a latency optimization, so failures are logged and never fatal.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use folio_core::{ProcessingError, ProcessingResult};

use crate::store::ProcessingJob;

/// Notifies the background executor that a job was queued.
#[async_trait]
pub trait ExecutorNotifier: Send + Sync {
    async fn notify(&self, job: &ProcessingJob) -> ProcessingResult<()>;
}

/// HTTP notifier posting a small job summary to the executor endpoint.
pub struct HttpExecutorNotifier {
    client: Client,
    endpoint: String,
}

impl HttpExecutorNotifier {
    pub fn new(endpoint: impl Into<String>) -> ProcessingResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                ProcessingError::dependency(format!("failed to build http client: {}", e))
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ExecutorNotifier for HttpExecutorNotifier {
    async fn notify(&self, job: &ProcessingJob) -> ProcessingResult<()> {
        let body = json!({
            "job_id": job.id,
            "storage_key": job.storage_key,
            "file_type": job.file_type,
            "priority": job.priority.as_str(),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProcessingError::dependency(format!("executor notify failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ProcessingError::dependency(format!(
                "executor notify rejected with {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts notifications, optionally failing every call.
    pub struct RecordingNotifier {
        pub calls: Arc<AtomicUsize>,
        pub fail: bool,
    }

    impl RecordingNotifier {
        pub fn new(fail: bool) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    calls: calls.clone(),
                    fail,
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl ExecutorNotifier for RecordingNotifier {
        async fn notify(&self, _job: &ProcessingJob) -> ProcessingResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ProcessingError::dependency("notifier down"))
            } else {
                Ok(())
            }
        }
    }
}
