//! Async job lifecycle management.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use folio_core::{
    ChunkingConfig, ErrorKind, ExtractionResult, ProcessingError, ProcessingResult,
    ProcessingStage,
};

use crate::notify::ExecutorNotifier;
use crate::object_store::ObjectStore;
use crate::status::{JobPriority, JobStatus};
use crate::store::{JobStore, ProcessingJob};
use crate::webhook::{JobCallback, WebhookConfig, WebhookDelivery};

/// Default upload ceiling when none is configured.
const DEFAULT_MAX_FILE_SIZE: u64 = 200 * 1024 * 1024;

/// Fixed handling penalty for DOCX conversion, in seconds.
const DOCX_PENALTY_SECS: i64 = 15;

/// Options accompanying a job submission.
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    pub user_id: String,
    pub course_id: Option<String>,
    pub priority: JobPriority,
    pub callback_url: Option<String>,
    pub chunking_config: Option<ChunkingConfig>,
}

impl SubmitOptions {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            course_id: None,
            priority: JobPriority::Normal,
            callback_url: None,
            chunking_config: None,
        }
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }
}

/// Returned to the caller after a successful submission.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SubmitReceipt {
    pub job_id: String,
    pub status: JobStatus,
    pub estimated_completion: chrono::DateTime<Utc>,
}

/// Manages the durable job lifecycle: submission, status, cancellation,
/// and the executor-side transitions.
pub struct JobManager {
    store: JobStore,
    objects: Arc<dyn ObjectStore>,
    notifier: Option<Arc<dyn ExecutorNotifier>>,
    max_file_size: u64,
    webhook_secret: Option<String>,
}

impl JobManager {
    pub fn new(store: JobStore, objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            objects,
            notifier: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            webhook_secret: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ExecutorNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_max_file_size(mut self, max: u64) -> Self {
        self.max_file_size = max;
        self
    }

    /// Secret used to sign webhook callbacks.
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    /// Submit a document for background processing.
    ///
    /// Uploads the bytes, persists a `Queued` job row and notifies the
    /// executor. Notification failures are logged, never surfaced, since
    /// the executor also polls.
    pub async fn submit(
        &self,
        content: &[u8],
        mime_type: &str,
        file_name: &str,
        opts: SubmitOptions,
    ) -> ProcessingResult<SubmitReceipt> {
        if content.is_empty() {
            return Err(ProcessingError::new(
                ErrorKind::InvalidFileFormat,
                format!("'{}' is empty", file_name),
            ));
        }
        if content.len() as u64 > self.max_file_size {
            return Err(ProcessingError::file_too_large(
                content.len() as u64,
                self.max_file_size,
            ));
        }
        if opts.user_id.trim().is_empty() {
            return Err(ProcessingError::new(
                ErrorKind::InvalidFileFormat,
                "submission requires a user id",
            )
            .at_stage(ProcessingStage::Validation));
        }

        let job_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let storage_key = format!(
            "uploads/{}/{}/{}/{}",
            opts.user_id,
            now.format("%Y-%m-%d"),
            job_id,
            sanitize_file_name(file_name)
        );

        self.objects.put(&storage_key, content).await?;

        let estimated_completion =
            now + estimated_duration(content.len() as u64, mime_type, opts.priority);

        let job = ProcessingJob {
            id: job_id.clone(),
            user_id: opts.user_id,
            file_name: file_name.to_string(),
            file_type: mime_type.to_string(),
            file_size: content.len() as u64,
            storage_key: storage_key.clone(),
            status: JobStatus::Queued,
            priority: opts.priority,
            course_id: opts.course_id,
            callback_url: opts.callback_url,
            chunking_config: opts.chunking_config,
            created_at: now,
            updated_at: now,
            estimated_completion,
            result: None,
            error: None,
        };

        if let Err(e) = self.store.insert(&job) {
            // Roll back the upload so a failed insert leaves nothing behind.
            if let Err(cleanup) = self.objects.delete(&storage_key).await {
                tracing::warn!(job_id, error = %cleanup, "orphaned upload after failed insert");
            }
            return Err(e);
        }

        tracing::info!(
            job_id,
            file_name,
            size = job.file_size,
            priority = job.priority.as_str(),
            "job queued"
        );

        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify(&job).await {
                tracing::warn!(job_id, error = %e, "executor notification failed");
            }
        }

        Ok(SubmitReceipt {
            job_id,
            status: JobStatus::Queued,
            estimated_completion,
        })
    }

    /// Fetch a job's current state, enforcing ownership.
    pub fn get_status(&self, job_id: &str, user_id: &str) -> ProcessingResult<ProcessingJob> {
        self.store.get(job_id, user_id)
    }

    /// Cancel a queued job and remove its uploaded object.
    ///
    /// Jobs that have started processing cannot be cancelled.
    pub async fn cancel(&self, job_id: &str, user_id: &str) -> ProcessingResult<()> {
        let job = self.store.get(job_id, user_id)?;
        if job.status != JobStatus::Queued {
            return Err(ProcessingError::invalid_job_state(
                job_id,
                format!("cannot cancel from status '{}'", job.status.as_str()),
            ));
        }

        self.store
            .transition(job_id, JobStatus::Queued, JobStatus::Cancelled, None, None)?;

        if let Err(e) = self.objects.delete(&job.storage_key).await {
            tracing::warn!(job_id, error = %e, "failed to delete object for cancelled job");
        }

        self.fire_callback(job_id);
        Ok(())
    }

    /// Delete a job row and its uploaded object.
    pub async fn delete_job(&self, job_id: &str, user_id: &str) -> ProcessingResult<()> {
        let job = self.store.get(job_id, user_id)?;
        self.store.delete(job_id)?;
        self.objects.delete(&job.storage_key).await?;
        Ok(())
    }

    /// Executor-side: mark a queued job as picked up.
    pub fn start_processing(&self, job_id: &str) -> ProcessingResult<()> {
        self.store
            .transition(job_id, JobStatus::Queued, JobStatus::Processing, None, None)
    }

    /// Executor-side: record a successful extraction.
    pub fn complete(&self, job_id: &str, result: &ExtractionResult) -> ProcessingResult<()> {
        self.store.transition(
            job_id,
            JobStatus::Processing,
            JobStatus::Completed,
            Some(result),
            None,
        )?;
        self.fire_callback(job_id);
        Ok(())
    }

    /// Executor-side: record a failure.
    pub fn fail(&self, job_id: &str, error: &ProcessingError) -> ProcessingResult<()> {
        self.store.transition(
            job_id,
            JobStatus::Processing,
            JobStatus::Failed,
            None,
            Some(error),
        )?;
        self.fire_callback(job_id);
        Ok(())
    }

    /// Executor-side: record an expired processing deadline.
    pub fn mark_timeout(&self, job_id: &str, error: &ProcessingError) -> ProcessingResult<()> {
        self.store.transition(
            job_id,
            JobStatus::Processing,
            JobStatus::Timeout,
            None,
            Some(error),
        )?;
        self.fire_callback(job_id);
        Ok(())
    }

    /// Deliver the terminal callback in the background. Persistence never
    /// depends on delivery.
    fn fire_callback(&self, job_id: &str) {
        let job = match self.store.get_any(job_id) {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(job_id, error = %e, "could not load job for callback");
                return;
            }
        };
        let Some(url) = job.callback_url.clone() else {
            return;
        };

        let mut config = WebhookConfig::new(url);
        if let Some(secret) = &self.webhook_secret {
            config = config.with_secret(secret.clone());
        }
        let delivery = WebhookDelivery::new(config);
        let callback = JobCallback {
            job_id: job.id.clone(),
            status: job.status,
            result: job.result,
            error: job.error,
        };

        tokio::spawn(async move {
            if let Err(e) = delivery.deliver(&callback).await {
                tracing::error!(
                    job_id = callback.job_id,
                    "webhook delivery failed: {:?}",
                    e
                );
            }
        });
    }
}

/// Replace path-hostile characters in an uploaded file name.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(|c| c == '_' || c == '.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Estimated time to completion from size, format overhead and queue wait.
fn estimated_duration(size_bytes: u64, mime_type: &str, priority: JobPriority) -> ChronoDuration {
    let megabytes = size_bytes.div_ceil(1024 * 1024).max(1) as i64;
    let mut secs = (megabytes * 2).max(10);
    if mime_type.contains("wordprocessingml") || mime_type == "application/docx" {
        secs += DOCX_PENALTY_SECS;
    }
    secs += priority.queue_wait_secs();
    ChronoDuration::seconds(secs)
}
