//! Unified processor: one entry point for every extraction path.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use folio_client::{ExternalClient, ExternalOutcome};
use folio_core::{
    chunk_document, recommend, select_strategy, ChunkingConfig, DocumentChunk, ErrorKind,
    ExtractionResult, ProcessingConfig, ProcessingError, ProcessingOptions, ProcessingResult,
    SelectorContext, Strategy, StrategyDecision,
};
use folio_extractors::{DocxExtractor, ExtractionPipeline, PdfExtractor, PdfOptions};
use folio_jobs::{JobManager, JobPriority, ProcessingJob, SubmitOptions};

/// Interval between polls of a remote asynchronous extraction.
const EXTERNAL_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Per-submission options beyond the selector flags.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub user_id: String,
    /// Stable id used for chunk identity; generated when absent.
    pub document_id: Option<String>,
    pub options: ProcessingOptions,
    pub priority: JobPriority,
    pub course_id: Option<String>,
    pub callback_url: Option<String>,
    pub chunking_config: Option<ChunkingConfig>,
}

impl ProcessRequest {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            document_id: None,
            options: ProcessingOptions::default(),
            priority: JobPriority::Normal,
            course_id: None,
            callback_url: None,
            chunking_config: None,
        }
    }

    pub fn with_options(mut self, options: ProcessingOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_document_id(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
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

/// Result of a submission: either a completed extraction with chunks, a
/// queued background job, or a structured failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedProcessingResult {
    pub success: bool,
    pub is_async: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ExtractionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<DocumentChunk>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProcessingError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<StrategyDecision>,
}

impl UnifiedProcessingResult {
    fn completed(
        data: ExtractionResult,
        chunks: Vec<DocumentChunk>,
        decision: StrategyDecision,
    ) -> Self {
        Self {
            success: true,
            is_async: false,
            data: Some(data),
            chunks: Some(chunks),
            job_id: None,
            error: None,
            recommendation: Some(decision),
        }
    }

    fn queued(job_id: String, decision: StrategyDecision) -> Self {
        Self {
            success: true,
            is_async: true,
            data: None,
            chunks: None,
            job_id: Some(job_id),
            error: None,
            recommendation: Some(decision),
        }
    }

    fn failure(error: ProcessingError) -> Self {
        Self {
            success: false,
            is_async: false,
            data: None,
            chunks: None,
            job_id: None,
            error: Some(error),
            recommendation: None,
        }
    }

    fn failure_with(error: ProcessingError, decision: StrategyDecision) -> Self {
        Self {
            recommendation: Some(decision),
            ..Self::failure(error)
        }
    }
}

/// Single entry point for document processing.
pub struct UnifiedProcessor {
    config: ProcessingConfig,
    pipeline: ExtractionPipeline,
    external: Option<ExternalClient>,
    jobs: Option<Arc<JobManager>>,
}

impl UnifiedProcessor {
    pub fn new(config: ProcessingConfig) -> ProcessingResult<Self> {
        let pdf_options = PdfOptions {
            max_pages: config.limits.max_pdf_pages,
            ..PdfOptions::default()
        };
        let pipeline = ExtractionPipeline::new()
            .add_extractor(Arc::new(PdfExtractor::with_options(pdf_options)))
            .add_extractor(Arc::new(DocxExtractor::new()));

        let external = config
            .external
            .clone()
            .map(ExternalClient::new)
            .transpose()?;

        Ok(Self {
            config,
            pipeline,
            external,
            jobs: None,
        })
    }

    /// Attach the async job manager, enabling the background path.
    pub fn with_job_manager(mut self, jobs: Arc<JobManager>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    fn selector_context(&self) -> SelectorContext {
        SelectorContext {
            external_configured: self.config.external_configured(),
            cost_per_page: self.config.cost_per_page(),
            large_file_ceiling: self.config.limits.large_file_ceiling,
        }
    }

    /// Process a document through the selected path.
    ///
    /// Direct paths run extraction and chunking to completion before
    /// returning; the background path persists a job and returns its id.
    /// Submission failures are surfaced synchronously and never create a
    /// job.
    pub async fn process(
        &self,
        content: &[u8],
        mime_type: &str,
        file_name: &str,
        request: ProcessRequest,
    ) -> UnifiedProcessingResult {
        if content.is_empty() {
            return UnifiedProcessingResult::failure(ProcessingError::new(
                ErrorKind::InvalidFileFormat,
                format!("'{}' is empty", file_name),
            ));
        }
        if content.len() as u64 > self.config.limits.max_file_size {
            return UnifiedProcessingResult::failure(ProcessingError::file_too_large(
                content.len() as u64,
                self.config.limits.max_file_size,
            ));
        }

        let decision = match select_strategy(
            content.len() as u64,
            mime_type,
            file_name,
            &request.options,
            &self.selector_context(),
        ) {
            Ok(decision) => decision,
            Err(e) => return UnifiedProcessingResult::failure(e),
        };

        tracing::info!(
            strategy = ?decision.strategy,
            method = %decision.method,
            file_name,
            size = content.len(),
            "processing document"
        );

        match decision.strategy {
            Strategy::SelfHosted => {
                match self.extract_self_hosted(content, mime_type, file_name).await {
                    Ok(result) => self.finish(result, &request, decision),
                    Err(e) => UnifiedProcessingResult::failure_with(e, decision),
                }
            }
            Strategy::External => {
                match self.extract_external(content, mime_type, file_name).await {
                    Ok(result) => self.finish(result, &request, decision),
                    Err(e) => UnifiedProcessingResult::failure_with(e, decision),
                }
            }
            Strategy::AsyncBackground => {
                match self.submit_async(content, mime_type, file_name, &request).await {
                    Ok(job_id) => UnifiedProcessingResult::queued(job_id, decision),
                    Err(e) => UnifiedProcessingResult::failure_with(e, decision),
                }
            }
        }
    }

    /// Preview strategy, latency and cost without side effects.
    pub fn recommendation(
        &self,
        file_size: u64,
        mime_type: &str,
        file_name: &str,
    ) -> ProcessingResult<StrategyDecision> {
        recommend(file_size, mime_type, file_name, &self.selector_context())
    }

    /// Fetch async job status, enforcing ownership.
    pub fn job_status(&self, job_id: &str, user_id: &str) -> ProcessingResult<ProcessingJob> {
        self.job_manager()?.get_status(job_id, user_id)
    }

    /// Cancel a queued async job.
    pub async fn cancel_job(&self, job_id: &str, user_id: &str) -> ProcessingResult<()> {
        self.job_manager()?.cancel(job_id, user_id).await
    }

    fn job_manager(&self) -> ProcessingResult<&Arc<JobManager>> {
        self.jobs
            .as_ref()
            .ok_or_else(|| ProcessingError::dependency("async job manager not configured"))
    }

    async fn extract_self_hosted(
        &self,
        content: &[u8],
        mime_type: &str,
        file_name: &str,
    ) -> ProcessingResult<ExtractionResult> {
        match self.pipeline.extract(content, mime_type, file_name).await {
            Ok(result) => Ok(result),
            Err(e)
                if e.is_recoverable()
                    && self.config.enable_fallback
                    && self.external.is_some() =>
            {
                tracing::warn!(
                    file_name,
                    kind = ?e.kind,
                    "self-hosted extraction failed, falling back to external service"
                );
                self.extract_external(content, mime_type, file_name).await
            }
            Err(e) => Err(e),
        }
    }

    async fn extract_external(
        &self,
        content: &[u8],
        mime_type: &str,
        file_name: &str,
    ) -> ProcessingResult<ExtractionResult> {
        let client = self
            .external
            .as_ref()
            .ok_or_else(|| ProcessingError::dependency("external service not configured"))?;

        match client.extract(content, mime_type, file_name).await? {
            ExternalOutcome::Completed(result) => Ok(*result),
            ExternalOutcome::Accepted { job_id } => {
                let max_wait = Duration::from_secs(
                    self.config
                        .external
                        .as_ref()
                        .map(|e| e.timeout_secs)
                        .unwrap_or(60),
                );
                client
                    .wait_for_completion(&job_id, max_wait, EXTERNAL_POLL_INTERVAL)
                    .await
            }
        }
    }

    async fn submit_async(
        &self,
        content: &[u8],
        mime_type: &str,
        file_name: &str,
        request: &ProcessRequest,
    ) -> ProcessingResult<String> {
        let jobs = self.job_manager()?;
        let opts = SubmitOptions {
            user_id: request.user_id.clone(),
            course_id: request.course_id.clone(),
            priority: request.priority,
            callback_url: request.callback_url.clone(),
            chunking_config: request.chunking_config.clone(),
        };
        let receipt = jobs.submit(content, mime_type, file_name, opts).await?;
        Ok(receipt.job_id)
    }

    fn finish(
        &self,
        result: ExtractionResult,
        request: &ProcessRequest,
        decision: StrategyDecision,
    ) -> UnifiedProcessingResult {
        let document_id = request
            .document_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let chunking = request
            .chunking_config
            .as_ref()
            .unwrap_or(&self.config.chunking);

        match chunk_document(&document_id, &result, chunking) {
            Ok(chunks) => UnifiedProcessingResult::completed(result, chunks, decision),
            Err(e) => UnifiedProcessingResult::failure_with(e, decision),
        }
    }
}
