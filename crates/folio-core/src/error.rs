//! Unified error taxonomy for document processing.
//!
//! Every failure in the ingestion pipeline is expressed as a single
//! [`ProcessingError`] carrying a tagged [`ErrorKind`], the pipeline
//! [`ProcessingStage`] where it occurred, and both an internal message and a
//! safe user-facing message. Library-specific failures (lopdf, docx-rs,
//! reqwest, rusqlite) are translated into this type by a mapper at the crate
//! that owns the dependency.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for processing operations.
pub type ProcessingResult<T> = Result<T, ProcessingError>;

/// Classification of every failure the pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// File exceeds the configured size limit.
    FileTooLarge,
    /// File content does not match its declared format.
    InvalidFileFormat,
    /// File is damaged or not a valid container.
    CorruptedFile,
    /// No extractor can handle this format.
    UnsupportedFormat,
    /// Document requires a password to open.
    PasswordProtected,
    /// Low-level parse failure inside a format library.
    ParsingFailed,
    /// Text extraction failed after parsing succeeded.
    ExtractionFailed,
    /// Markup/markdown conversion failed.
    ConversionFailed,
    /// Chunking produced no usable output.
    ChunkingFailed,
    /// Document too large to process in-request.
    MemoryLimitExceeded,
    /// A bounded wait elapsed before completion.
    ProcessingTimeout,
    /// Background executor is saturated.
    WorkerOverloaded,
    /// Extraction succeeded but yielded no text.
    NoContentExtracted,
    /// Extracted text is below the minimum content floor.
    InsufficientContent,
    /// External extraction service failed.
    ExternalServiceError,
    /// A supporting dependency (storage, database) failed.
    DependencyError,
    /// Job does not exist or belongs to another user.
    JobNotFound,
    /// Job is not in a state that permits the requested operation.
    InvalidJobState,
}

impl ErrorKind {
    /// Whether failures of this kind are recoverable by retry or fallback,
    /// absent more specific information at the failure site.
    pub fn default_recoverable(&self) -> bool {
        match self {
            ErrorKind::FileTooLarge
            | ErrorKind::ParsingFailed
            | ErrorKind::ExtractionFailed
            | ErrorKind::ConversionFailed
            | ErrorKind::ChunkingFailed
            | ErrorKind::MemoryLimitExceeded
            | ErrorKind::ProcessingTimeout
            | ErrorKind::WorkerOverloaded
            | ErrorKind::NoContentExtracted
            | ErrorKind::InsufficientContent
            | ErrorKind::ExternalServiceError
            | ErrorKind::DependencyError => true,
            ErrorKind::InvalidFileFormat
            | ErrorKind::CorruptedFile
            | ErrorKind::UnsupportedFormat
            | ErrorKind::PasswordProtected
            | ErrorKind::JobNotFound
            | ErrorKind::InvalidJobState => false,
        }
    }

    /// Stage where this kind typically originates.
    pub fn default_stage(&self) -> ProcessingStage {
        match self {
            ErrorKind::FileTooLarge
            | ErrorKind::InvalidFileFormat
            | ErrorKind::CorruptedFile
            | ErrorKind::UnsupportedFormat
            | ErrorKind::PasswordProtected
            | ErrorKind::JobNotFound
            | ErrorKind::InvalidJobState => ProcessingStage::Validation,
            ErrorKind::ParsingFailed => ProcessingStage::Parsing,
            ErrorKind::ExtractionFailed
            | ErrorKind::ConversionFailed
            | ErrorKind::MemoryLimitExceeded
            | ErrorKind::NoContentExtracted
            | ErrorKind::InsufficientContent => ProcessingStage::Extraction,
            ErrorKind::ChunkingFailed => ProcessingStage::Chunking,
            ErrorKind::ProcessingTimeout
            | ErrorKind::WorkerOverloaded
            | ErrorKind::ExternalServiceError
            | ErrorKind::DependencyError => ProcessingStage::Finalization,
        }
    }

    /// Default safe description shown to end users.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::FileTooLarge => {
                "This file is too large to process directly. Try a smaller file or background processing."
            }
            ErrorKind::InvalidFileFormat => "This file does not appear to be a valid document.",
            ErrorKind::CorruptedFile => "This file appears to be damaged and could not be read.",
            ErrorKind::UnsupportedFormat => "This file format is not supported.",
            ErrorKind::PasswordProtected => {
                "This document is password protected. Remove the password and upload again."
            }
            ErrorKind::ParsingFailed => "The document could not be parsed.",
            ErrorKind::ExtractionFailed => "Text could not be extracted from this document.",
            ErrorKind::ConversionFailed => "The document could not be converted.",
            ErrorKind::ChunkingFailed => "The extracted text could not be prepared for indexing.",
            ErrorKind::MemoryLimitExceeded => {
                "This document is too large to process immediately. It can be processed in the background."
            }
            ErrorKind::ProcessingTimeout => "Processing took too long. Please try again.",
            ErrorKind::WorkerOverloaded => "The system is busy. Please try again shortly.",
            ErrorKind::NoContentExtracted => "No readable text was found in this document.",
            ErrorKind::InsufficientContent => "The document contains too little text to index.",
            ErrorKind::ExternalServiceError => {
                "The document processing service is temporarily unavailable."
            }
            ErrorKind::DependencyError => "An internal service failed. Please try again.",
            ErrorKind::JobNotFound => "No such processing job was found.",
            ErrorKind::InvalidJobState => "This job can no longer be modified.",
        }
    }
}

/// Pipeline stage in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    Validation,
    Parsing,
    Extraction,
    Chunking,
    Finalization,
}

/// Structured processing failure.
///
/// Created at the point of failure and either returned to the caller or
/// written into a job record; never silently swallowed. `message` is for
/// logs, `user_message` is safe to surface through the route layer.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[error("{message}")]
pub struct ProcessingError {
    pub kind: ErrorKind,
    pub stage: ProcessingStage,
    pub message: String,
    pub user_message: String,
    pub recoverable: bool,
    /// Rendered source error, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_cause: Option<String>,
}

impl ProcessingError {
    /// Create an error with the kind's default stage, recoverability and
    /// user message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage: kind.default_stage(),
            message: message.into(),
            user_message: kind.user_message().to_string(),
            recoverable: kind.default_recoverable(),
            original_cause: None,
        }
    }

    /// Override the stage.
    pub fn at_stage(mut self, stage: ProcessingStage) -> Self {
        self.stage = stage;
        self
    }

    /// Override recoverability.
    pub fn recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    /// Attach the rendered source error.
    pub fn with_cause(mut self, cause: impl std::fmt::Display) -> Self {
        self.original_cause = Some(cause.to_string());
        self
    }

    /// Override the user-facing message.
    pub fn with_user_message(mut self, msg: impl Into<String>) -> Self {
        self.user_message = msg.into();
        self
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    /// Validation failure for an oversized file.
    pub fn file_too_large(size: u64, limit: u64) -> Self {
        Self::new(
            ErrorKind::FileTooLarge,
            format!("file size {} exceeds limit {}", size, limit),
        )
    }

    /// No extractor available for the MIME type.
    pub fn unsupported_format(mime_type: &str) -> Self {
        Self::new(
            ErrorKind::UnsupportedFormat,
            format!("no extractor available for '{}'", mime_type),
        )
    }

    /// Container-level corruption.
    pub fn corrupted_file(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::CorruptedFile, detail)
    }

    /// Extraction produced no text.
    pub fn no_content(file_name: &str) -> Self {
        Self::new(
            ErrorKind::NoContentExtracted,
            format!("no text content extracted from '{}'", file_name),
        )
    }

    /// Bounded wait elapsed.
    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProcessingTimeout, detail)
    }

    /// External service failure; recoverability depends on the cause.
    pub fn external(detail: impl Into<String>, recoverable: bool) -> Self {
        Self::new(ErrorKind::ExternalServiceError, detail).recoverable(recoverable)
    }

    /// Supporting infrastructure failure.
    pub fn dependency(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::DependencyError, detail)
    }

    /// Job lookup failed or crossed a user boundary.
    pub fn job_not_found(job_id: &str) -> Self {
        Self::new(ErrorKind::JobNotFound, format!("job '{}' not found", job_id))
    }

    /// Job state does not permit the requested operation.
    pub fn invalid_job_state(job_id: &str, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::InvalidJobState,
            format!("job '{}': {}", job_id, detail.into()),
        )
    }

    /// Map an IO failure into the taxonomy.
    pub fn from_io(err: std::io::Error, stage: ProcessingStage) -> Self {
        Self::new(ErrorKind::DependencyError, format!("io error: {}", err))
            .at_stage(stage)
            .with_cause(err)
    }

    /// Map an HTTP status from the external service into the taxonomy.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => Self::external(format!("authorization rejected ({})", status), false),
            402 => Self::external("quota exhausted".to_string(), false),
            413 => Self::new(ErrorKind::FileTooLarge, format!("service rejected payload: {}", body)),
            415 => Self::new(
                ErrorKind::UnsupportedFormat,
                format!("service rejected format: {}", body),
            ),
            408 | 429 => Self::external(format!("transient rejection ({})", status), true),
            s if s >= 500 => Self::external(format!("server error {}: {}", s, body), true),
            s => Self::external(format!("unexpected status {}: {}", s, body), false),
        }
    }
}
