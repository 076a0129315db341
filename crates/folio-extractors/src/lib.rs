//! folio-extractors - Self-hosted document extraction.
//!
//! Provides in-process extractors for PDF and DOCX content behind a
//! unified trait, plus a pipeline that routes by MIME type. Extractors are
//! compiled in and selected through the processing strategy; there is no
//! dynamic lookup.
//!
//! # Example
//!
//! ```ignore
//! use folio_extractors::{ExtractionPipeline, ExtractorFactory};
//!
//! // MIME-routed extraction
//! let pipeline = ExtractionPipeline::with_defaults();
//! let result = pipeline.extract(&bytes, "application/pdf", "notes.pdf").await?;
//!
//! // Or pick an extractor directly
//! let pdf = ExtractorFactory::pdf();
//! let result = pdf.extract(&bytes, "notes.pdf").await?;
//! ```

mod docx;
mod factory;
mod pdf;
mod pipeline;

pub use docx::{DocxExtractor, DocxOptions};
pub use factory::ExtractorFactory;
pub use pdf::{PdfExtractor, PdfOptions};
pub use pipeline::ExtractionPipeline;

use async_trait::async_trait;
use folio_core::{ExtractionResult, ProcessingResult};

/// Core extractor trait - all self-hosted extractors implement this.
#[async_trait]
pub trait Extractor: std::fmt::Debug + Send + Sync {
    /// Extract normalized content from raw bytes.
    async fn extract(&self, content: &[u8], file_name: &str)
        -> ProcessingResult<ExtractionResult>;

    /// Supported MIME types for this extractor.
    fn supported_types(&self) -> &[&str];

    /// Check if this extractor handles the given MIME type.
    fn supports(&self, mime_type: &str) -> bool {
        self.supported_types().contains(&mime_type)
    }

    /// Human-readable name for this extractor.
    fn name(&self) -> &str;
}
