//! Extraction pipeline for routing content through appropriate extractors.

use std::sync::Arc;
use std::time::Instant;

use folio_core::{ExtractionResult, ProcessingError, ProcessingResult};

use crate::Extractor;

/// Pipeline for extracting content using registered extractors.
///
/// Routes content to the first extractor claiming the MIME type.
pub struct ExtractionPipeline {
    extractors: Vec<Arc<dyn Extractor>>,
}

impl ExtractionPipeline {
    /// Create new empty pipeline.
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Create pipeline with all available extractors.
    pub fn with_defaults() -> Self {
        Self {
            extractors: crate::ExtractorFactory::all(),
        }
    }

    /// Add an extractor to the pipeline.
    pub fn add_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    /// Extract content using the appropriate extractor for the MIME type.
    pub async fn extract(
        &self,
        content: &[u8],
        mime_type: &str,
        file_name: &str,
    ) -> ProcessingResult<ExtractionResult> {
        for extractor in &self.extractors {
            if extractor.supports(mime_type) {
                let started = Instant::now();
                let result = extractor.extract(content, file_name).await;
                match &result {
                    Ok(extracted) => tracing::debug!(
                        extractor = extractor.name(),
                        mime_type,
                        text_len = extracted.text.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "extraction complete"
                    ),
                    Err(err) => tracing::warn!(
                        extractor = extractor.name(),
                        mime_type,
                        kind = ?err.kind,
                        "extraction failed"
                    ),
                }
                return result;
            }
        }

        Err(ProcessingError::unsupported_format(mime_type))
    }

    /// Check if pipeline can handle a given MIME type.
    pub fn supports(&self, mime_type: &str) -> bool {
        self.extractors.iter().any(|e| e.supports(mime_type))
    }

    /// List all supported MIME types.
    pub fn supported_types(&self) -> Vec<&str> {
        self.extractors
            .iter()
            .flat_map(|e| e.supported_types().iter().copied())
            .collect()
    }

    /// Get the number of registered extractors.
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    /// Check if the pipeline has no registered extractors.
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

impl Default for ExtractionPipeline {
    fn default() -> Self {
        Self::with_defaults()
    }
}
