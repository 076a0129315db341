//! Factory for creating extractors.

use std::sync::Arc;

use folio_core::{ProcessingError, ProcessingResult};

use crate::{DocxExtractor, DocxOptions, Extractor, PdfExtractor, PdfOptions};

/// Factory for creating content extractors.
pub struct ExtractorFactory;

impl ExtractorFactory {
    /// Create a PDF extractor with default options.
    pub fn pdf() -> Arc<dyn Extractor> {
        Arc::new(PdfExtractor::new())
    }

    /// Create a PDF extractor with custom options.
    pub fn pdf_with_options(options: PdfOptions) -> Arc<dyn Extractor> {
        Arc::new(PdfExtractor::with_options(options))
    }

    /// Create a DOCX extractor with default options.
    pub fn docx() -> Arc<dyn Extractor> {
        Arc::new(DocxExtractor::new())
    }

    /// Create a DOCX extractor with custom options.
    pub fn docx_with_options(options: DocxOptions) -> Arc<dyn Extractor> {
        Arc::new(DocxExtractor::with_options(options))
    }

    /// Create the extractor for a given MIME type.
    pub fn for_mime_type(mime_type: &str) -> ProcessingResult<Arc<dyn Extractor>> {
        match mime_type {
            "application/pdf" => Ok(Self::pdf()),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            | "application/docx" => Ok(Self::docx()),
            other => Err(ProcessingError::unsupported_format(other)),
        }
    }

    /// Get all available extractors.
    pub fn all() -> Vec<Arc<dyn Extractor>> {
        vec![Self::pdf(), Self::docx()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::ErrorKind;

    #[test]
    fn test_factory_all_extractors() {
        let extractors = ExtractorFactory::all();
        assert_eq!(extractors.len(), 2);
    }

    #[test]
    fn test_factory_for_mime_type() {
        let pdf = ExtractorFactory::for_mime_type("application/pdf").unwrap();
        assert_eq!(pdf.name(), "pdf-native");

        let docx = ExtractorFactory::for_mime_type(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        )
        .unwrap();
        assert_eq!(docx.name(), "docx-native");
    }

    #[test]
    fn test_factory_unsupported_mime_type() {
        let err = ExtractorFactory::for_mime_type("video/mp4").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedFormat);
    }
}
