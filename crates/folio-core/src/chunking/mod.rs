//! Chunking engine.
//!
//! Turns a completed [`ExtractionResult`] into ordered [`DocumentChunk`]s
//! using one of three strategies selected by the shape of the input:
//!
//! - structure-based when headings were detected,
//! - page-based for short paginated documents,
//! - content-aware ("smart") chunking as the general fallback.
//!
//! Whatever the strategy, emitted chunks are never empty or
//! whitespace-only and indices are contiguous from 0 across the whole
//! document.

mod page;
mod smart;
mod structure;

use crate::error::{ErrorKind, ProcessingError, ProcessingResult};
use crate::types::{
    ChunkMetadata, ChunkStrategy, ChunkingConfig, ContentType, DocumentChunk,
    ExtractionResult, MetadataValue,
};

/// Page count at or below which paginated output is chunked per page.
pub const PAGE_CHUNKING_MAX_PAGES: usize = 10;

/// Intermediate chunk produced by a strategy before ids and indices are
/// assigned.
#[derive(Debug, Clone)]
pub(crate) struct ChunkDraft {
    pub content: String,
    pub content_type: ContentType,
    pub page_number: Option<u32>,
    pub confidence: Option<f32>,
    pub section: Option<String>,
}

/// Chunk a completed extraction result.
pub fn chunk_document(
    document_id: &str,
    result: &ExtractionResult,
    config: &ChunkingConfig,
) -> ProcessingResult<Vec<DocumentChunk>> {
    config.validate()?;

    let has_headings = result
        .structure
        .as_ref()
        .map(|s| !s.headings.is_empty())
        .unwrap_or(false);

    let (mut drafts, strategy) = if config.preserve_structure && has_headings {
        let structure = result.structure.as_ref().unwrap();
        (
            structure::chunk_structured(&result.text, structure, config),
            ChunkStrategy::StructureBased,
        )
    } else if let Some(pages) = result
        .page_texts
        .as_ref()
        .filter(|p| !p.is_empty() && p.len() <= PAGE_CHUNKING_MAX_PAGES)
    {
        let page_drafts = page::chunk_pages(pages, config);
        if page_drafts.is_empty() {
            // Every page fell below the minimum; fall through to smart
            // chunking of the full text instead of dropping the document.
            (smart::chunk_text(&result.text, config), ChunkStrategy::ContentAware)
        } else {
            (page_drafts, ChunkStrategy::PageBased)
        }
    } else {
        (smart::chunk_text(&result.text, config), ChunkStrategy::ContentAware)
    };

    if strategy == ChunkStrategy::ContentAware {
        if let Some(pages) = result.page_texts.as_deref() {
            smart::attribute_pages(&mut drafts, pages);
        }
    }

    let source_type = match result.metadata.get("extraction_method") {
        Some(MetadataValue::String(s)) => s.clone(),
        _ => "document".to_string(),
    };

    let chunks: Vec<DocumentChunk> = drafts
        .into_iter()
        .filter(|d| !d.content.trim().is_empty())
        .enumerate()
        .map(|(index, draft)| DocumentChunk {
            id: DocumentChunk::make_id(document_id, index),
            document_id: document_id.to_string(),
            chunk_index: index,
            character_count: draft.content.len(),
            content: draft.content,
            content_type: draft.content_type,
            page_number: draft.page_number,
            metadata: ChunkMetadata {
                source_type: source_type.clone(),
                strategy,
                confidence: draft.confidence,
                section: draft.section,
            },
        })
        .collect();

    if chunks.is_empty() {
        return Err(ProcessingError::new(
            ErrorKind::ChunkingFailed,
            format!("no chunks produced for document '{}'", document_id),
        ));
    }

    tracing::debug!(
        document_id,
        chunks = chunks.len(),
        strategy = ?strategy,
        "document chunked"
    );

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentStructure, Heading, PageText};

    fn config() -> ChunkingConfig {
        ChunkingConfig {
            max_chunk_size: 400,
            min_chunk_size: 100,
            overlap_size: 50,
            ..ChunkingConfig::default()
        }
    }

    fn paragraph(word: &str) -> String {
        format!("{} ", word).repeat(40).trim_end().to_string()
    }

    #[test]
    fn test_indices_contiguous_from_zero() {
        let text = format!(
            "{}\n\n{}\n\n{}\n\n{}",
            paragraph("alpha"),
            paragraph("beta"),
            paragraph("gamma"),
            paragraph("delta")
        );
        let result = ExtractionResult::new(text);
        let chunks = chunk_document("doc-1", &result, &config()).unwrap();
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.id, DocumentChunk::make_id("doc-1", i));
            assert_eq!(chunk.character_count, chunk.content.len());
            assert!(!chunk.content.trim().is_empty());
        }
    }

    #[test]
    fn test_structure_strategy_selected_when_headings_present() {
        let text = format!(
            "Introduction\n\n{}\n\nMain Content\n\n{}",
            paragraph("intro"),
            paragraph("body")
        );
        let mut result = ExtractionResult::new(text);
        result.structure = Some(DocumentStructure {
            headings: vec![Heading::new(1, "Introduction"), Heading::new(1, "Main Content")],
            ..Default::default()
        });
        let chunks = chunk_document("doc-1", &result, &config()).unwrap();
        assert!(chunks
            .iter()
            .all(|c| c.metadata.strategy == ChunkStrategy::StructureBased));
    }

    #[test]
    fn test_page_strategy_for_short_paginated_docs() {
        let pages = vec![
            PageText::new(1, paragraph("one")),
            PageText::new(2, paragraph("two")),
        ];
        let mut result = ExtractionResult::new(format!(
            "{}\n{}",
            pages[0].text, pages[1].text
        ));
        result.page_texts = Some(pages);
        let chunks = chunk_document("doc-1", &result, &config()).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks
            .iter()
            .all(|c| c.metadata.strategy == ChunkStrategy::PageBased));
        assert_eq!(chunks[0].page_number, Some(1));
        assert_eq!(chunks[1].page_number, Some(2));
    }

    #[test]
    fn test_all_short_pages_fall_back_to_smart() {
        let mut result = ExtractionResult::new(paragraph("words"));
        result.page_texts = Some(vec![
            PageText::new(1, "tiny".to_string()),
            PageText::new(2, "also tiny".to_string()),
        ]);
        // The full text is long enough for smart chunking even though every
        // individual page is below the minimum.
        let chunks = chunk_document("doc-1", &result, &config()).unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks
            .iter()
            .all(|c| c.metadata.strategy == ChunkStrategy::ContentAware));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = ExtractionResult::new(paragraph("text"));
        let bad = ChunkingConfig {
            overlap_size: 500,
            min_chunk_size: 100,
            ..ChunkingConfig::default()
        };
        assert!(chunk_document("doc-1", &result, &bad).is_err());
    }

    #[test]
    fn test_round_trip_preserves_paragraph_content() {
        let paragraphs = vec![
            paragraph("north"),
            paragraph("south"),
            paragraph("east"),
            paragraph("west"),
        ];
        let text = paragraphs.join("\n\n");
        let result = ExtractionResult::new(text);
        let chunks = chunk_document("doc-1", &result, &config()).unwrap();
        let concatenated: String = chunks.iter().map(|c| c.content.as_str()).collect();
        for para in &paragraphs {
            assert!(
                concatenated.contains(para),
                "paragraph lost during chunking"
            );
        }
    }
}
