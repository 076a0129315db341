//! Structure-based chunking driven by detected headings.
//!
//! The full text is split into sections at heading occurrences; oversized
//! sections are recursively chunked by the content-aware strategy with the
//! parent heading carried on every sub-chunk. Tables and footnotes become
//! their own chunks independent of section boundaries.

use super::{smart, ChunkDraft};
use crate::types::{ChunkingConfig, ContentType, DocumentStructure};

pub(crate) fn chunk_structured(
    text: &str,
    structure: &DocumentStructure,
    config: &ChunkingConfig,
) -> Vec<ChunkDraft> {
    let mut drafts = Vec::new();

    // Locate headings in document order. Headings whose text cannot be
    // found (e.g. reflowed by extraction) are skipped rather than guessed.
    let mut positions: Vec<(usize, &str)> = Vec::new();
    let mut cursor = 0usize;
    for heading in &structure.headings {
        if let Some(rel) = text[cursor..].find(&heading.text) {
            let pos = cursor + rel;
            positions.push((pos, heading.text.as_str()));
            cursor = pos + heading.text.len();
        } else {
            tracing::debug!(heading = %heading.text, "heading not found in text; skipped");
        }
    }

    // Content before the first located heading still gets chunked.
    let preamble_end = positions.first().map(|(p, _)| *p).unwrap_or(text.len());
    let preamble = text[..preamble_end].trim();
    if !preamble.is_empty() {
        drafts.extend(smart::chunk_text(preamble, config));
    }

    for (i, (start, heading_text)) in positions.iter().enumerate() {
        let end = positions
            .get(i + 1)
            .map(|(p, _)| *p)
            .unwrap_or(text.len());
        let section = text[*start..end].trim();
        if section.is_empty() {
            continue;
        }

        if section.len() <= config.max_chunk_size {
            drafts.push(ChunkDraft {
                content: section.to_string(),
                content_type: ContentType::Text,
                page_number: None,
                confidence: Some(smart::confidence_score(section)),
                section: Some(heading_text.to_string()),
            });
        } else {
            let mut sub = smart::chunk_text(section, config);
            for draft in &mut sub {
                draft.section = Some(heading_text.to_string());
            }
            drafts.extend(sub);
        }
    }

    for table in &structure.tables {
        if table.content.trim().is_empty() {
            continue;
        }
        drafts.push(ChunkDraft {
            content: table.content.clone(),
            content_type: ContentType::Table,
            page_number: None,
            confidence: None,
            section: None,
        });
    }

    for footnote in &structure.footnotes {
        if footnote.text.trim().is_empty() {
            continue;
        }
        drafts.push(ChunkDraft {
            content: footnote.text.clone(),
            content_type: ContentType::Text,
            page_number: None,
            confidence: None,
            section: None,
        });
    }

    drafts
}
