//! Page-based chunking for short paginated documents.
//!
//! Documents this short rarely need cross-page context, so each page
//! becomes one chunk and pages below the minimum are dropped rather than
//! merged.

use super::ChunkDraft;
use crate::types::{ChunkingConfig, ContentType, PageText};

pub(crate) fn chunk_pages(pages: &[PageText], config: &ChunkingConfig) -> Vec<ChunkDraft> {
    pages
        .iter()
        .filter(|page| page.text.trim().len() > config.min_chunk_size)
        .map(|page| ChunkDraft {
            content: page.text.trim().to_string(),
            content_type: ContentType::Text,
            page_number: Some(page.page_number),
            confidence: None,
            section: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ChunkingConfig {
        ChunkingConfig {
            min_chunk_size: 20,
            ..ChunkingConfig::default()
        }
    }

    #[test]
    fn test_each_page_becomes_one_chunk() {
        let pages = vec![
            PageText::new(1, "this page easily clears the minimum size".to_string()),
            PageText::new(2, "so does this one, with room to spare today".to_string()),
        ];
        let drafts = chunk_pages(&pages, &config());
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].page_number, Some(1));
        assert_eq!(drafts[1].page_number, Some(2));
    }

    #[test]
    fn test_short_pages_are_dropped() {
        let pages = vec![
            PageText::new(1, "long enough to keep around for indexing".to_string()),
            PageText::new(2, "tiny".to_string()),
            PageText::new(3, "another page with plenty of content here".to_string()),
        ];
        let drafts = chunk_pages(&pages, &config());
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[1].page_number, Some(3));
    }
}
