//! Core data model for extraction and chunking.

use crate::error::{ErrorKind, ProcessingError, ProcessingResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Minimum amount of text a successful extraction must produce.
pub const MIN_CONTENT_LENGTH: usize = 10;

/// Typed metadata value reported by extractors.
///
/// Replaces the open-ended JSON blobs of ad hoc extractor output with a
/// small variant set that still covers everything extractors report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Number(f64),
    Bool(bool),
    StringList(Vec<String>),
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::String(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::String(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Number(v)
    }
}

impl From<usize> for MetadataValue {
    fn from(v: usize) -> Self {
        MetadataValue::Number(v as f64)
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

/// Text content of a single page, ordered by page number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    pub page_number: u32,
    pub text: String,
    pub word_count: usize,
}

impl PageText {
    pub fn new(page_number: u32, text: String) -> Self {
        let word_count = text.split_whitespace().count();
        Self {
            page_number,
            text,
            word_count,
        }
    }
}

/// Detected heading with a stable generated id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    pub id: String,
}

impl Heading {
    pub fn new(level: u8, text: impl Into<String>) -> Self {
        let text = text.into();
        let id = slugify(&text);
        Self { level, text, id }
    }
}

/// Detected table with flattened textual content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub rows: usize,
    pub columns: usize,
    pub content: String,
    /// Ordinal position of the table in the document.
    pub position: usize,
}

/// Footnote-like element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footnote {
    pub id: String,
    pub text: String,
    pub position: usize,
}

/// Structural elements detected during extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentStructure {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub headings: Vec<Heading>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tables: Vec<Table>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub footnotes: Vec<Footnote>,
}

impl DocumentStructure {
    pub fn is_empty(&self) -> bool {
        self.headings.is_empty() && self.tables.is_empty() && self.footnotes.is_empty()
    }
}

/// Normalized output of any extraction path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Full plain-text content. Non-empty on success.
    pub text: String,

    /// Markup rendering preserving headings/lists/tables, when produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_text: Option<String>,

    /// Per-page text for paginated formats, ordered by page number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_texts: Option<Vec<PageText>>,

    /// Detected document structure, when extracted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure: Option<DocumentStructure>,

    /// Extractor-reported properties (author, title, counts, method tag).
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, MetadataValue>,

    pub processing_time_ms: u64,

    /// Estimated cost in dollars; 0 for local extraction.
    pub cost_estimate: f64,
}

impl ExtractionResult {
    pub fn new(text: String) -> Self {
        Self {
            text,
            structured_text: None,
            page_texts: None,
            structure: None,
            metadata: HashMap::new(),
            processing_time_ms: 0,
            cost_estimate: 0.0,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Enforce the minimum content floor: a success never carries empty or
    /// near-empty text.
    pub fn validate_min_content(&self, file_name: &str) -> ProcessingResult<()> {
        if self.text.trim().len() < MIN_CONTENT_LENGTH {
            return Err(ProcessingError::no_content(file_name));
        }
        Ok(())
    }
}

/// Category of content a chunk holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Heading,
    Table,
    List,
}

/// Strategy that produced a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    PageBased,
    ContentAware,
    StructureBased,
}

/// Metadata attached to each chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source format tag (e.g. "pdf", "docx", "external").
    pub source_type: String,
    pub strategy: ChunkStrategy,
    /// Heuristic coherence score in [0.1, 1.0], when computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    /// Parent heading for structure-based chunks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

/// Atomic retrievable unit handed to the indexing collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Stable id, deterministic for the same document and index.
    pub id: String,
    pub document_id: String,
    /// Contiguous, 0-based across the whole document.
    pub chunk_index: usize,
    pub content: String,
    pub content_type: ContentType,
    /// Always equals `content.len()`.
    pub character_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    /// Deterministic chunk id for re-indexing idempotency.
    pub fn make_id(document_id: &str, index: usize) -> String {
        format!("{}-chunk-{:04}", document_id, index)
    }
}

/// How the content-aware chunker prefers to break text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkBoundary {
    /// Break anywhere a sentence ends.
    Sentence,
    /// Break between blank-line-delimited paragraphs.
    Paragraph,
    /// Break between runs of two or more blank lines, keeping each
    /// section's paragraphs together; degrades to `Paragraph` when the
    /// text has no such delimiters.
    Section,
}

/// Chunking engine configuration. All sizes are in characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub max_chunk_size: usize,
    pub min_chunk_size: usize,
    pub overlap_size: usize,
    pub chunk_boundary: ChunkBoundary,
    pub preserve_structure: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 2000,
            min_chunk_size: 300,
            overlap_size: 200,
            chunk_boundary: ChunkBoundary::Paragraph,
            preserve_structure: true,
        }
    }
}

impl ChunkingConfig {
    /// Enforce `0 < overlap < min <= max`.
    pub fn validate(&self) -> ProcessingResult<()> {
        if self.overlap_size == 0
            || self.overlap_size >= self.min_chunk_size
            || self.min_chunk_size > self.max_chunk_size
        {
            return Err(
                ProcessingError::new(
                    ErrorKind::ChunkingFailed,
                    format!(
                        "invalid chunking config: overlap={} min={} max={}",
                        self.overlap_size, self.min_chunk_size, self.max_chunk_size
                    ),
                )
                .recoverable(false),
            );
        }
        Ok(())
    }
}

/// Generate a stable slug id from heading text.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            for lc in c.to_lowercase() {
                slug.push(lc);
            }
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_content_floor() {
        let ok = ExtractionResult::new("this is a perfectly fine document".to_string());
        assert!(ok.validate_min_content("a.pdf").is_ok());

        let short = ExtractionResult::new("   hi   ".to_string());
        let err = short.validate_min_content("a.pdf").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoContentExtracted);
    }

    #[test]
    fn test_chunking_config_validation() {
        assert!(ChunkingConfig::default().validate().is_ok());

        let bad = ChunkingConfig {
            overlap_size: 400,
            min_chunk_size: 300,
            ..ChunkingConfig::default()
        };
        assert!(bad.validate().is_err());

        let inverted = ChunkingConfig {
            min_chunk_size: 3000,
            max_chunk_size: 2000,
            ..ChunkingConfig::default()
        };
        assert!(inverted.validate().is_err());

        let zero_overlap = ChunkingConfig {
            overlap_size: 0,
            ..ChunkingConfig::default()
        };
        assert!(zero_overlap.validate().is_err());
    }

    #[test]
    fn test_chunk_id_is_deterministic() {
        assert_eq!(
            DocumentChunk::make_id("doc-1", 3),
            DocumentChunk::make_id("doc-1", 3)
        );
        assert_ne!(
            DocumentChunk::make_id("doc-1", 3),
            DocumentChunk::make_id("doc-2", 3)
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Main Content"), "main-content");
        assert_eq!(slugify("1. Introduction!"), "1-introduction");
        assert_eq!(slugify("  spaced  out  "), "spaced-out");
    }

    #[test]
    fn test_page_text_word_count() {
        let page = PageText::new(1, "three short words".to_string());
        assert_eq!(page.word_count, 3);
    }

    #[test]
    fn test_metadata_value_serialization() {
        let mut map: HashMap<String, MetadataValue> = HashMap::new();
        map.insert("title".into(), "Lecture 1".into());
        map.insert("pages".into(), 4usize.into());
        let json = serde_json::to_string(&map).unwrap();
        let back: HashMap<String, MetadataValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back["title"], MetadataValue::String("Lecture 1".into()));
        assert_eq!(back["pages"], MetadataValue::Number(4.0));
    }
}
