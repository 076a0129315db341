//! folio-core - Core types and algorithms for document ingestion.
//!
//! Provides the unified error taxonomy, the extraction/chunk data model,
//! the chunking engine and the processing strategy selector shared by the
//! extractor, client, job and pipeline crates.
//!
//! # Example
//!
//! ```ignore
//! use folio_core::{chunk_document, ChunkingConfig, ExtractionResult};
//!
//! let result = ExtractionResult::new(extracted_text);
//! let chunks = chunk_document("doc-1", &result, &ChunkingConfig::default())?;
//! ```

pub mod chunking;
pub mod config;
pub mod error;
pub mod strategy;
pub mod types;

pub use chunking::{chunk_document, PAGE_CHUNKING_MAX_PAGES};
pub use config::{ExternalServiceConfig, ProcessingConfig, ProcessingLimits, LARGE_FILE_CEILING};
pub use error::{ErrorKind, ProcessingError, ProcessingResult, ProcessingStage};
pub use strategy::{
    recommend, select_strategy, ProcessingOptions, SelectorContext, Strategy, StrategyDecision,
    SELF_HOSTED_MIME_TYPES,
};
pub use types::{
    slugify, ChunkBoundary, ChunkMetadata, ChunkStrategy, ChunkingConfig, ContentType,
    DocumentChunk, DocumentStructure, ExtractionResult, Footnote, Heading, MetadataValue,
    PageText, Table, MIN_CONTENT_LENGTH,
};
