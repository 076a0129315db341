//! folio-pipeline - Unified document processing.
//!
//! Wires the strategy selector, self-hosted extractors, external client,
//! chunking engine and async job manager into the single submission,
//! status and recommendation surface consumed by the route layer.

mod processor;

pub use processor::{ProcessRequest, UnifiedProcessingResult, UnifiedProcessor};
