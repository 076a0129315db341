//! folio-client - Client for the external extraction service.
//!
//! Submits documents for remote extraction, classifies failures into the
//! shared error taxonomy, retries transient rejections with linear backoff
//! and polls asynchronous jobs to completion.

mod client;

pub use client::{ExternalClient, ExternalOutcome, PollOutcome};
