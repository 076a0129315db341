//! Processing configuration.
//!
//! Loaded from the environment (`FOLIO_*` variables, `.env` supported via
//! dotenvy) with sensible defaults for everything else.

use crate::types::ChunkingConfig;
use serde::{Deserialize, Serialize};

/// Default per-page rate charged by the external service, in dollars.
pub const DEFAULT_COST_PER_PAGE: f64 = 0.01;

/// Hard ceiling above which PDFs are never processed in-request.
pub const LARGE_FILE_CEILING: u64 = 50 * 1024 * 1024;

/// External extraction service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalServiceConfig {
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub timeout_secs: u64,
    /// Per-page rate used for cost estimation.
    pub cost_per_page: f64,
}

impl ExternalServiceConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout_secs: 60,
            cost_per_page: DEFAULT_COST_PER_PAGE,
        }
    }
}

/// Resource limits enforced before and during extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingLimits {
    /// Largest file accepted at all.
    pub max_file_size: u64,
    /// PDF page count above which self-hosted extraction refuses to run.
    pub max_pdf_pages: usize,
    /// Size above which PDFs are forced to the background path.
    pub large_file_ceiling: u64,
}

impl Default for ProcessingLimits {
    fn default() -> Self {
        Self {
            max_file_size: 200 * 1024 * 1024,
            max_pdf_pages: 500,
            large_file_ceiling: LARGE_FILE_CEILING,
        }
    }
}

/// Top-level configuration for the ingestion core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// External extraction service; `None` means self-hosted only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<ExternalServiceConfig>,
    pub limits: ProcessingLimits,
    pub chunking: ChunkingConfig,
    /// Fall back to the external service when a recoverable self-hosted
    /// failure occurs.
    pub enable_fallback: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            external: None,
            limits: ProcessingLimits::default(),
            chunking: ChunkingConfig::default(),
            enable_fallback: true,
        }
    }
}

impl ProcessingConfig {
    /// Load configuration from the environment.
    ///
    /// `FOLIO_EXTRACT_ENDPOINT` and `FOLIO_EXTRACT_API_KEY` together enable
    /// the external service. Limits fall back to defaults when unset or
    /// unparseable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let external = match (
            std::env::var("FOLIO_EXTRACT_ENDPOINT"),
            std::env::var("FOLIO_EXTRACT_API_KEY"),
        ) {
            (Ok(endpoint), Ok(api_key)) if !endpoint.is_empty() => {
                let mut cfg = ExternalServiceConfig::new(endpoint, api_key);
                if let Some(t) = env_parse("FOLIO_EXTRACT_TIMEOUT_SECS") {
                    cfg.timeout_secs = t;
                }
                if let Some(c) = env_parse("FOLIO_EXTRACT_COST_PER_PAGE") {
                    cfg.cost_per_page = c;
                }
                Some(cfg)
            }
            _ => None,
        };

        let mut limits = ProcessingLimits::default();
        if let Some(v) = env_parse("FOLIO_MAX_FILE_SIZE") {
            limits.max_file_size = v;
        }
        if let Some(v) = env_parse("FOLIO_MAX_PDF_PAGES") {
            limits.max_pdf_pages = v;
        }

        let enable_fallback = env_parse::<bool>("FOLIO_ENABLE_FALLBACK").unwrap_or(true);

        Self {
            external,
            limits,
            chunking: ChunkingConfig::default(),
            enable_fallback,
        }
    }

    pub fn external_configured(&self) -> bool {
        self.external.is_some()
    }

    pub fn cost_per_page(&self) -> f64 {
        self.external
            .as_ref()
            .map(|e| e.cost_per_page)
            .unwrap_or(DEFAULT_COST_PER_PAGE)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
