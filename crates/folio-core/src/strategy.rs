//! Strategy selection: self-hosted vs external vs background processing.
//!
//! The selector is a pure function of its inputs so that retries and
//! client-side previews always agree with what the processor will do.

use crate::config::LARGE_FILE_CEILING;
use crate::error::{ProcessingError, ProcessingResult};
use serde::{Deserialize, Serialize};

/// MIME types the self-hosted extractors can handle.
pub const SELF_HOSTED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/docx",
];

/// Filename keywords that usually indicate complex layout (tables, forms)
/// where the external service extracts with much higher fidelity.
const COMPLEX_LAYOUT_KEYWORDS: &[&str] = &[
    "invoice",
    "contract",
    "financial",
    "statement",
    "template",
    "form",
];

/// Size above which the heuristic recommends the external service.
const HEURISTIC_EXTERNAL_SIZE: u64 = 10 * 1024 * 1024;

/// Execution path for a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    SelfHosted,
    External,
    AsyncBackground,
}

/// Caller preferences influencing strategy selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingOptions {
    pub prefer_self_hosted: bool,
    pub require_advanced_features: bool,
    pub force_async: bool,
    pub force_direct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cost_per_document: Option<f64>,
}

/// Environment facts the selector needs; derived from configuration.
#[derive(Debug, Clone)]
pub struct SelectorContext {
    pub external_configured: bool,
    pub cost_per_page: f64,
    pub large_file_ceiling: u64,
}

impl Default for SelectorContext {
    fn default() -> Self {
        Self {
            external_configured: false,
            cost_per_page: crate::config::DEFAULT_COST_PER_PAGE,
            large_file_ceiling: LARGE_FILE_CEILING,
        }
    }
}

/// Selected strategy plus the reasoning behind it, usable as a
/// no-side-effect preview for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDecision {
    pub strategy: Strategy,
    /// Concrete extraction method tag ("pdf-native", "docx-native",
    /// "external-api").
    pub method: String,
    pub reasons: Vec<String>,
    pub estimated_time_seconds: u64,
    pub estimated_cost: f64,
}

/// Estimate external extraction cost from file size: pages approximated as
/// `ceil(size / 1MiB)` at a fixed per-page rate.
pub fn estimate_external_cost(file_size: u64, cost_per_page: f64) -> f64 {
    let pages = file_size.div_ceil(1024 * 1024).max(1);
    pages as f64 * cost_per_page
}

/// Rough wall-clock estimate per strategy, in seconds.
fn estimate_time_seconds(strategy: Strategy, file_size: u64, mime_type: &str) -> u64 {
    let mb = file_size.div_ceil(1024 * 1024).max(1);
    let docx_penalty = if is_docx(mime_type) { 5 } else { 0 };
    match strategy {
        Strategy::SelfHosted => 2 + mb / 2 + docx_penalty,
        Strategy::External => 10 + mb + docx_penalty,
        Strategy::AsyncBackground => 30 + mb * 2 + docx_penalty,
    }
}

fn is_pdf(mime_type: &str) -> bool {
    mime_type == "application/pdf"
}

fn is_docx(mime_type: &str) -> bool {
    mime_type == "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        || mime_type == "application/docx"
}

fn self_hosted_capable(mime_type: &str) -> bool {
    SELF_HOSTED_MIME_TYPES.contains(&mime_type)
}

fn complex_layout_name(file_name: &str) -> Option<&'static str> {
    let lower = file_name.to_lowercase();
    COMPLEX_LAYOUT_KEYWORDS
        .iter()
        .find(|k| lower.contains(*k))
        .copied()
}

/// Pick the execution path for a file. Deterministic: identical inputs
/// always produce the identical decision.
///
/// Rules are evaluated in spec order; the first match wins. A PDF above the
/// large-file ceiling is never processed self-hosted in-request: the
/// decision is rewritten to the background path unless the caller forced a
/// direct response, in which case the external service is used when
/// available and the file is otherwise rejected as too large.
pub fn select_strategy(
    file_size: u64,
    mime_type: &str,
    file_name: &str,
    options: &ProcessingOptions,
    ctx: &SelectorContext,
) -> ProcessingResult<StrategyDecision> {
    let mut reasons = Vec::new();
    let strategy = pick(file_size, mime_type, file_name, options, ctx, &mut reasons)?;

    // Large PDFs would blow the in-request memory/time budget.
    let strategy = if strategy == Strategy::SelfHosted
        && is_pdf(mime_type)
        && file_size > ctx.large_file_ceiling
    {
        if !options.force_direct {
            reasons.push(format!(
                "PDF exceeds {} byte ceiling; moved to background processing",
                ctx.large_file_ceiling
            ));
            Strategy::AsyncBackground
        } else if ctx.external_configured {
            reasons.push("direct response forced for oversized PDF; using external service".into());
            Strategy::External
        } else {
            return Err(ProcessingError::file_too_large(
                file_size,
                ctx.large_file_ceiling,
            ));
        }
    } else {
        strategy
    };

    let estimated_cost = match strategy {
        Strategy::External => estimate_external_cost(file_size, ctx.cost_per_page),
        _ => 0.0,
    };
    let method = match strategy {
        Strategy::External => "external-api".to_string(),
        _ if is_pdf(mime_type) => "pdf-native".to_string(),
        _ if is_docx(mime_type) => "docx-native".to_string(),
        _ => "external-api".to_string(),
    };

    Ok(StrategyDecision {
        strategy,
        method,
        reasons,
        estimated_time_seconds: estimate_time_seconds(strategy, file_size, mime_type),
        estimated_cost,
    })
}

fn pick(
    file_size: u64,
    mime_type: &str,
    file_name: &str,
    options: &ProcessingOptions,
    ctx: &SelectorContext,
    reasons: &mut Vec<String>,
) -> ProcessingResult<Strategy> {
    // 1. Explicit async request.
    if options.force_async {
        reasons.push("async processing requested".into());
        return Ok(Strategy::AsyncBackground);
    }

    // 3. Advanced features (tables, OCR) need the external service.
    if options.require_advanced_features && ctx.external_configured {
        reasons.push("advanced extraction features requested".into());
        return Ok(Strategy::External);
    }

    // 4. Caller preference for local extraction.
    if options.prefer_self_hosted && !options.require_advanced_features {
        if self_hosted_capable(mime_type) {
            reasons.push("self-hosted extraction preferred by caller".into());
            return Ok(Strategy::SelfHosted);
        }
        reasons.push(format!(
            "self-hosted preferred but '{}' is not locally extractable",
            mime_type
        ));
    }

    // 5. Formats outside the self-hosted set need the external service.
    if !self_hosted_capable(mime_type) {
        if ctx.external_configured {
            reasons.push(format!("'{}' requires the external service", mime_type));
            return Ok(Strategy::External);
        }
        // No capable path exists: fail at submission instead of queueing a
        // job that can never succeed.
        return Err(ProcessingError::unsupported_format(mime_type));
    }

    // 6. Without an external service the only question is direct vs async.
    if !ctx.external_configured {
        if file_size < ctx.large_file_ceiling {
            reasons.push("no external service configured; extracting locally".into());
            return Ok(Strategy::SelfHosted);
        }
        if options.force_direct {
            return Err(ProcessingError::file_too_large(
                file_size,
                ctx.large_file_ceiling,
            ));
        }
        reasons.push("file too large for in-request extraction".into());
        return Ok(Strategy::AsyncBackground);
    }

    // 7. Heuristic: big files and complex-layout filenames extract far
    // better externally.
    if file_size > HEURISTIC_EXTERNAL_SIZE {
        reasons.push("large file benefits from external extraction".into());
        return Ok(Strategy::External);
    }
    if let Some(keyword) = complex_layout_name(file_name) {
        reasons.push(format!(
            "filename suggests complex layout ('{}'); external extraction recommended",
            keyword
        ));
        return Ok(Strategy::External);
    }

    // 8. Cost cap.
    if let Some(max_cost) = options.max_cost_per_document {
        let estimated = estimate_external_cost(file_size, ctx.cost_per_page);
        if estimated > max_cost {
            reasons.push(format!(
                "estimated external cost ${:.2} exceeds cap ${:.2}",
                estimated, max_cost
            ));
            return Ok(Strategy::SelfHosted);
        }
    }

    // 9. Default.
    reasons.push("default: self-hosted extraction".into());
    Ok(Strategy::SelfHosted)
}

/// Side-effect-free preview of strategy, latency and cost for a file,
/// evaluated with default options.
pub fn recommend(
    file_size: u64,
    mime_type: &str,
    file_name: &str,
    ctx: &SelectorContext,
) -> ProcessingResult<StrategyDecision> {
    select_strategy(
        file_size,
        mime_type,
        file_name,
        &ProcessingOptions::default(),
        ctx,
    )
}
