//! Content-aware chunking: the general-purpose strategy.
//!
//! Greedily accumulates boundary-delimited units up to the size limit,
//! seeds each new chunk with a sentence-aligned overlap from the previous
//! one, and scores every chunk with a coherence heuristic. The unit of
//! accumulation follows the configured boundary, so chunks never break
//! inside a unit.

use super::ChunkDraft;
use crate::types::{ChunkBoundary, ChunkingConfig, PageText};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static PARAGRAPH_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("static regex"));

static SECTION_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n\s*\n").expect("static regex"));

/// Chunks below this length read as fragments and are penalized.
const SHORT_CHUNK_FLOOR: usize = 150;

/// Length band in which chunks tend to embed well.
const GOOD_BAND: std::ops::RangeInclusive<usize> = 300..=1500;

/// Split text into content-aware chunks.
pub(crate) fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<ChunkDraft> {
    let (units, joiner) = split_units(text, config.chunk_boundary);

    let mut drafts: Vec<ChunkDraft> = Vec::new();
    let mut buf = String::new();

    for unit in units {
        let projected = if buf.is_empty() {
            unit.len()
        } else {
            buf.len() + joiner.len() + unit.len()
        };

        // Finalize only when the buffer has reached the minimum; otherwise
        // the unit is appended regardless so no chunk lands below
        // min_chunk_size (except the trailing one).
        if !buf.is_empty() && projected > config.max_chunk_size && buf.len() >= config.min_chunk_size
        {
            let overlap = overlap_tail(&buf, config.overlap_size);
            drafts.push(draft_for(std::mem::take(&mut buf)));
            buf = overlap;
        }

        if !buf.is_empty() {
            buf.push_str(joiner);
        }
        buf.push_str(unit);
    }

    if !buf.trim().is_empty() {
        drafts.push(draft_for(buf));
    }

    drafts
}

/// Accumulation units for the configured boundary, with the separator
/// used to rejoin them inside a chunk.
fn split_units(text: &str, boundary: ChunkBoundary) -> (Vec<&str>, &'static str) {
    match boundary {
        ChunkBoundary::Sentence => (split_sentences(text), " "),
        ChunkBoundary::Paragraph => (split_paragraphs(text), "\n\n"),
        ChunkBoundary::Section => {
            let sections: Vec<&str> = SECTION_SPLIT
                .split(text)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            // Without section delimiters, fall back to paragraphs so the
            // text still chunks.
            if sections.len() > 1 {
                (sections, "\n\n")
            } else {
                (split_paragraphs(text), "\n\n")
            }
        }
    }
}

fn split_paragraphs(text: &str) -> Vec<&str> {
    PARAGRAPH_SPLIT
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Cut after terminal punctuation followed by whitespace. Abbreviations
/// produce spurious cuts; the greedy accumulation absorbs them.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut units = Vec::new();
    let mut start = 0;
    let mut after_terminal = false;
    for (idx, c) in text.char_indices() {
        if after_terminal && c.is_whitespace() {
            let unit = text[start..idx].trim();
            if !unit.is_empty() {
                units.push(unit);
            }
            start = idx;
        }
        after_terminal = matches!(c, '.' | '!' | '?');
    }
    let last = text[start..].trim();
    if !last.is_empty() {
        units.push(last);
    }
    units
}

fn draft_for(content: String) -> ChunkDraft {
    let confidence = Some(confidence_score(&content));
    ChunkDraft {
        content,
        content_type: crate::types::ContentType::Text,
        page_number: None,
        confidence,
        section: None,
    }
}

/// Heuristic coherence score, clamped to [0.1, 1.0].
pub(crate) fn confidence_score(content: &str) -> f32 {
    let mut score = 0.8_f32;
    let len = content.len();
    if GOOD_BAND.contains(&len) {
        score += 0.1;
    }
    if content
        .trim_end()
        .ends_with(['.', '!', '?', '…', '"', '\''])
    {
        score += 0.1;
    }
    if len < SHORT_CHUNK_FLOOR {
        score -= 0.2;
    }
    score.clamp(0.1, 1.0)
}

/// Tail of `text` reused as the seed of the next chunk.
///
/// Takes the last `overlap` characters, preferring to start just after a
/// sentence boundary when one occurs within `2 * overlap` of the end;
/// otherwise a raw character cut is used.
pub(crate) fn overlap_tail(text: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }
    if text.len() <= overlap {
        return text.trim_start().to_string();
    }

    let raw_start = floor_char_boundary(text, text.len() - overlap);
    let window_start = floor_char_boundary(text, text.len().saturating_sub(2 * overlap));

    if window_start < raw_start {
        let window = &text[window_start..raw_start];
        if let Some(rel) = window.rfind(['.', '!', '?']) {
            let after_punct = window_start + rel + 1;
            let tail = text[after_punct..].trim_start();
            if !tail.is_empty() {
                return tail.to_string();
            }
        }
    }

    text[raw_start..].trim_start().to_string()
}

/// Attribute chunks to pages by shared >3-character words, first match
/// winning ties.
pub(crate) fn attribute_pages(drafts: &mut [ChunkDraft], pages: &[PageText]) {
    if pages.is_empty() {
        return;
    }

    let page_words: Vec<(u32, HashSet<String>)> = pages
        .iter()
        .map(|p| (p.page_number, significant_words(&p.text)))
        .collect();

    for draft in drafts.iter_mut().filter(|d| d.page_number.is_none()) {
        let chunk_words = significant_words(&draft.content);
        let mut best: Option<u32> = None;
        let mut best_score = 0usize;
        for (page_number, words) in &page_words {
            let score = chunk_words.intersection(words).count();
            if score > best_score {
                best_score = score;
                best = Some(*page_number);
            }
        }
        draft.page_number = best;
    }
}

fn significant_words(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .filter(|w| w.len() > 3)
        .map(|w| w.to_lowercase())
        .collect()
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
