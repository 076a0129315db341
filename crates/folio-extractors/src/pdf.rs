//! PDF content extraction using lopdf.
//!
//! Extracts text page by page. With formatting preservation enabled, the
//! page content stream is walked into positioned text fragments which are
//! reassembled into lines top-to-bottom, left-to-right; otherwise the
//! faster plain extraction path is used and whitespace is collapsed.
//! Per-page failures are replaced with a placeholder so one bad page never
//! sinks the document.

use crate::Extractor;
use async_trait::async_trait;
use folio_core::{
    ErrorKind, ExtractionResult, MetadataValue, PageText, ProcessingError, ProcessingResult,
    ProcessingStage,
};
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;
use std::time::Instant;

/// Vertical distance within which fragments belong to the same line.
const LINE_Y_TOLERANCE: f64 = 5.0;

/// Options controlling PDF extraction.
#[derive(Debug, Clone)]
pub struct PdfOptions {
    /// Refuse documents with more pages than this.
    pub max_pages: usize,
    /// Reconstruct line layout from positioned fragments.
    pub preserve_formatting: bool,
    /// Read title/author/dates from the Info dictionary.
    pub extract_metadata: bool,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            max_pages: 500,
            preserve_formatting: true,
            extract_metadata: true,
        }
    }
}

/// Self-hosted PDF extractor.
///
/// Wraps synchronous lopdf parsing in `spawn_blocking` to keep the async
/// runtime responsive.
#[derive(Debug, Clone, Default)]
pub struct PdfExtractor {
    options: PdfOptions,
}

impl PdfExtractor {
    pub fn new() -> Self {
        Self {
            options: PdfOptions::default(),
        }
    }

    pub fn with_options(options: PdfOptions) -> Self {
        Self { options }
    }

    /// Configure the page ceiling.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.options.max_pages = max_pages;
        self
    }

    /// Configure layout reconstruction.
    pub fn with_preserve_formatting(mut self, preserve: bool) -> Self {
        self.options.preserve_formatting = preserve;
        self
    }

    fn extract_sync(
        content: Vec<u8>,
        file_name: String,
        options: PdfOptions,
    ) -> ProcessingResult<ExtractionResult> {
        if !content.starts_with(b"%PDF-") {
            return Err(ProcessingError::new(
                ErrorKind::InvalidFileFormat,
                format!("'{}' does not have a PDF header", file_name),
            ));
        }

        let doc = Document::load_mem(&content).map_err(|e| {
            ProcessingError::corrupted_file(format!("failed to open '{}': {}", file_name, e))
                .with_cause(e)
        })?;

        if doc.is_encrypted() {
            return Err(ProcessingError::new(
                ErrorKind::PasswordProtected,
                format!("'{}' is encrypted", file_name),
            ));
        }

        let pages = doc.get_pages();
        if pages.len() > options.max_pages {
            // Recoverable: the external service or the background path can
            // still handle the document.
            return Err(ProcessingError::new(
                ErrorKind::MemoryLimitExceeded,
                format!(
                    "'{}' has {} pages, over the {} page limit",
                    file_name,
                    pages.len(),
                    options.max_pages
                ),
            )
            .recoverable(true));
        }

        let mut page_texts: Vec<PageText> = Vec::with_capacity(pages.len());
        for (&page_number, &page_id) in &pages {
            let text = if options.preserve_formatting {
                extract_page_formatted(&doc, page_id)
            } else {
                doc.extract_text(&[page_number])
                    .map(|t| collapse_whitespace(&t))
                    .map_err(|e| e.to_string())
            };
            let text = match text {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(page = page_number, error = %e, "page extraction failed");
                    format!("[Page {}: extraction failed]", page_number)
                }
            };
            page_texts.push(PageText::new(page_number, text));
        }

        let full_text = page_texts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut result = ExtractionResult::new(full_text);
        result.validate_min_content(&file_name)?;

        let mut metadata: HashMap<String, MetadataValue> = HashMap::new();
        metadata.insert("extraction_method".into(), "pdf-native".into());
        metadata.insert("page_count".into(), pages.len().into());
        if options.extract_metadata {
            // Best-effort; a malformed Info dictionary never blocks success.
            for (key, value) in read_info_dictionary(&doc) {
                metadata.insert(key, MetadataValue::String(value));
            }
        }
        result.metadata = metadata;
        result.page_texts = Some(page_texts);
        Ok(result)
    }
}

#[async_trait]
impl Extractor for PdfExtractor {
    async fn extract(
        &self,
        content: &[u8],
        file_name: &str,
    ) -> ProcessingResult<ExtractionResult> {
        let started = Instant::now();
        let content = content.to_vec();
        let file_name_owned = file_name.to_string();
        let options = self.options.clone();

        let mut result =
            tokio::task::spawn_blocking(move || Self::extract_sync(content, file_name_owned, options))
                .await
                .map_err(|e| {
                    ProcessingError::dependency(format!("pdf extraction task failed: {}", e))
                        .at_stage(ProcessingStage::Extraction)
                })??;

        result.processing_time_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }

    fn supported_types(&self) -> &[&str] {
        &["application/pdf"]
    }

    fn name(&self) -> &str {
        "pdf-native"
    }
}

/// A positioned piece of text from a page content stream.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextFragment {
    pub text: String,
    pub x: f64,
    pub y: f64,
}

fn extract_page_formatted(doc: &Document, page_id: ObjectId) -> Result<String, String> {
    let data = doc
        .get_page_content(page_id)
        .map_err(|e| format!("content stream unavailable: {}", e))?;
    let content = Content::decode(&data).map_err(|e| format!("content decode failed: {}", e))?;
    let fragments = collect_fragments(&content);
    Ok(assemble_lines(fragments))
}

/// Walk content-stream operations, tracking the text cursor well enough to
/// position each shown string. Glyph widths are unavailable at this level,
/// so horizontal advance after a show is approximated from the font size.
fn collect_fragments(content: &Content) -> Vec<TextFragment> {
    let mut fragments = Vec::new();
    let mut x = 0.0_f64;
    let mut y = 0.0_f64;
    let mut font_size = 12.0_f64;
    let mut leading = 12.0_f64;

    for op in &content.operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "BT" => {
                x = 0.0;
                y = 0.0;
            }
            "Tf" => {
                if let Some(size) = operands.get(1).and_then(operand_number) {
                    font_size = size;
                    leading = leading.max(size);
                }
            }
            "TL" => {
                if let Some(l) = operands.first().and_then(operand_number) {
                    leading = l;
                }
            }
            "Td" | "TD" => {
                if let (Some(tx), Some(ty)) = (
                    operands.first().and_then(operand_number),
                    operands.get(1).and_then(operand_number),
                ) {
                    x += tx;
                    y += ty;
                    if op.operator == "TD" {
                        leading = -ty;
                    }
                }
            }
            "Tm" => {
                if let (Some(e), Some(f)) = (
                    operands.get(4).and_then(operand_number),
                    operands.get(5).and_then(operand_number),
                ) {
                    x = e;
                    y = f;
                }
            }
            "T*" => {
                y -= leading;
            }
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    push_fragment(&mut fragments, bytes, &mut x, y, font_size);
                }
            }
            "'" | "\"" => {
                y -= leading;
                if let Some(Object::String(bytes, _)) = operands.last() {
                    push_fragment(&mut fragments, bytes, &mut x, y, font_size);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    let mut text = String::new();
                    for item in items {
                        if let Object::String(bytes, _) = item {
                            text.push_str(&decode_pdf_string(bytes));
                        }
                    }
                    if !text.is_empty() {
                        let advance = text.chars().count() as f64 * font_size * 0.5;
                        fragments.push(TextFragment { text, x, y });
                        x += advance;
                    }
                }
            }
            _ => {}
        }
    }

    fragments
}

fn push_fragment(fragments: &mut Vec<TextFragment>, bytes: &[u8], x: &mut f64, y: f64, font_size: f64) {
    let text = decode_pdf_string(bytes);
    if text.is_empty() {
        return;
    }
    let advance = text.chars().count() as f64 * font_size * 0.5;
    fragments.push(TextFragment {
        text,
        x: *x,
        y,
    });
    *x += advance;
}

fn operand_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// Decode a PDF string object. UTF-16BE when the BOM is present, otherwise
/// treated as single-byte text.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&utf16)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Reconstruct lines from positioned fragments: top-to-bottom, then
/// left-to-right, grouping fragments within the vertical tolerance.
pub(crate) fn assemble_lines(mut fragments: Vec<TextFragment>) -> String {
    fragments.sort_by(|a, b| {
        b.y.partial_cmp(&a.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_y = f64::INFINITY;

    for frag in fragments {
        if current_y.is_infinite() || (current_y - frag.y).abs() > LINE_Y_TOLERANCE {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current_y = frag.y;
        }
        if !current.is_empty() && needs_separator(&current, &frag.text) {
            current.push(' ');
        }
        current.push_str(&frag.text);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    collapse_blank_runs(&lines.join("\n"))
}

/// Whether a space belongs between the accumulated line and the next
/// fragment.
fn needs_separator(accumulated: &str, next: &str) -> bool {
    let tail_terminal = accumulated
        .chars()
        .last()
        .map(|c| matches!(c, '.' | '!' | '?'))
        .unwrap_or(false);
    let head_closing = next
        .chars()
        .next()
        .map(|c| matches!(c, ')' | ']' | '}' | ',' | ';' | ':' | '.' | '!' | '?' | '\'' | '"'))
        .unwrap_or(false);
    !tail_terminal && !head_closing
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse runs of 3+ newlines down to 2.
fn collapse_blank_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0usize;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(c);
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }
    out
}

/// Read title/author/dates from the Info dictionary, best-effort.
fn read_info_dictionary(doc: &Document) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    let info = match doc
        .trailer
        .get(b"Info")
        .and_then(Object::as_reference)
        .and_then(|id| doc.get_object(id))
        .and_then(Object::as_dict)
    {
        Ok(dict) => dict,
        Err(_) => return entries,
    };

    for (key, label) in [
        (&b"Title"[..], "title"),
        (&b"Author"[..], "author"),
        (&b"CreationDate"[..], "creation_date"),
        (&b"ModDate"[..], "modification_date"),
    ] {
        if let Ok(Object::String(bytes, _)) = info.get(key) {
            let value = decode_pdf_string(bytes);
            if !value.trim().is_empty() {
                entries.push((label.to_string(), value));
            }
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    fn frag(text: &str, x: f64, y: f64) -> TextFragment {
        TextFragment {
            text: text.to_string(),
            x,
            y,
        }
    }

    /// Build a minimal single-font PDF with one page per entry.
    fn build_pdf(page_texts: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.4");
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut page_ids = Vec::new();
        for text in page_texts {
            let content = format!(
                "BT /F1 12 Tf 100 700 Td ({}) Tj ET",
                text.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)")
            );
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            });
            page_ids.push(page_id);
        }

        let kids: Vec<Object> = page_ids.iter().map(|&id| id.into()).collect();
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_texts.len() as i64),
        });
        for page_id in &page_ids {
            if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(*page_id) {
                dict.set("Parent", pages_id);
            }
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_same_line_fragments_joined_with_space() {
        let text = assemble_lines(vec![frag("Hello", 0.0, 100.0), frag("World", 50.0, 100.0)]);
        assert_eq!(text, "Hello World");
    }

    #[test]
    fn test_fragments_within_tolerance_share_a_line() {
        let text = assemble_lines(vec![frag("Hello", 0.0, 100.0), frag("World", 50.0, 97.0)]);
        assert_eq!(text, "Hello World");
    }

    #[test]
    fn test_lines_ordered_top_to_bottom() {
        let text = assemble_lines(vec![
            frag("bottom", 0.0, 50.0),
            frag("top", 0.0, 700.0),
            frag("middle", 0.0, 400.0),
        ]);
        assert_eq!(text, "top\nmiddle\nbottom");
    }

    #[test]
    fn test_no_space_after_terminal_punctuation() {
        let text = assemble_lines(vec![frag("End.", 0.0, 100.0), frag("Next", 30.0, 100.0)]);
        assert_eq!(text, "End.Next");
    }

    #[test]
    fn test_no_space_before_closing_punctuation() {
        let text = assemble_lines(vec![frag("word", 0.0, 100.0), frag(", then", 25.0, 100.0)]);
        assert_eq!(text, "word, then");
    }

    #[test]
    fn test_collapse_blank_runs() {
        assert_eq!(collapse_blank_runs("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_runs("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_decode_utf16_string() {
        let mut bytes = vec![0xFE, 0xFF];
        for c in "Hi".encode_utf16() {
            bytes.extend_from_slice(&c.to_be_bytes());
        }
        assert_eq!(decode_pdf_string(&bytes), "Hi");
    }

    #[tokio::test]
    async fn test_extract_single_page() {
        let pdf = build_pdf(&["The quick brown fox jumps over the lazy dog"]);
        let extractor = PdfExtractor::new();
        let result = extractor.extract(&pdf, "test.pdf").await.unwrap();
        assert!(result.text.contains("quick brown fox"));
        let pages = result.page_texts.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_number, 1);
    }

    #[tokio::test]
    async fn test_extract_multipage_preserves_page_order() {
        let pdf = build_pdf(&[
            "Content of the first page here",
            "Content of the second page here",
            "Content of the third page here",
        ]);
        let extractor = PdfExtractor::new();
        let result = extractor.extract(&pdf, "multi.pdf").await.unwrap();
        let pages = result.page_texts.unwrap();
        assert_eq!(pages.len(), 3);
        let numbers: Vec<u32> = pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(pages[1].text.contains("second"));
    }

    #[tokio::test]
    async fn test_plain_path_collapses_whitespace() {
        let pdf = build_pdf(&["spaced    out    words"]);
        let extractor = PdfExtractor::new().with_preserve_formatting(false);
        let result = extractor.extract(&pdf, "test.pdf").await.unwrap();
        assert!(!result.text.contains("  "));
    }

    #[tokio::test]
    async fn test_page_limit_enforced() {
        let pdf = build_pdf(&["page one text here", "page two text here", "page three text"]);
        let extractor = PdfExtractor::new().with_max_pages(2);
        let err = extractor.extract(&pdf, "big.pdf").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MemoryLimitExceeded);
        assert!(err.recoverable);
    }

    #[tokio::test]
    async fn test_non_pdf_bytes_rejected() {
        let extractor = PdfExtractor::new();
        let err = extractor.extract(b"not a pdf at all", "fake.pdf").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidFileFormat);
    }

    #[tokio::test]
    async fn test_truncated_pdf_is_corrupted() {
        let extractor = PdfExtractor::new();
        let err = extractor
            .extract(b"%PDF-1.4 garbage that is not a document", "broken.pdf")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::CorruptedFile);
    }

    #[tokio::test]
    async fn test_minimum_content_floor() {
        let pdf = build_pdf(&["hi"]);
        let extractor = PdfExtractor::new();
        let err = extractor.extract(&pdf, "empty.pdf").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoContentExtracted);
    }

    #[test]
    fn test_extractor_metadata_surface() {
        let extractor = PdfExtractor::new();
        assert_eq!(extractor.name(), "pdf-native");
        assert!(extractor.supports("application/pdf"));
        assert!(!extractor.supports("application/docx"));
    }
}
