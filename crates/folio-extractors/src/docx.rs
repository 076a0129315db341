//! DOCX content extraction using docx-rs.
//!
//! Walks the document body into a list of styled blocks using a
//! style-mapping table (Heading 1-4, Title, Quote, Caption, Bibliography,
//! Code), from which plain text, a markdown rendering and structural
//! elements (headings, tables, footnotes) are derived.

use crate::Extractor;
use async_trait::async_trait;
use docx_rs::{DocumentChild, ParagraphChild, RunChild, TableChild, TableRowChild};
use folio_core::{
    ErrorKind, ExtractionResult, DocumentStructure, Footnote, Heading, MetadataValue,
    ProcessingError, ProcessingResult, ProcessingStage, Table,
};
use std::collections::HashMap;
use std::time::Instant;

/// Options controlling DOCX extraction.
#[derive(Debug, Clone)]
pub struct DocxOptions {
    /// Attempt to account for embedded images (best-effort).
    pub preserve_images: bool,
    /// Produce a markdown rendering in `structured_text`.
    pub convert_to_markdown: bool,
    /// Collect headings, tables and footnotes into `structure`.
    pub extract_structure: bool,
    /// Honor named paragraph styles; when false everything is body text.
    pub include_styles: bool,
    /// Collect footnote-style paragraphs.
    pub handle_footnotes: bool,
}

impl Default for DocxOptions {
    fn default() -> Self {
        Self {
            preserve_images: false,
            convert_to_markdown: true,
            extract_structure: true,
            include_styles: true,
            handle_footnotes: true,
        }
    }
}

/// Semantic role of a paragraph, mapped from its named style.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BlockKind {
    Heading(u8),
    Title,
    Quote,
    Caption,
    Bibliography,
    Code,
    FootnoteText,
    Body,
}

#[derive(Debug, Clone)]
struct TableData {
    rows: usize,
    columns: usize,
    content: String,
}

/// A body element in document order.
#[derive(Debug, Clone)]
enum Element {
    Paragraph { kind: BlockKind, text: String },
    Table(TableData),
}

/// Self-hosted DOCX extractor.
///
/// Wraps synchronous docx-rs parsing in `spawn_blocking` to avoid blocking
/// the async runtime.
#[derive(Debug, Clone, Default)]
pub struct DocxExtractor {
    options: DocxOptions,
}

impl DocxExtractor {
    pub fn new() -> Self {
        Self {
            options: DocxOptions::default(),
        }
    }

    pub fn with_options(options: DocxOptions) -> Self {
        Self { options }
    }

    /// Configure markdown conversion.
    pub fn with_markdown(mut self, convert: bool) -> Self {
        self.options.convert_to_markdown = convert;
        self
    }

    /// Configure structure collection.
    pub fn with_structure(mut self, extract: bool) -> Self {
        self.options.extract_structure = extract;
        self
    }

    fn extract_sync(
        content: Vec<u8>,
        file_name: String,
        options: DocxOptions,
    ) -> ProcessingResult<ExtractionResult> {
        if content.is_empty() {
            return Err(ProcessingError::new(
                ErrorKind::InvalidFileFormat,
                format!("'{}' is empty", file_name),
            ));
        }
        // DOCX is a ZIP container.
        if !content.starts_with(b"PK") {
            return Err(ProcessingError::new(
                ErrorKind::InvalidFileFormat,
                format!("'{}' is not a DOCX archive", file_name),
            ));
        }

        let docx = docx_rs::read_docx(&content).map_err(|e| {
            ProcessingError::corrupted_file(format!("failed to parse '{}': {}", file_name, e))
                .with_cause(format!("{:?}", e))
        })?;

        let mut elements: Vec<Element> = Vec::new();
        let mut skipped_children = 0usize;

        for child in docx.document.children {
            match child {
                DocumentChild::Paragraph(p) => {
                    let text = paragraph_text(&p);
                    if text.trim().is_empty() {
                        continue;
                    }
                    let kind = if options.include_styles {
                        p.property
                            .style
                            .as_ref()
                            .map(|s| style_kind(&s.val))
                            .unwrap_or(BlockKind::Body)
                    } else {
                        BlockKind::Body
                    };
                    elements.push(Element::Paragraph { kind, text });
                }
                DocumentChild::Table(t) => {
                    let table = table_data(&t);
                    if !table.content.trim().is_empty() {
                        elements.push(Element::Table(table));
                    }
                }
                _ => {
                    skipped_children += 1;
                }
            }
        }

        if options.preserve_images && skipped_children > 0 {
            // Embedded objects are not text-extractable here; noted and
            // carried on rather than failing the document.
            tracing::debug!(skipped = skipped_children, "non-text document children skipped");
        }

        let text = plain_text(&elements);
        let mut result = ExtractionResult::new(text);
        result.validate_min_content(&file_name)?;

        if options.convert_to_markdown {
            result.structured_text = Some(render_markdown(&elements));
        }
        if options.extract_structure {
            result.structure = Some(collect_structure(&elements, options.handle_footnotes));
        }

        let mut metadata: HashMap<String, MetadataValue> = HashMap::new();
        metadata.insert("extraction_method".into(), "docx-native".into());
        metadata.insert("original_size".into(), content.len().into());
        metadata.insert(
            "word_count".into(),
            result.text.split_whitespace().count().into(),
        );
        if options.preserve_images {
            metadata.insert("images_extracted".into(), 0usize.into());
        }
        result.metadata = metadata;
        Ok(result)
    }
}

#[async_trait]
impl Extractor for DocxExtractor {
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
                    ProcessingError::dependency(format!("docx extraction task failed: {}", e))
                        .at_stage(ProcessingStage::Extraction)
                })??;

        result.processing_time_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }

    fn supported_types(&self) -> &[&str] {
        &[
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "application/docx",
        ]
    }

    fn name(&self) -> &str {
        "docx-native"
    }
}

/// Map a named paragraph style to its semantic role.
fn style_kind(style_id: &str) -> BlockKind {
    let style = style_id.to_lowercase().replace(' ', "");
    if let Some(rest) = style.strip_prefix("heading") {
        let level = rest.chars().next().and_then(|c| c.to_digit(10)).unwrap_or(1);
        return BlockKind::Heading(level.clamp(1, 4) as u8);
    }
    if style.contains("title") {
        BlockKind::Title
    } else if style.contains("quote") {
        BlockKind::Quote
    } else if style.contains("caption") {
        BlockKind::Caption
    } else if style.contains("bibliography") {
        BlockKind::Bibliography
    } else if style.contains("code") {
        BlockKind::Code
    } else if style.contains("footnote") {
        BlockKind::FootnoteText
    } else {
        BlockKind::Body
    }
}

/// Extract text from a paragraph, including hyperlink runs.
fn paragraph_text(p: &docx_rs::Paragraph) -> String {
    let mut text = String::new();
    for child in &p.children {
        match child {
            ParagraphChild::Run(r) => append_run_text(&mut text, r),
            ParagraphChild::Hyperlink(h) => {
                for child in &h.children {
                    if let ParagraphChild::Run(r) = child {
                        append_run_text(&mut text, r);
                    }
                }
            }
            _ => {}
        }
    }
    text
}

fn append_run_text(text: &mut String, r: &docx_rs::Run) {
    for run_child in &r.children {
        match run_child {
            RunChild::Text(t) => text.push_str(&t.text),
            RunChild::Tab(_) => text.push('\t'),
            RunChild::Break(_) => text.push('\n'),
            _ => {}
        }
    }
}

/// Flatten a table into rows/columns plus a pipe-joined textual form.
fn table_data(t: &docx_rs::Table) -> TableData {
    let mut rows: Vec<Vec<String>> = Vec::new();
    for row in &t.rows {
        let TableChild::TableRow(r) = row;
        let mut cells: Vec<String> = Vec::new();
        for cell in &r.cells {
            let TableRowChild::TableCell(c) = cell;
            let mut cell_text = String::new();
            for child in &c.children {
                if let docx_rs::TableCellContent::Paragraph(p) = child {
                    let para = paragraph_text(p);
                    if !cell_text.is_empty() && !para.is_empty() {
                        cell_text.push(' ');
                    }
                    cell_text.push_str(&para);
                }
            }
            cells.push(cell_text.trim().to_string());
        }
        rows.push(cells);
    }

    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let content = rows
        .iter()
        .map(|row| row.join(" | "))
        .collect::<Vec<_>>()
        .join("\n");
    TableData {
        rows: rows.len(),
        columns,
        content,
    }
}

fn plain_text(elements: &[Element]) -> String {
    elements
        .iter()
        .map(|e| match e {
            Element::Paragraph { text, .. } => text.clone(),
            Element::Table(t) => t.content.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the block list as markdown. Citations are italicized, footnotes
/// become reference markers, and bibliography entries are set off from the
/// surrounding text.
fn render_markdown(elements: &[Element]) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut footnote_counter = 0usize;
    let mut bibliography_started = false;

    for element in elements {
        match element {
            Element::Paragraph { kind, text } => match kind {
                BlockKind::Heading(level) => {
                    out.push(format!("{} {}", "#".repeat(*level as usize), text));
                }
                BlockKind::Title => out.push(format!("# {}", text)),
                BlockKind::Quote => out.push(format!("> {}", text)),
                BlockKind::Caption => out.push(format!("*{}*", text)),
                BlockKind::Bibliography => {
                    if !bibliography_started {
                        out.push("---".to_string());
                        bibliography_started = true;
                    }
                    out.push(format!("*{}*", text));
                }
                BlockKind::Code => out.push(format!("```\n{}\n```", text)),
                BlockKind::FootnoteText => {
                    footnote_counter += 1;
                    out.push(format!("[^{}]: {}", footnote_counter, text));
                }
                BlockKind::Body => out.push(text.clone()),
            },
            Element::Table(t) => out.push(t.content.clone()),
        }
    }

    out.join("\n\n")
}

fn collect_structure(elements: &[Element], handle_footnotes: bool) -> DocumentStructure {
    let mut structure = DocumentStructure::default();
    let mut table_position = 0usize;
    let mut footnote_position = 0usize;

    for element in elements {
        match element {
            Element::Paragraph { kind, text } => match kind {
                BlockKind::Heading(level) => {
                    structure.headings.push(Heading::new(*level, text.clone()));
                }
                BlockKind::Title => structure.headings.push(Heading::new(1, text.clone())),
                BlockKind::FootnoteText if handle_footnotes => {
                    footnote_position += 1;
                    structure.footnotes.push(Footnote {
                        id: format!("fn{}", footnote_position),
                        text: text.clone(),
                        position: footnote_position - 1,
                    });
                }
                _ => {}
            },
            Element::Table(t) => {
                structure.tables.push(Table {
                    rows: t.rows,
                    columns: t.columns,
                    content: t.content.clone(),
                    position: table_position,
                });
                table_position += 1;
            }
        }
    }

    structure
}
