//! End-to-end pipeline tests with in-process extractors, a temporary
//! SQLite job store and a temporary object store.

use std::io::Cursor;
use std::sync::Arc;

use lopdf::{dictionary, Document, Object, Stream};

use folio_core::{
    ChunkStrategy, ErrorKind, ProcessingConfig, ProcessingOptions, Strategy,
};
use folio_jobs::{FsObjectStore, JobManager, JobStatus, JobStore};
use folio_pipeline::{ProcessRequest, UnifiedProcessor};

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

fn build_docx(docx: docx_rs::Docx) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    docx.build().pack(&mut cursor).unwrap();
    cursor.into_inner()
}

fn para(text: &str, style: Option<&str>) -> docx_rs::Paragraph {
    let mut p = docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text(text));
    if let Some(style) = style {
        p = p.style(style);
    }
    p
}

fn long_sentence(repeats: usize) -> String {
    "The lecture covered the assigned reading in considerable depth. "
        .repeat(repeats)
        .trim_end()
        .to_string()
}

fn processor_with_jobs() -> (UnifiedProcessor, Arc<JobManager>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let manager = Arc::new(JobManager::new(
        JobStore::in_memory().unwrap(),
        Arc::new(FsObjectStore::new(dir.path())),
    ));
    let processor = UnifiedProcessor::new(ProcessingConfig::default())
        .unwrap()
        .with_job_manager(manager.clone());
    (processor, manager, dir)
}

#[tokio::test]
async fn test_pdf_processed_self_hosted_into_chunks() {
    let page = long_sentence(8);
    let bytes = build_pdf(&[&page, &page]);
    let processor = UnifiedProcessor::new(ProcessingConfig::default()).unwrap();

    let result = processor
        .process(
            &bytes,
            "application/pdf",
            "lecture.pdf",
            ProcessRequest::for_user("alice").with_document_id("doc-7"),
        )
        .await;

    assert!(result.success, "error: {:?}", result.error);
    assert!(!result.is_async);

    let data = result.data.unwrap();
    assert!(data.text.contains("assigned reading"));
    assert_eq!(data.page_texts.as_ref().unwrap().len(), 2);

    let chunks = result.chunks.unwrap();
    assert!(!chunks.is_empty());
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
        assert!(chunk.id.starts_with("doc-7-chunk-"));
        assert!(!chunk.content.trim().is_empty());
        assert_eq!(chunk.character_count, chunk.content.len());
    }

    let decision = result.recommendation.unwrap();
    assert_eq!(decision.strategy, Strategy::SelfHosted);
    assert_eq!(decision.method, "pdf-native");
    assert_eq!(decision.estimated_cost, 0.0);
}

#[tokio::test]
async fn test_short_pdf_pages_become_page_chunks() {
    // Two pages, each comfortably above the minimum chunk size.
    let page = long_sentence(8);
    let bytes = build_pdf(&[&page, &page]);
    let processor = UnifiedProcessor::new(ProcessingConfig::default()).unwrap();

    let result = processor
        .process(
            &bytes,
            "application/pdf",
            "short.pdf",
            ProcessRequest::for_user("alice"),
        )
        .await;

    let chunks = result.chunks.unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].metadata.strategy, ChunkStrategy::PageBased);
    assert_eq!(chunks[0].page_number, Some(1));
    assert_eq!(chunks[1].page_number, Some(2));
}

#[tokio::test]
async fn test_docx_sections_follow_headings() {
    let intro = long_sentence(6);
    let body = long_sentence(7);
    let bytes = build_docx(
        docx_rs::Docx::new()
            .add_paragraph(para("Introduction", Some("Heading1")))
            .add_paragraph(para(&intro, None))
            .add_paragraph(para("Methods", Some("Heading1")))
            .add_paragraph(para(&body, None)),
    );
    let processor = UnifiedProcessor::new(ProcessingConfig::default()).unwrap();

    let result = processor
        .process(
            &bytes,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "paper.docx",
            ProcessRequest::for_user("alice"),
        )
        .await;

    assert!(result.success, "error: {:?}", result.error);
    let chunks = result.chunks.unwrap();
    assert!(chunks.len() >= 2);

    let sections: Vec<_> = chunks
        .iter()
        .filter_map(|c| c.metadata.section.as_deref())
        .collect();
    assert!(sections.contains(&"Introduction"));
    assert!(sections.contains(&"Methods"));
    for chunk in &chunks {
        assert_eq!(chunk.metadata.strategy, ChunkStrategy::StructureBased);
    }
}

#[tokio::test]
async fn test_forced_async_queues_job() {
    let (processor, _manager, _dir) = processor_with_jobs();
    let bytes = build_pdf(&[&long_sentence(8)]);

    let options = ProcessingOptions {
        force_async: true,
        ..ProcessingOptions::default()
    };
    let result = processor
        .process(
            &bytes,
            "application/pdf",
            "deferred.pdf",
            ProcessRequest::for_user("alice").with_options(options),
        )
        .await;

    assert!(result.success);
    assert!(result.is_async);
    assert!(result.data.is_none());
    let job_id = result.job_id.unwrap();

    let job = processor.job_status(&job_id, "alice").unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.file_name, "deferred.pdf");

    // Other users cannot see the job.
    let err = processor.job_status(&job_id, "mallory").unwrap_err();
    assert_eq!(err.kind, ErrorKind::JobNotFound);
}

#[tokio::test]
async fn test_cancel_queued_then_locked_after_start() {
    let (processor, manager, _dir) = processor_with_jobs();
    let bytes = build_pdf(&[&long_sentence(8)]);
    let options = ProcessingOptions {
        force_async: true,
        ..ProcessingOptions::default()
    };

    let first = processor
        .process(
            &bytes,
            "application/pdf",
            "one.pdf",
            ProcessRequest::for_user("alice").with_options(options.clone()),
        )
        .await;
    let first_id = first.job_id.unwrap();

    processor.cancel_job(&first_id, "alice").await.unwrap();
    assert_eq!(
        processor.job_status(&first_id, "alice").unwrap().status,
        JobStatus::Cancelled
    );

    // Once the executor picks a job up, cancellation is no longer legal.
    let second = processor
        .process(
            &bytes,
            "application/pdf",
            "two.pdf",
            ProcessRequest::for_user("alice").with_options(options),
        )
        .await;
    let second_id = second.job_id.unwrap();
    manager.start_processing(&second_id).unwrap();

    let err = processor.cancel_job(&second_id, "alice").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidJobState);
}

#[tokio::test]
async fn test_corrupted_pdf_fails_without_fallback_target() {
    let processor = UnifiedProcessor::new(ProcessingConfig::default()).unwrap();
    let result = processor
        .process(
            b"%PDF-1.4 this is not really a pdf body",
            "application/pdf",
            "broken.pdf",
            ProcessRequest::for_user("alice"),
        )
        .await;

    assert!(!result.success);
    let error = result.error.unwrap();
    assert_eq!(error.kind, ErrorKind::CorruptedFile);
}

#[tokio::test]
async fn test_recommendation_previews_async_for_huge_pdf() {
    let processor = UnifiedProcessor::new(ProcessingConfig::default()).unwrap();
    let decision = processor
        .recommendation(60 * 1024 * 1024, "application/pdf", "atlas.pdf")
        .unwrap();
    assert_eq!(decision.strategy, Strategy::AsyncBackground);
}
