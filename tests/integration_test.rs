// Copyright (c) 2025 Kirky.X
//
// Licensed under MIT License
// See LICENSE file in the project root for full license information

//! 集成测试
//!
//! 使用确定性的 HashingEngine 跑完整的入库与查询流水线。

use std::sync::Arc;
use tempfile::TempDir;

use reportsim::{AppError, ErrorKind, FileStore, IngestMode, Stage};

mod common;
use common::{
    ALPHA_TEXT, BETA_TEXT, QUERY_TEXT, memory_service, numbered_words, service_with_store,
};

#[tokio::test]
async fn test_long_report_is_stored_as_two_chunks() -> Result<(), Box<dyn std::error::Error>> {
    let service = memory_service();

    let summary = service.ingest_text("r1", &numbered_words(1000)).await?;
    assert_eq!(summary.chunks_stored, 2);

    let snapshot = service.store().scan_all().await?;
    let refs: Vec<(&str, usize)> = snapshot
        .metadata
        .iter()
        .map(|m| (m.report_id.as_str(), m.chunk_index))
        .collect();
    assert_eq!(refs, vec![("r1", 0), ("r1", 1)]);

    println!("[PASS] 1000-word report stored as chunks 0 and 1");
    Ok(())
}

#[tokio::test]
async fn test_related_report_ranks_first() -> Result<(), Box<dyn std::error::Error>> {
    let service = memory_service();
    service.ingest_text("alpha", ALPHA_TEXT).await?;
    service.ingest_text("beta", BETA_TEXT).await?;

    let report = service.find_similar_text(QUERY_TEXT, Some(5)).await?;

    assert_eq!(report.indexed_chunks, 2);
    assert_eq!(report.chunk_level_similarity.len(), 1);
    assert_eq!(report.chunk_level_similarity[0].query_chunk, QUERY_TEXT);

    let ranking: Vec<&str> = report
        .report_level_similarity
        .iter()
        .map(|s| s.report_id.as_str())
        .collect();
    assert_eq!(ranking, vec!["alpha", "beta"]);
    assert!(report.report_level_similarity[0].score > report.report_level_similarity[1].score);

    let matches = &report.chunk_level_similarity[0].matches;
    assert!(matches.windows(2).all(|w| w[0].distance <= w[1].distance));

    println!("[PASS] alpha ranked above beta");
    Ok(())
}

#[tokio::test]
async fn test_query_before_any_ingest_is_no_data() {
    let service = memory_service();

    let err = service
        .find_similar_text(QUERY_TEXT, None)
        .await
        .expect_err("empty store must fail");

    assert_eq!(err.kind(), ErrorKind::State);
    assert!(matches!(err.root(), AppError::NoData(_)));
}

#[tokio::test]
async fn test_additive_mode_accumulates_duplicates() -> Result<(), Box<dyn std::error::Error>> {
    let service = memory_service();
    service.ingest_text("alpha", ALPHA_TEXT).await?;
    service.ingest_text("alpha", ALPHA_TEXT).await?;

    let snapshot = service.store().scan_all().await?;
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.metadata.iter().all(|m| m.chunk_index == 0));

    // both copies match, so the report collects two contributions
    let report = service.find_similar_text(QUERY_TEXT, Some(5)).await?;
    assert_eq!(report.report_level_similarity.len(), 1);
    assert!(report.report_level_similarity[0].score > 1.0);
    Ok(())
}

#[tokio::test]
async fn test_reject_mode_refuses_known_report() -> Result<(), Box<dyn std::error::Error>> {
    let service = memory_service().with_ingest_mode(IngestMode::Reject);
    service.ingest_text("alpha", ALPHA_TEXT).await?;

    let err = service
        .ingest_text("alpha", BETA_TEXT)
        .await
        .expect_err("second ingest must be refused");
    assert_eq!(err.kind(), ErrorKind::Input);
    assert_eq!(err.stage(), Some(Stage::Store));
    assert_eq!(service.store().len().await?, 1);

    service.ingest_text("beta", BETA_TEXT).await?;
    assert_eq!(service.store().len().await?, 2);
    Ok(())
}

#[tokio::test]
async fn test_cached_index_sees_new_ingest() -> Result<(), Box<dyn std::error::Error>> {
    let service = memory_service().with_index_cache(true);
    service.ingest_text("alpha", ALPHA_TEXT).await?;

    let first = service.find_similar_text(QUERY_TEXT, Some(5)).await?;
    assert_eq!(first.indexed_chunks, 1);

    // served from cache, nothing changed
    let again = service.find_similar_text(QUERY_TEXT, Some(5)).await?;
    assert_eq!(again.indexed_chunks, 1);

    service.ingest_text("beta", BETA_TEXT).await?;
    let after = service.find_similar_text(QUERY_TEXT, Some(5)).await?;
    assert_eq!(after.indexed_chunks, 2);
    assert!(
        after
            .report_level_similarity
            .iter()
            .any(|s| s.report_id == "beta")
    );
    Ok(())
}

#[tokio::test]
async fn test_file_store_survives_restart() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("embeddings.jsonl");

    {
        let service = service_with_store(Arc::new(FileStore::open(&path).await?));
        service.ingest_text("alpha", ALPHA_TEXT).await?;
        service.ingest_text("beta", BETA_TEXT).await?;
    }

    let service = service_with_store(Arc::new(FileStore::open(&path).await?));
    let report = service.find_similar_text(QUERY_TEXT, None).await?;
    assert_eq!(report.report_level_similarity[0].report_id, "alpha");
    assert_eq!(report.indexed_chunks, 2);

    println!("[PASS] file store reopened with {} chunks", report.indexed_chunks);
    Ok(())
}

#[tokio::test]
async fn test_document_ingest_defaults_report_id_to_filename()
-> Result<(), Box<dyn std::error::Error>> {
    let service = memory_service();

    let summary = service
        .ingest_document("q3-report.TXT", ALPHA_TEXT.as_bytes(), None)
        .await?;
    assert_eq!(summary.report_id, "q3-report.TXT");

    let summary = service
        .ingest_document("notes.txt", BETA_TEXT.as_bytes(), Some("weather".to_string()))
        .await?;
    assert_eq!(summary.report_id, "weather");

    let report = service
        .find_similar_document("query.txt", QUERY_TEXT.as_bytes(), None)
        .await?;
    assert_eq!(report.report_level_similarity[0].report_id, "q3-report.TXT");
    Ok(())
}

#[tokio::test]
async fn test_unsupported_document_is_input_error() {
    let service = memory_service();

    let err = service
        .ingest_document("sheet.xlsx", b"irrelevant", None)
        .await
        .expect_err("xlsx is not supported");

    assert_eq!(err.kind(), ErrorKind::Input);
    assert_eq!(err.stage(), Some(Stage::Extract));
    assert!(matches!(err.root(), AppError::UnsupportedFileType(_)));
}

#[tokio::test]
async fn test_multi_chunk_query_reports_every_chunk() -> Result<(), Box<dyn std::error::Error>> {
    let service = memory_service().with_chunker(reportsim::text::TextChunker::new(3)?);
    service.ingest_text("alpha", ALPHA_TEXT).await?;
    service.ingest_text("beta", BETA_TEXT).await?;

    let report = service
        .find_similar_text("quarterly revenue grew heavy rain today", Some(2))
        .await?;

    assert_eq!(report.chunk_level_similarity.len(), 2);
    assert!(
        report
            .chunk_level_similarity
            .iter()
            .all(|c| c.matches.len() <= 2)
    );
    Ok(())
}
