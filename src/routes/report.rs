// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 报告上传与相似度查询路由

use crate::AppState;
use crate::domain::{
    SimilarityParams, SimilarityResponse, UploadParams, UploadResponse,
};
use crate::error::AppError;
use axum::{
    Json,
    extract::{Multipart, Query, State},
};

/// Uploaded file taken from the `file` form field.
struct UploadedFile {
    filename: String,
    content: Vec<u8>,
}

async fn read_file_field(multipart: &mut Multipart) -> Result<UploadedFile, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| AppError::InvalidInput("uploaded file has no name".to_string()))?;
        let content = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("failed to read upload: {}", e)))?;

        return Ok(UploadedFile {
            filename,
            content: content.to_vec(),
        });
    }

    Err(AppError::InvalidInput(
        "multipart field 'file' is required".to_string(),
    ))
}

/// Upload a report and store its chunk embeddings
#[utoipa::path(
    post,
    path = "/upload_report/",
    tag = "reports",
    params(UploadParams),
    request_body(content_type = "multipart/form-data", description = "Form field `file`: .pdf, .docx or .txt"),
    responses(
        (status = 200, description = "Report stored", body = UploadResponse),
        (status = 400, description = "Empty or unsupported document"),
        (status = 409, description = "Report id already stored (reject mode)"),
        (status = 500, description = "Extraction, embedding or store failure")
    ),
    operation_id = "upload_report"
)]
pub async fn upload_report_handler(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let upload = read_file_field(&mut multipart).await?;

    let summary = state
        .service
        .ingest_document(&upload.filename, &upload.content, params.report_id)
        .await?;

    Ok(Json(UploadResponse {
        message: format!(
            "Report '{}' processed and embeddings stored successfully.",
            upload.filename
        ),
        report_id: summary.report_id,
        chunks_stored: summary.chunks_stored,
    }))
}

/// Rank stored reports by similarity to an uploaded document
#[utoipa::path(
    post,
    path = "/find_similarity_with_upload/",
    tag = "reports",
    params(SimilarityParams),
    request_body(content_type = "multipart/form-data", description = "Form field `file`: .pdf, .docx or .txt"),
    responses(
        (status = 200, description = "Similarity analysis", body = SimilarityResponse),
        (status = 400, description = "Empty or unsupported document, or invalid top_k"),
        (status = 404, description = "No reports stored yet"),
        (status = 500, description = "Extraction, embedding, store or index failure")
    ),
    operation_id = "find_similarity_with_upload"
)]
pub async fn find_similarity_handler(
    State(state): State<AppState>,
    Query(params): Query<SimilarityParams>,
    mut multipart: Multipart,
) -> Result<Json<SimilarityResponse>, AppError> {
    let upload = read_file_field(&mut multipart).await?;

    let report = state
        .service
        .find_similar_document(&upload.filename, &upload.content, params.top_k)
        .await?;

    Ok(Json(SimilarityResponse {
        message: format!("Similarity analysis for '{}' completed.", upload.filename),
        chunk_level_similarity: report.chunk_level_similarity,
        report_level_similarity: report.report_level_similarity,
    }))
}
