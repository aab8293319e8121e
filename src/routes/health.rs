// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! Health check related routes
//!
//! Provides API endpoints for health checks and metrics collection.

use crate::AppState;
use crate::error::AppError;
use axum::{
    Json,
    extract::State,
    http::header,
    response::IntoResponse,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub engine: String,
    pub dimension: usize,
    pub store_backend: String,
    pub stored_chunks: usize,
}

/// Basic health check handler
///
/// Reports the loaded engine and how many chunk embeddings are stored
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is running normally", body = HealthResponse),
        (status = 500, description = "Embedding store unavailable")
    ),
    operation_id = "health_check"
)]
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let service = &state.service;
    let stored_chunks = service.store().len().await?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        engine: service.engine().name().to_string(),
        dimension: service.engine().dimension(),
        store_backend: service.store().backend().to_string(),
        stored_chunks,
    }))
}

/// Prometheus metrics endpoint
///
/// Returns metrics data in Prometheus format
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "health",
    responses(
        (status = 200, description = "Successfully returned Prometheus metrics", body = String)
    ),
    operation_id = "metrics"
)]
pub async fn metrics_endpoint(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state.metrics.encode()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
