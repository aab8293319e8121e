// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 路由模块
//!
//! 本模块包含所有 API 路由定义，将路由从 main.rs 中分离出来以提高可维护性。

pub(crate) mod health;
pub(crate) mod report;

use axum::{
    Json, Router, extract::DefaultBodyLimit, http::HeaderValue, routing::get, routing::post,
};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::AppState;

/// Report similarity API OpenAPI 文档
#[derive(OpenApi)]
#[openapi(
    info(
        title = "reportsim API",
        version = "0.1.0",
        description = "Report ingestion and chunk-level similarity search",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    paths(
        health::health_check,
        health::metrics_endpoint,
        report::upload_report_handler,
        report::find_similarity_handler,
    ),
    components(
        schemas(
            health::HealthResponse,
            crate::domain::UploadResponse,
            crate::domain::SimilarityResponse,
            crate::domain::ChunkSimilarityResult,
            crate::domain::ChunkMatch,
            crate::domain::ReportScore,
        )
    ),
    tags(
        (name = "health", description = "健康检查"),
        (name = "reports", description = "报告入库与相似度查询")
    )
)]
pub(crate) struct ApiDoc;

pub(crate) fn create_openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Limits and cross-origin policy applied to every route.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub timeout: Duration,
    pub max_body_bytes: usize,
    /// `"*"` accepts any origin; an empty list installs no CORS layer.
    pub cors_origins: Vec<String>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            max_body_bytes: 50 * 1024 * 1024,
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// 构建 CORS 层
pub(crate) fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    if origins.iter().any(|o| o == "*") {
        // 回显请求 Origin，并允许携带凭据
        return Some(CorsLayer::very_permissive());
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring CORS origin {:?}: {}", origin, e);
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// Create the service router
///
/// Note: This function is exposed to main.rs and to integration tests
pub fn create_router(app_state: AppState, options: RouterOptions) -> Router {
    let openapi = create_openapi();

    let router = Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics_endpoint))
        .route(
            "/api-docs",
            get(move || {
                let doc = openapi.clone();
                async move { Json(doc) }
            }),
        )
        .route("/upload_report/", post(report::upload_report_handler))
        .route(
            "/find_similarity_with_upload/",
            post(report::find_similarity_handler),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(options.max_body_bytes))
        .layer(TimeoutLayer::new(options.timeout));

    let router = match cors_layer(&options.cors_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
