// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod index;
pub mod metrics;
pub mod routes;
pub mod service;
pub mod store;
pub mod text;
pub mod utils;

use std::sync::Arc;

pub use config::{AppConfig, EngineType, IngestMode, ModelConfig, StoreBackend};
pub use domain::{ChunkMatch, ChunkSimilarityResult, IngestSummary, ReportScore, SimilarityReport};
pub use engine::{AnyEngine, CandleEngine, EmbeddingEngine, HashingEngine};
pub use error::{AppError, ErrorKind, Stage};
pub use index::{IndexCache, IndexHandle, IndexParams, SimilarityIndex};
pub use metrics::PipelineMetrics;
pub use routes::{RouterOptions, create_router};
pub use service::ReportService;
pub use store::{EmbeddingStore, FileStore, MemoryStore, Snapshot, build_store};

/// Shared state handed to every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ReportService>,
    pub metrics: Arc<PipelineMetrics>,
}
