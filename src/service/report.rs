// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 报告入库与相似度查询流水线
//!
//! Ingest: extract → chunk → embed → append → invalidate cached index.
//! Query: extract → chunk → embed → scan → build → search → aggregate.
//! Each run is independent; a failure aborts the whole run without rollback.

use crate::config::{AppConfig, IngestMode};
use crate::domain::{ChunkMatch, ChunkSimilarityResult, IngestSummary, SimilarityReport};
use crate::engine::EmbeddingEngine;
use crate::error::{AppError, Stage};
use crate::index::{IndexCache, IndexHandle, IndexParams, SimilarityIndex};
use crate::metrics::PipelineMetrics;
use crate::service::aggregator::aggregate;
use crate::store::EmbeddingStore;
use crate::text::{ReportReader, TextChunker, TextExtractor};
use crate::utils::{DEFAULT_TOP_K, MAX_TOP_K, TEXT_PREVIEW_CHARS};
use ndarray::Array2;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct ReportService {
    extractor: Arc<dyn TextExtractor>,
    engine: Arc<dyn EmbeddingEngine>,
    store: Arc<dyn EmbeddingStore>,
    chunker: TextChunker,
    index_params: IndexParams,
    index_cache: Option<IndexCache>,
    ingest_mode: IngestMode,
    default_top_k: usize,
    max_top_k: usize,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl ReportService {
    pub fn new(engine: Arc<dyn EmbeddingEngine>, store: Arc<dyn EmbeddingStore>) -> Self {
        Self {
            extractor: Arc::new(ReportReader::new()),
            engine,
            store,
            chunker: TextChunker::default(),
            index_params: IndexParams::default(),
            index_cache: None,
            ingest_mode: IngestMode::Additive,
            default_top_k: DEFAULT_TOP_K,
            max_top_k: MAX_TOP_K,
            metrics: None,
        }
    }

    /// Wire a service from loaded configuration.
    pub fn from_config(
        config: &AppConfig,
        engine: Arc<dyn EmbeddingEngine>,
        store: Arc<dyn EmbeddingStore>,
    ) -> Result<Self, AppError> {
        let pipeline = &config.pipeline;
        Ok(Self::new(engine, store)
            .with_chunker(TextChunker::new(pipeline.max_chunk_size)?)
            .with_index_params(IndexParams::from(&config.index))
            .with_index_cache(config.index.cache_enabled)
            .with_ingest_mode(pipeline.ingest_mode)
            .with_top_k_limits(pipeline.default_top_k, pipeline.max_top_k))
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_chunker(mut self, chunker: TextChunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_index_params(mut self, params: IndexParams) -> Self {
        self.index_params = params;
        self
    }

    pub fn with_index_cache(mut self, enabled: bool) -> Self {
        self.index_cache = enabled.then(IndexCache::new);
        self
    }

    pub fn with_ingest_mode(mut self, mode: IngestMode) -> Self {
        self.ingest_mode = mode;
        self
    }

    pub fn with_top_k_limits(mut self, default_top_k: usize, max_top_k: usize) -> Self {
        self.default_top_k = default_top_k;
        self.max_top_k = max_top_k;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn engine(&self) -> &Arc<dyn EmbeddingEngine> {
        &self.engine
    }

    pub fn store(&self) -> &Arc<dyn EmbeddingStore> {
        &self.store
    }

    /// Extract an uploaded document and store its chunk embeddings. The report
    /// id defaults to the file name.
    pub async fn ingest_document(
        &self,
        filename: &str,
        content: &[u8],
        report_id: Option<String>,
    ) -> Result<IngestSummary, AppError> {
        let result = match self.extract(filename, content).await {
            Ok(text) => {
                let report_id = report_id.unwrap_or_else(|| filename.to_string());
                self.run_ingest(&report_id, &text).await
            }
            Err(e) => Err(e),
        };
        self.observe("ingest", result)
    }

    pub async fn ingest_text(&self, report_id: &str, text: &str) -> Result<IngestSummary, AppError> {
        let result = self.run_ingest(report_id, text).await;
        self.observe("ingest", result)
    }

    /// Rank stored reports against an uploaded document.
    pub async fn find_similar_document(
        &self,
        filename: &str,
        content: &[u8],
        top_k: Option<usize>,
    ) -> Result<SimilarityReport, AppError> {
        let result = match self.extract(filename, content).await {
            Ok(text) => self.run_query(&text, top_k).await,
            Err(e) => Err(e),
        };
        self.observe("query", result)
    }

    pub async fn find_similar_text(
        &self,
        text: &str,
        top_k: Option<usize>,
    ) -> Result<SimilarityReport, AppError> {
        let result = self.run_query(text, top_k).await;
        self.observe("query", result)
    }

    fn observe<T>(&self, operation: &str, result: Result<T, AppError>) -> Result<T, AppError> {
        if let Err(e) = &result {
            warn!("{} failed: {}", operation, e);
            if let Some(metrics) = &self.metrics {
                metrics.record_failure(operation, e);
            }
        }
        result
    }

    async fn extract(&self, filename: &str, content: &[u8]) -> Result<String, AppError> {
        let start = Instant::now();
        let text = self
            .extractor
            .extract(filename, content)
            .await
            .map_err(|e| e.at(Stage::Extract))?;
        debug!(
            "Extracted {} chars from '{}' in {:?}",
            text.len(),
            filename,
            start.elapsed()
        );
        Ok(text)
    }

    fn resolve_top_k(&self, top_k: Option<usize>) -> Result<usize, AppError> {
        let k = top_k.unwrap_or(self.default_top_k);
        if k == 0 || k > self.max_top_k {
            return Err(AppError::InvalidInput(format!(
                "top_k must be between 1 and {}, got {}",
                self.max_top_k, k
            )));
        }
        Ok(k)
    }

    fn chunk(&self, text: &str) -> Result<Vec<String>, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "document contains no extractable text".to_string(),
            ));
        }
        let chunks = self.chunker.chunk(text).map_err(|e| e.at(Stage::Chunk))?;
        debug!("Split text into {} chunks", chunks.len());
        Ok(chunks)
    }

    /// Runs the engine off the async runtime. Returns the chunks alongside the
    /// `[chunks, D]` matrix.
    async fn embed(&self, chunks: Vec<String>) -> Result<(Vec<String>, Array2<f32>), AppError> {
        let start = Instant::now();
        let engine = Arc::clone(&self.engine);
        let (chunks, matrix) = tokio::task::spawn_blocking(move || {
            let matrix = engine.encode(&chunks)?;
            Ok::<_, AppError>((chunks, matrix))
        })
        .await
        .map_err(|e| AppError::from(e).at(Stage::Embed))?
        .map_err(|e| e.at(Stage::Embed))?;

        debug!(
            "Embedded {} chunks (dimension {}) in {:?}",
            matrix.nrows(),
            matrix.ncols(),
            start.elapsed()
        );
        Ok((chunks, matrix))
    }

    async fn run_ingest(&self, report_id: &str, text: &str) -> Result<IngestSummary, AppError> {
        let start = Instant::now();
        let report_id = report_id.trim();
        if report_id.is_empty() {
            return Err(AppError::InvalidInput("report_id must not be empty".to_string()));
        }

        let chunks = self.chunk(text)?;

        if self.ingest_mode == IngestMode::Reject
            && self
                .store
                .contains_report(report_id)
                .await
                .map_err(|e| e.at(Stage::Store))?
        {
            return Err(AppError::DuplicateReport(report_id.to_string()).at(Stage::Store));
        }

        let (_, matrix) = self.embed(chunks).await?;
        let dimension = matrix.ncols();
        let vectors: Vec<Vec<f32>> = matrix.outer_iter().map(|row| row.to_vec()).collect();

        let store_start = Instant::now();
        let stored = self
            .store
            .append(report_id, &vectors)
            .await
            .map_err(|e| e.at(Stage::Store))?;
        debug!("Stored {} records in {:?}", stored, store_start.elapsed());

        if let Some(cache) = &self.index_cache {
            cache.invalidate();
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_ingest(stored);
        }

        let summary = IngestSummary {
            report_id: report_id.to_string(),
            chunks_stored: stored,
            dimension,
            processing_time_ms: start.elapsed().as_millis(),
        };
        info!(
            "Ingested report '{}': {} chunks in {}ms",
            summary.report_id, summary.chunks_stored, summary.processing_time_ms
        );
        Ok(summary)
    }

    /// Cached handle when still current, otherwise a fresh build from a full
    /// store snapshot.
    async fn index(&self) -> Result<Arc<IndexHandle>, AppError> {
        if let Some(cache) = &self.index_cache {
            let cached = cache.get().await;
            if let Some(metrics) = &self.metrics {
                metrics.record_cache_lookup(cached.is_some());
            }
            if let Some(handle) = cached {
                debug!("Using cached index of {} rows", handle.len());
                return Ok(handle);
            }
        }

        // read before scanning: records appended after this point bump it
        let generation = self.index_cache.as_ref().map(IndexCache::current_generation);

        let snapshot = self
            .store
            .scan_all()
            .await
            .map_err(|e| e.at(Stage::Store))?;
        if snapshot.is_empty() {
            return Err(AppError::NoData(
                "no reports have been ingested yet".to_string(),
            )
            .at(Stage::IndexBuild));
        }

        let start = Instant::now();
        let params = self.index_params;
        let handle = tokio::task::spawn_blocking(move || SimilarityIndex::build(snapshot, params))
            .await
            .map_err(|e| AppError::from(e).at(Stage::IndexBuild))?
            .map_err(|e| e.at(Stage::IndexBuild))?;
        let elapsed = start.elapsed();
        debug!("Built index of {} rows in {:?}", handle.len(), elapsed);
        if let Some(metrics) = &self.metrics {
            metrics.record_index_build(elapsed.as_secs_f64());
        }

        let handle = Arc::new(handle);
        if let (Some(cache), Some(generation)) = (&self.index_cache, generation) {
            cache.store(generation, Arc::clone(&handle)).await;
        }
        Ok(handle)
    }

    async fn run_query(&self, text: &str, top_k: Option<usize>) -> Result<SimilarityReport, AppError> {
        let start = Instant::now();
        let k = self.resolve_top_k(top_k)?;
        let chunks = self.chunk(text)?;
        let (chunks, queries) = self.embed(chunks).await?;

        let handle = self.index().await?;

        let search_start = Instant::now();
        let search_handle = Arc::clone(&handle);
        let hits = tokio::task::spawn_blocking(move || search_handle.search(queries.view(), k))
            .await
            .map_err(|e| AppError::from(e).at(Stage::Search))?
            .map_err(|e| e.at(Stage::Search))?;
        debug!("Searched {} query chunks in {:?}", hits.len(), search_start.elapsed());

        let mut chunk_results = Vec::with_capacity(chunks.len());
        for (query_chunk, row_hits) in chunks.into_iter().zip(hits) {
            let matches = row_hits
                .iter()
                .map(|hit| {
                    let chunk = handle.resolve(hit.row)?;
                    Ok(ChunkMatch {
                        report_id: chunk.report_id.clone(),
                        chunk_index: chunk.chunk_index,
                        distance: hit.distance,
                    })
                })
                .collect::<Result<Vec<_>, AppError>>()
                .map_err(|e| e.at(Stage::Search))?;
            chunk_results.push(ChunkSimilarityResult {
                query_chunk,
                matches,
            });
        }

        let ranking = aggregate(&chunk_results);
        let elapsed = start.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.record_query(elapsed.as_secs_f64());
        }

        info!(
            "Similarity query over {} indexed chunks: {} query chunks, {} reports ranked in {}ms (query starts '{}')",
            handle.len(),
            chunk_results.len(),
            ranking.len(),
            elapsed.as_millis(),
            preview(text)
        );

        Ok(SimilarityReport {
            chunk_level_similarity: chunk_results,
            report_level_similarity: ranking,
            indexed_chunks: handle.len(),
            processing_time_ms: elapsed.as_millis(),
        })
    }
}

fn preview(text: &str) -> String {
    text.trim().chars().take(TEXT_PREVIEW_CHARS).collect()
}
