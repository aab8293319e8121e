// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! Prometheus 指标收集模块
//!
//! 入库、查询与索引构建的核心指标

use crate::error::{AppError, Stage};
use prometheus::{
    CounterVec, Encoder, Histogram, IntCounter, Registry, TextEncoder,
    register_counter_vec_with_registry, register_histogram_with_registry,
    register_int_counter_with_registry,
};
use std::sync::Arc;

/// 流水线指标收集器
pub struct PipelineMetrics {
    registry: Arc<Registry>,

    reports_ingested: IntCounter,
    chunks_ingested: IntCounter,
    similarity_queries: IntCounter,

    // 按失败阶段计数
    failures: CounterVec,

    index_build_seconds: Histogram,
    query_seconds: Histogram,

    // 索引缓存命中 / 未命中
    index_cache: CounterVec,
}

impl PipelineMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let reports_ingested = register_int_counter_with_registry!(
            "reportsim_reports_ingested_total",
            "Total number of successfully ingested reports",
            registry.clone()
        )?;

        let chunks_ingested = register_int_counter_with_registry!(
            "reportsim_chunks_ingested_total",
            "Total number of chunk embeddings written to the store",
            registry.clone()
        )?;

        let similarity_queries = register_int_counter_with_registry!(
            "reportsim_similarity_queries_total",
            "Total number of completed similarity queries",
            registry.clone()
        )?;

        let failures = register_counter_vec_with_registry!(
            "reportsim_pipeline_failures_total",
            "Pipeline failures by operation and stage",
            &["operation", "stage"],
            registry.clone()
        )?;

        let index_build_seconds = register_histogram_with_registry!(
            "reportsim_index_build_duration_seconds",
            "Time spent building the similarity index",
            vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0],
            registry.clone()
        )?;

        let query_seconds = register_histogram_with_registry!(
            "reportsim_query_duration_seconds",
            "End-to-end similarity query duration",
            vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            registry.clone()
        )?;

        let index_cache = register_counter_vec_with_registry!(
            "reportsim_index_cache_total",
            "Index cache lookups by result",
            &["result"],
            registry.clone()
        )?;

        Ok(Self {
            registry,
            reports_ingested,
            chunks_ingested,
            similarity_queries,
            failures,
            index_build_seconds,
            query_seconds,
            index_cache,
        })
    }

    pub fn record_ingest(&self, chunks: usize) {
        self.reports_ingested.inc();
        self.chunks_ingested.inc_by(chunks as u64);
    }

    pub fn record_query(&self, seconds: f64) {
        self.similarity_queries.inc();
        self.query_seconds.observe(seconds);
    }

    pub fn record_index_build(&self, seconds: f64) {
        self.index_build_seconds.observe(seconds);
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.index_cache.with_label_values(&[result]).inc();
    }

    /// 记录失败；未标注阶段的错误记为 "request"
    pub fn record_failure(&self, operation: &str, error: &AppError) {
        let stage = error.stage().map(|s| s.as_str()).unwrap_or("request");
        self.failures.with_label_values(&[operation, stage]).inc();
    }

    pub fn failure_count(&self, operation: &str, stage: Stage) -> f64 {
        self.failures
            .with_label_values(&[operation, stage.as_str()])
            .get()
    }

    pub fn reports_ingested(&self) -> u64 {
        self.reports_ingested.get()
    }

    pub fn chunks_ingested(&self) -> u64 {
        self.chunks_ingested.get()
    }

    pub fn similarity_queries(&self) -> u64 {
        self.similarity_queries.get()
    }

    /// Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, AppError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(encoding_error)?;
        String::from_utf8(buffer).map_err(encoding_error)
    }
}

fn encoding_error(e: impl std::fmt::Display) -> AppError {
    AppError::MetricsError(format!("metrics encoding: {}", e))
}
