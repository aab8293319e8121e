// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Back-reference from an index row or stored record to its chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct ChunkRef {
    pub report_id: String,
    pub chunk_index: usize,
}

/// Persisted form of one chunk embedding. Write-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub report_id: String,
    pub chunk_index: usize,
    pub vector: Vec<f32>,
}

impl EmbeddingRecord {
    pub fn chunk_ref(&self) -> ChunkRef {
        ChunkRef {
            report_id: self.report_id.clone(),
            chunk_index: self.chunk_index,
        }
    }
}

/// One stored chunk close to a query chunk. `distance` is squared L2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChunkMatch {
    pub report_id: String,
    pub chunk_index: usize,
    pub distance: f32,
}

/// Nearest stored chunks for one chunk of the query document, closest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChunkSimilarityResult {
    pub query_chunk: String,
    pub matches: Vec<ChunkMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReportScore {
    pub report_id: String,
    pub score: f32,
}

/// Outcome of a successful ingest.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IngestSummary {
    pub report_id: String,
    pub chunks_stored: usize,
    pub dimension: usize,
    pub processing_time_ms: u128,
}

/// Outcome of a similarity query: the ranking plus the evidence behind it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SimilarityReport {
    pub chunk_level_similarity: Vec<ChunkSimilarityResult>,
    pub report_level_similarity: Vec<ReportScore>,
    pub indexed_chunks: usize,
    pub processing_time_ms: u128,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UploadParams {
    /// Report identifier. Defaults to the uploaded file name.
    pub report_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SimilarityParams {
    /// Neighbours fetched per query chunk.
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub report_id: String,
    pub chunks_stored: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SimilarityResponse {
    pub message: String,
    pub chunk_level_similarity: Vec<ChunkSimilarityResult>,
    pub report_level_similarity: Vec<ReportScore>,
}
