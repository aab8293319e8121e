// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 嵌入向量存储
//!
//! Append-only record log. Records are never updated or deleted; re-ingesting
//! a report id adds records next to the old ones.

pub mod file;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_store;

use crate::config::{StoreBackend, StoreConfig};
use crate::domain::{ChunkRef, EmbeddingRecord};
use crate::error::AppError;
use async_trait::async_trait;
use ndarray::Array2;
use std::sync::Arc;

pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

/// Every stored vector plus its back-reference, paired by row.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub vectors: Array2<f32>,
    pub metadata: Vec<ChunkRef>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            vectors: Array2::zeros((0, 0)),
            metadata: Vec::new(),
        }
    }

    /// Stack records in storage order. Mixed dimensions mean the store is
    /// corrupt and the whole snapshot is refused.
    pub fn from_records(records: Vec<EmbeddingRecord>) -> Result<Self, AppError> {
        let Some(dimension) = records.first().map(|r| r.vector.len()) else {
            return Ok(Self::empty());
        };

        let count = records.len();
        let mut flat = Vec::with_capacity(count * dimension);
        let mut metadata = Vec::with_capacity(count);
        for (row, record) in records.into_iter().enumerate() {
            if record.vector.len() != dimension {
                return Err(AppError::StoreError(format!(
                    "store corrupt: record {} ({}#{}) has dimension {}, expected {}",
                    row,
                    record.report_id,
                    record.chunk_index,
                    record.vector.len(),
                    dimension
                )));
            }
            metadata.push(record.chunk_ref());
            flat.extend(record.vector);
        }

        let vectors = Array2::from_shape_vec((count, dimension), flat)
            .map_err(|e| AppError::StoreError(e.to_string()))?;
        Ok(Self { vectors, metadata })
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }
}

/// 嵌入存储接口
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Store one record per vector; `chunk_index` is the position in
    /// `vectors`. Returns the number of records written.
    async fn append(&self, report_id: &str, vectors: &[Vec<f32>]) -> Result<usize, AppError>;

    /// Consistent snapshot of every record, in append order.
    async fn scan_all(&self) -> Result<Snapshot, AppError>;

    async fn contains_report(&self, report_id: &str) -> Result<bool, AppError>;

    async fn len(&self) -> Result<usize, AppError>;

    fn backend(&self) -> &'static str;
}

/// Turn one append call into records, refusing mixed or zero dimensions.
pub(crate) fn records_for_append(
    report_id: &str,
    vectors: &[Vec<f32>],
) -> Result<Vec<EmbeddingRecord>, AppError> {
    if report_id.trim().is_empty() {
        return Err(AppError::InvalidInput("report_id must not be empty".to_string()));
    }
    if let Some(first) = vectors.first() {
        if first.is_empty() {
            return Err(AppError::InvalidInput(
                "cannot store zero-dimensional vectors".to_string(),
            ));
        }
        if let Some((i, v)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != first.len())
        {
            return Err(AppError::InvalidInput(format!(
                "vector {} has dimension {}, expected {}",
                i,
                v.len(),
                first.len()
            )));
        }
    }

    Ok(vectors
        .iter()
        .enumerate()
        .map(|(chunk_index, vector)| EmbeddingRecord {
            report_id: report_id.to_string(),
            chunk_index,
            vector: vector.clone(),
        })
        .collect())
}

/// Refuse an append whose dimension disagrees with what is already stored.
pub(crate) fn check_stored_dimension(
    stored: Option<usize>,
    incoming: &[EmbeddingRecord],
) -> Result<(), AppError> {
    match (stored, incoming.first()) {
        (Some(stored), Some(record)) if record.vector.len() != stored => {
            Err(AppError::InvalidInput(format!(
                "vector dimension {} does not match stored dimension {}",
                record.vector.len(),
                stored
            )))
        }
        _ => Ok(()),
    }
}

pub async fn build_store(config: &StoreConfig) -> Result<Arc<dyn EmbeddingStore>, AppError> {
    let store: Arc<dyn EmbeddingStore> = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File => Arc::new(FileStore::open(&config.path).await?),
        #[cfg(feature = "redis")]
        StoreBackend::Redis => Arc::new(
            RedisStore::connect(&config.redis_url, &config.redis_prefix).await?,
        ),
        #[cfg(not(feature = "redis"))]
        StoreBackend::Redis => {
            return Err(AppError::ConfigError(
                "store.backend = \"redis\" requires the `redis` feature".to_string(),
            ));
        }
    };

    tracing::info!("Embedding store ready: backend={}", store.backend());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(report_id: &str, chunk_index: usize, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            report_id: report_id.to_string(),
            chunk_index,
            vector,
        }
    }

    #[test]
    fn test_snapshot_pairs_rows_with_metadata() {
        let snapshot = Snapshot::from_records(vec![
            record("a", 0, vec![1.0, 0.0]),
            record("b", 0, vec![0.0, 1.0]),
        ])
        .unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.dimension(), 2);
        assert_eq!(snapshot.vectors.row(1).to_vec(), vec![0.0, 1.0]);
        assert_eq!(snapshot.metadata[1].report_id, "b");
    }

    #[test]
    fn test_snapshot_rejects_mixed_dimensions() {
        let result = Snapshot::from_records(vec![
            record("a", 0, vec![1.0, 0.0]),
            record("a", 1, vec![1.0]),
        ]);
        assert!(matches!(result, Err(AppError::StoreError(_))));
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Snapshot::from_records(Vec::new()).unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.vectors.dim(), (0, 0));
    }

    #[test]
    fn test_records_for_append_indexes_by_position() {
        let records = records_for_append("r", &[vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        let indexes: Vec<usize> = records.iter().map(|r| r.chunk_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn test_records_for_append_rejects_bad_input() {
        assert!(records_for_append("r", &[vec![1.0], vec![1.0, 2.0]]).is_err());
        assert!(records_for_append("r", &[vec![]]).is_err());
        assert!(records_for_append("  ", &[vec![1.0]]).is_err());
    }

    #[tokio::test]
    async fn test_build_memory_store() {
        let config = StoreConfig {
            backend: StoreBackend::Memory,
            ..StoreConfig::default()
        };
        let store = build_store(&config).await.unwrap();
        assert_eq!(store.backend(), "memory");
        assert_eq!(store.len().await.unwrap(), 0);
    }
}
