// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::{EmbeddingStore, Snapshot, check_stored_dimension, records_for_append};
use crate::domain::EmbeddingRecord;
use crate::error::AppError;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// 进程内嵌入存储，重启后数据丢失
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<EmbeddingRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EmbeddingStore for MemoryStore {
    async fn append(&self, report_id: &str, vectors: &[Vec<f32>]) -> Result<usize, AppError> {
        let incoming = records_for_append(report_id, vectors)?;

        let mut records = self.records.write().await;
        check_stored_dimension(records.first().map(|r| r.vector.len()), &incoming)?;

        let count = incoming.len();
        records.extend(incoming);
        Ok(count)
    }

    async fn scan_all(&self) -> Result<Snapshot, AppError> {
        let records = self.records.read().await.clone();
        Snapshot::from_records(records)
    }

    async fn contains_report(&self, report_id: &str) -> Result<bool, AppError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .any(|r| r.report_id == report_id))
    }

    async fn len(&self) -> Result<usize, AppError> {
        Ok(self.records.read().await.len())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
