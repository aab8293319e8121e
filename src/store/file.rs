// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! JSON-lines 文件存储
//!
//! One `EmbeddingRecord` per line, appended in order. A line that does not
//! parse fails the whole scan.

use super::{EmbeddingStore, Snapshot, check_stored_dimension, records_for_append};
use crate::domain::EmbeddingRecord;
use crate::error::AppError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct FileState {
    len: usize,
    dimension: Option<usize>,
    reports: HashSet<String>,
}

pub struct FileStore {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileStore {
    /// Open or create the log at `path`. Existing content is validated.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::StoreError(format!("cannot create {:?}: {}", parent, e))
            })?;
        }

        let records = read_records(&path).await?;
        let state = FileState {
            len: records.len(),
            dimension: records.first().map(|r| r.vector.len()),
            reports: records.into_iter().map(|r| r.report_id).collect(),
        };
        tracing::info!(
            "Opened embedding file {:?}: {} records, {} reports",
            path,
            state.len,
            state.reports.len()
        );

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn read_records(path: &Path) -> Result<Vec<EmbeddingRecord>, AppError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(AppError::StoreError(format!(
                "cannot read {:?}: {}",
                path, e
            )));
        }
    };

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str::<EmbeddingRecord>(line).map_err(|e| {
                AppError::StoreError(format!(
                    "store corrupt: {:?} line {}: {}",
                    path,
                    number + 1,
                    e
                ))
            })
        })
        .collect()
}

#[async_trait]
impl EmbeddingStore for FileStore {
    async fn append(&self, report_id: &str, vectors: &[Vec<f32>]) -> Result<usize, AppError> {
        let incoming = records_for_append(report_id, vectors)?;
        if incoming.is_empty() {
            return Ok(0);
        }

        let mut state = self.state.lock().await;
        check_stored_dimension(state.dimension, &incoming)?;

        let mut buffer = String::new();
        for record in &incoming {
            let line = serde_json::to_string(record)
                .map_err(|e| AppError::StoreError(e.to_string()))?;
            buffer.push_str(&line);
            buffer.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AppError::StoreError(format!("cannot open {:?}: {}", self.path, e)))?;
        file.write_all(buffer.as_bytes())
            .await
            .map_err(|e| AppError::StoreError(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| AppError::StoreError(e.to_string()))?;
        file.sync_data()
            .await
            .map_err(|e| AppError::StoreError(e.to_string()))?;

        state.len += incoming.len();
        state.dimension.get_or_insert(incoming[0].vector.len());
        state.reports.insert(report_id.to_string());

        Ok(incoming.len())
    }

    async fn scan_all(&self) -> Result<Snapshot, AppError> {
        // held so a scan never sees half of an append
        let _state = self.state.lock().await;
        let records = read_records(&self.path).await?;
        Snapshot::from_records(records)
    }

    async fn contains_report(&self, report_id: &str) -> Result<bool, AppError> {
        Ok(self.state.lock().await.reports.contains(report_id))
    }

    async fn len(&self) -> Result<usize, AppError> {
        Ok(self.state.lock().await.len)
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}
