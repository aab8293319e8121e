// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// 错误分类，决定调用方如何处理失败
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller supplied something unusable. Never retried.
    Input,
    /// Extractor, embedder, store or index failed underneath us.
    Dependency,
    /// The store holds no data to answer the query.
    State,
}

/// Pipeline step that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Chunk,
    Embed,
    Store,
    IndexBuild,
    Search,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Chunk => "chunk",
            Stage::Embed => "embed",
            Stage::Store => "store",
            Stage::IndexBuild => "index_build",
            Stage::Search => "search",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Report already ingested: {0}")]
    DuplicateReport(String),

    #[error("Extraction error: {0}")]
    ExtractionError(String),

    #[error("Model load error: {0}")]
    ModelLoadError(String),

    #[error("Tokenization error: {0}")]
    TokenizationError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Index error: {0}")]
    IndexError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("No data available: {0}")]
    NoData(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("{stage} step failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// Attach the failing pipeline step. Already-tagged errors keep their
    /// innermost stage.
    pub fn at(self, stage: Stage) -> Self {
        match self {
            tagged @ AppError::Stage { .. } => tagged,
            other => AppError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidInput(_)
            | AppError::UnsupportedFileType(_)
            | AppError::DuplicateReport(_) => ErrorKind::Input,
            AppError::NoData(_) => ErrorKind::State,
            AppError::Stage { source, .. } => source.kind(),
            _ => ErrorKind::Dependency,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            AppError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Innermost error, skipping stage wrappers.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    fn status_code(&self) -> StatusCode {
        match (self.kind(), self.root()) {
            (_, AppError::DuplicateReport(_)) => StatusCode::CONFLICT,
            (ErrorKind::Input, _) => StatusCode::BAD_REQUEST,
            (ErrorKind::State, _) => StatusCode::NOT_FOUND,
            (ErrorKind::Dependency, _) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match self.root() {
            AppError::ConfigError(_) => "Configuration Error".to_string(),
            _ => self.to_string(),
        };
        let kind = match self.kind() {
            ErrorKind::Input => "input",
            ErrorKind::Dependency => "dependency",
            ErrorKind::State => "no_data",
        };

        let body = Json(json!({
            "error": error_message,
            "kind": kind,
            "stage": self.stage().map(|s| s.as_str()),
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}
