// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod candle_engine;
pub mod hashing_engine;

use crate::config::{EngineType, ModelConfig};
use crate::error::AppError;
use crate::utils::stack_rows;
use ndarray::Array2;

pub use candle_engine::CandleEngine;
pub use hashing_engine::HashingEngine;

/// 向量化引擎抽象接口
///
/// Calls are blocking and may be CPU/GPU heavy; async callers run them
/// through `spawn_blocking`.
pub trait EmbeddingEngine: Send + Sync {
    /// One vector per input text, same order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError>;

    /// Output dimension D.
    fn dimension(&self) -> usize;

    fn name(&self) -> &str;

    /// Stacked `[texts.len(), D]` matrix. Every row is checked against D.
    fn encode(&self, texts: &[String]) -> Result<Array2<f32>, AppError> {
        if texts.is_empty() {
            return Ok(Array2::zeros((0, self.dimension())));
        }

        let rows = self.embed_batch(texts)?;
        if rows.len() != texts.len() {
            return Err(AppError::InferenceError(format!(
                "engine returned {} vectors for {} texts",
                rows.len(),
                texts.len()
            )));
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != self.dimension()) {
            return Err(AppError::InferenceError(format!(
                "engine returned dimension {}, expected {}",
                bad.len(),
                self.dimension()
            )));
        }

        stack_rows(rows)
    }
}

pub enum AnyEngine {
    Candle(CandleEngine),
    Hashing(HashingEngine),
}

impl AnyEngine {
    pub fn new(config: &ModelConfig) -> Result<Self, AppError> {
        let engine = match config.engine {
            EngineType::Candle => AnyEngine::Candle(CandleEngine::new(config)?),
            EngineType::Hashing => AnyEngine::Hashing(HashingEngine::new(config.hashing_dimension)?),
        };

        if let Some(expected) = config.expected_dimension
            && expected != engine.dimension()
        {
            return Err(AppError::ModelLoadError(format!(
                "Dimension mismatch: expected {}, model '{}' produces {}",
                expected,
                engine.name(),
                engine.dimension()
            )));
        }

        Ok(engine)
    }
}

impl EmbeddingEngine for AnyEngine {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        match self {
            AnyEngine::Candle(engine) => engine.embed_batch(texts),
            AnyEngine::Hashing(engine) => engine.embed_batch(texts),
        }
    }

    fn dimension(&self) -> usize {
        match self {
            AnyEngine::Candle(engine) => engine.dimension(),
            AnyEngine::Hashing(engine) => engine.dimension(),
        }
    }

    fn name(&self) -> &str {
        match self {
            AnyEngine::Candle(engine) => engine.name(),
            AnyEngine::Hashing(engine) => engine.name(),
        }
    }
}
