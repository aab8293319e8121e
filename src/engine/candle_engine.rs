// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::EmbeddingEngine;
use crate::config::{DeviceType, ModelConfig};
use crate::error::AppError;
use crate::text::{Encoding, Tokenizer, pad_batch};
use crate::utils::normalize_l2;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use hf_hub::{Repo, RepoType, api::sync::Api};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Fields of `config.json` needed outside the model itself.
#[derive(Deserialize)]
struct ModelConfigJson {
    hidden_size: usize,
    max_position_embeddings: usize,
}

struct ModelFiles {
    config: PathBuf,
    tokenizer: PathBuf,
    weights: PathBuf,
}

impl ModelFiles {
    fn from_local_dir(dir: &Path) -> Result<Self, AppError> {
        if !dir.is_dir() {
            return Err(AppError::ModelLoadError(format!(
                "Model directory not found: {:?}",
                dir
            )));
        }

        let files = Self {
            config: dir.join("config.json"),
            tokenizer: dir.join("tokenizer.json"),
            weights: dir.join("model.safetensors"),
        };
        for path in [&files.config, &files.tokenizer, &files.weights] {
            if !path.exists() {
                return Err(AppError::ModelLoadError(format!(
                    "Missing model file: {:?}",
                    path
                )));
            }
        }
        Ok(files)
    }

    fn from_hub(repo_id: &str) -> Result<Self, AppError> {
        let api = Api::new().map_err(|e| AppError::ModelLoadError(e.to_string()))?;
        let repo = api.repo(Repo::new(repo_id.to_string(), RepoType::Model));

        let fetch = |name: &str| {
            repo.get(name)
                .map_err(|e| AppError::ModelLoadError(format!("{}/{}: {}", repo_id, name, e)))
        };

        Ok(Self {
            config: fetch("config.json")?,
            tokenizer: fetch("tokenizer.json")?,
            weights: fetch("model.safetensors")?,
        })
    }
}

/// 基于 Candle 的句向量引擎（BERT 类模型，均值池化）
pub struct CandleEngine {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
    batch_size: usize,
    normalize: bool,
    name: String,
}

impl CandleEngine {
    pub fn new(config: &ModelConfig) -> Result<Self, AppError> {
        let device = select_device(config.device())?;

        let files = match &config.model_path {
            Some(path) => {
                tracing::info!("Loading model from local path: {}", path);
                ModelFiles::from_local_dir(Path::new(path))?
            }
            None => {
                tracing::info!(
                    "Downloading/Loading model from HuggingFace Hub: {}",
                    config.model_repo
                );
                ModelFiles::from_hub(&config.model_repo)?
            }
        };

        let config_content = std::fs::read_to_string(&files.config)?;
        let shape: ModelConfigJson = serde_json::from_str(&config_content)
            .map_err(|e| AppError::ModelLoadError(format!("config.json: {}", e)))?;
        let bert_config: BertConfig = serde_json::from_str(&config_content)
            .map_err(|e| AppError::ModelLoadError(format!("config.json: {}", e)))?;

        let max_length = config
            .max_sequence_length
            .min(shape.max_position_embeddings);
        let tokenizer = Tokenizer::from_file(&files.tokenizer, max_length)?;

        tracing::info!(
            "Loading safetensors model weights from: {:?}",
            files.weights
        );
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights.clone()], DType::F32, &device)
        }
        .map_err(|e| AppError::ModelLoadError(e.to_string()))?;

        let model =
            BertModel::load(vb, &bert_config).map_err(|e| AppError::ModelLoadError(e.to_string()))?;

        let name = config.model_location().to_string_lossy().into_owned();
        tracing::info!(
            "Model '{}' ready: dimension={}, max_length={}",
            name,
            shape.hidden_size,
            max_length
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            dimension: shape.hidden_size,
            batch_size: config.batch_size.max(1),
            normalize: config.normalize,
            name,
        })
    }

    fn tensor(&self, data: Vec<u32>, rows: usize, width: usize) -> Result<Tensor, AppError> {
        Tensor::new(data, &self.device)
            .and_then(|t| t.reshape((rows, width)))
            .map_err(|e| AppError::InferenceError(e.to_string()))
    }

    /// 单批前向传播 + 按注意力掩码的均值池化
    fn forward_batch(&self, encodings: &[Encoding]) -> Result<Vec<Vec<f32>>, AppError> {
        let rows = encodings.len();
        let (ids, mask, type_ids, width) = pad_batch(encodings);

        let token_ids = self.tensor(ids, rows, width)?;
        let token_type_ids = self.tensor(type_ids, rows, width)?;
        let attention_mask = self.tensor(mask, rows, width)?;

        let hidden = self
            .model
            .forward(&token_ids, &token_type_ids, Some(&attention_mask))
            .map_err(|e| AppError::InferenceError(e.to_string()))?;

        let pooled = (|| {
            let mask = attention_mask.to_dtype(DType::F32)?;
            let summed = hidden.broadcast_mul(&mask.unsqueeze(2)?)?.sum(1)?;
            let counts = mask.sum(1)?.unsqueeze(1)?;
            summed.broadcast_div(&counts)?.to_vec2::<f32>()
        })()
        .map_err(|e: candle_core::Error| AppError::InferenceError(e.to_string()))?;

        Ok(pooled)
    }
}

impl EmbeddingEngine for CandleEngine {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let mut results = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let encodings = self.tokenizer.encode_batch(batch)?;
            tracing::debug!("Embedding batch of {} texts", encodings.len());

            let mut vectors = self.forward_batch(&encodings)?;
            if self.normalize {
                vectors.iter_mut().for_each(|v| normalize_l2(v));
            }
            results.extend(vectors);
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn select_device(device_type: DeviceType) -> Result<Device, AppError> {
    match device_type {
        DeviceType::Cuda if candle_core::utils::cuda_is_available() => {
            tracing::info!("Using CUDA GPU");
            Device::new_cuda(0).map_err(|e| AppError::ModelLoadError(e.to_string()))
        }
        DeviceType::Metal if candle_core::utils::metal_is_available() => {
            tracing::info!("Using Metal GPU");
            Device::new_metal(0).map_err(|e| AppError::ModelLoadError(e.to_string()))
        }
        DeviceType::Cpu => {
            tracing::info!("Using CPU");
            Ok(Device::Cpu)
        }
        other => {
            tracing::warn!("{} requested but not available, falling back to CPU", other);
            Ok(Device::Cpu)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_local_model_dir() {
        let config = ModelConfig {
            model_path: Some("/nonexistent/model/dir".to_string()),
            ..ModelConfig::default()
        };
        assert!(matches!(
            CandleEngine::new(&config),
            Err(AppError::ModelLoadError(_))
        ));
    }

    #[test]
    fn test_incomplete_local_model_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();

        let result = ModelFiles::from_local_dir(dir.path());
        assert!(matches!(result, Err(AppError::ModelLoadError(_))));
    }

    #[test]
    fn test_cpu_device_selection() {
        assert!(matches!(select_device(DeviceType::Cpu), Ok(Device::Cpu)));
    }
}
