// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::model::{DeviceType, EngineType};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub store: StoreConfig,
    pub pipeline: PipelineConfig,
    pub index: IndexConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
    pub max_upload_mb: usize,
    /// Allowed browser origins. `"*"` allows any; empty disables CORS.
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    pub engine: EngineType,
    pub model_repo: String,
    pub model_path: Option<String>,
    pub use_gpu: bool,
    pub batch_size: usize,
    pub expected_dimension: Option<usize>,
    pub normalize: bool,
    pub max_sequence_length: usize,
    pub hashing_dimension: usize,
}

/// 嵌入存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    File,
    Redis,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
    pub redis_url: String,
    pub redis_prefix: String,
}

/// What an ingest does when the report id already has stored chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Append next to the existing records. Duplicate (report_id, chunk_index)
    /// pairs accumulate.
    #[default]
    Additive,
    /// Refuse the ingest.
    Reject,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_chunk_size: usize,
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub ingest_mode: IngestMode,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(default)]
pub struct IndexConfig {
    pub max_connections: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub cache_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            timeout_secs: 120,
            max_upload_mb: 50,
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            engine: EngineType::Candle,
            model_repo: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            model_path: None,
            use_gpu: false,
            batch_size: 32,
            expected_dimension: None,
            normalize: true,
            max_sequence_length: 512,
            hashing_dimension: 384,
        }
    }
}

impl ModelConfig {
    pub fn device(&self) -> DeviceType {
        if !self.use_gpu {
            DeviceType::Cpu
        } else if cfg!(feature = "metal") {
            DeviceType::Metal
        } else {
            DeviceType::Cuda
        }
    }

    /// Local checkpoint directory when set, hub repo otherwise.
    pub fn model_location(&self) -> PathBuf {
        match &self.model_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.model_repo),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            path: PathBuf::from("data/embeddings.jsonl"),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            redis_prefix: "reportsim".to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 512,
            default_top_k: 5,
            max_top_k: 100,
            ingest_mode: IngestMode::Additive,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_connections: 32,
            ef_construction: 200,
            ef_search: 64,
            cache_enabled: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: "REPORTSIM".to_string(),
        }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = config::Config::builder();

        if let Some(path) = &self.config_path {
            if !path.exists() {
                return Err(ConfigError::Message(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            config = config.add_source(config::File::from(path.as_path()));
        } else {
            let default_config = PathBuf::from("config.toml");
            if default_config.exists() {
                config = config.add_source(config::File::with_name("config"));
            }
        }

        config = config.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .ignore_empty(true),
        );

        let app: AppConfig = config.build()?.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Message(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        ConfigError::Message(e.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::ConfigError(e.to_string())
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        ConfigLoader::new().load()
    }

    pub fn load_with_path<P: Into<PathBuf>>(path: P) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        ConfigLoader::new().with_config_path(path).load()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(origin) = self
            .server
            .cors_origins
            .iter()
            .find(|o| *o != "*" && axum::http::HeaderValue::from_str(o).is_err())
        {
            return Err(ConfigError::Invalid {
                field: "server.cors_origins",
                reason: format!("{:?} is not a valid origin header value", origin),
            });
        }
        if self.pipeline.max_chunk_size == 0 {
            return Err(ConfigError::Invalid {
                field: "pipeline.max_chunk_size",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.pipeline.max_top_k == 0 {
            return Err(ConfigError::Invalid {
                field: "pipeline.max_top_k",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.pipeline.default_top_k == 0 || self.pipeline.default_top_k > self.pipeline.max_top_k
        {
            return Err(ConfigError::Invalid {
                field: "pipeline.default_top_k",
                reason: format!("must be within 1..={}", self.pipeline.max_top_k),
            });
        }
        if self.index.max_connections == 0 {
            return Err(ConfigError::Invalid {
                field: "index.max_connections",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.index.ef_construction == 0 {
            return Err(ConfigError::Invalid {
                field: "index.ef_construction",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.model.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "model.batch_size",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.model.engine == EngineType::Hashing && self.model.hashing_dimension == 0 {
            return Err(ConfigError::Invalid {
                field: "model.hashing_dimension",
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save_to_file<P: Into<PathBuf>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self.to_toml_string()?;
        std::fs::write(path.into(), content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline.max_chunk_size, 512);
        assert_eq!(config.pipeline.default_top_k, 5);
        assert_eq!(config.pipeline.ingest_mode, IngestMode::Additive);
        assert_eq!(config.index.max_connections, 32);
        assert!(!config.index.cache_enabled);
        assert_eq!(config.store.backend, StoreBackend::File);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_with_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reportsim.toml");
        std::fs::write(
            &path,
            r#"
[pipeline]
max_chunk_size = 128
ingest_mode = "reject"

[index]
cache_enabled = true

[model]
engine = "hashing"
"#,
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_env_prefix("REPORTSIM_TEST_PARTIAL")
            .with_config_path(&path)
            .load()
            .unwrap();

        assert_eq!(config.pipeline.max_chunk_size, 128);
        assert_eq!(config.pipeline.ingest_mode, IngestMode::Reject);
        assert_eq!(config.pipeline.default_top_k, 5);
        assert!(config.index.cache_enabled);
        assert_eq!(config.index.max_connections, 32);
        assert_eq!(config.model.engine, EngineType::Hashing);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_env_overrides_defaults() {
        // SAFETY: the prefix is unique to this test
        unsafe {
            std::env::set_var("REPORTSIM_TEST_ENV_PIPELINE__MAX_CHUNK_SIZE", "64");
            std::env::set_var("REPORTSIM_TEST_ENV_PIPELINE__INGEST_MODE", "reject");
            std::env::set_var("REPORTSIM_TEST_ENV_STORE__BACKEND", "memory");
            std::env::set_var(
                "REPORTSIM_TEST_ENV_SERVER__CORS_ORIGINS",
                "https://a.example,https://b.example",
            );
        }

        let config = ConfigLoader::new()
            .with_env_prefix("REPORTSIM_TEST_ENV")
            .load()
            .unwrap();

        assert_eq!(config.pipeline.max_chunk_size, 64);
        assert_eq!(config.pipeline.ingest_mode, IngestMode::Reject);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.index.ef_search, 64);
        assert_eq!(
            config.server.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn test_validate_rejects_unprintable_cors_origin() {
        let mut config = AppConfig::default();
        assert_eq!(config.server.cors_origins, vec!["*".to_string()]);

        config.server.cors_origins = vec!["https://ok.example\n".to_string()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "server.cors_origins",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_explicit_config_file_is_an_error() {
        let result = ConfigLoader::new()
            .with_config_path("/definitely/not/here.toml")
            .load();
        assert!(matches!(result, Err(ConfigError::Message(_))));
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let mut config = AppConfig::default();
        config.pipeline.max_chunk_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "pipeline.max_chunk_size",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_default_top_k_above_max() {
        let mut config = AppConfig::default();
        config.pipeline.default_top_k = 10;
        config.pipeline.max_top_k = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");

        let mut config = AppConfig::default();
        config.index.ef_search = 99;
        config.store.backend = StoreBackend::Memory;
        config.save_to_file(&path).unwrap();

        let loaded = ConfigLoader::new()
            .with_env_prefix("REPORTSIM_TEST_SAVED")
            .with_config_path(&path)
            .load()
            .unwrap();
        assert_eq!(loaded.index.ef_search, 99);
        assert_eq!(loaded.store.backend, StoreBackend::Memory);
    }
}
