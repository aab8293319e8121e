// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod app;
pub mod model;

pub use app::{
    AppConfig, ConfigError, ConfigLoader, IndexConfig, IngestMode, LogFormat, LoggingConfig,
    ModelConfig, PipelineConfig, ServerConfig, StoreBackend, StoreConfig,
};
pub use model::{DeviceType, EngineType};
