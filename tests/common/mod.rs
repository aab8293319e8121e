// Copyright (c) 2025 Kirky.X
//
// Licensed under MIT License
// See LICENSE file in the project root for full license information

//! 测试共用工具：确定性哈希引擎 + 内存存储

#![allow(dead_code)]

use reportsim::{EmbeddingStore, HashingEngine, MemoryStore, ReportService};
use std::sync::Arc;

pub const TEST_DIMENSION: usize = 384;

pub const ALPHA_TEXT: &str = "Quarterly revenue grew significantly across all regions.";
pub const BETA_TEXT: &str = "The weather forecast predicts heavy rain.";
pub const QUERY_TEXT: &str = "quarterly revenue grew significantly";

pub fn test_engine() -> Arc<HashingEngine> {
    Arc::new(HashingEngine::new(TEST_DIMENSION).expect("valid dimension"))
}

pub fn memory_service() -> ReportService {
    ReportService::new(test_engine(), Arc::new(MemoryStore::new()))
}

pub fn service_with_store(store: Arc<dyn EmbeddingStore>) -> ReportService {
    ReportService::new(test_engine(), store)
}

pub fn numbered_words(count: usize) -> String {
    (0..count)
        .map(|i| format!("word{}", i))
        .collect::<Vec<_>>()
        .join(" ")
}
