// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod constants;
pub mod vector;

pub use constants::{
    DEFAULT_HNSW_EF_CONSTRUCTION, DEFAULT_HNSW_EF_SEARCH, DEFAULT_HNSW_MAX_CONNECTIONS,
    DEFAULT_MAX_CHUNK_SIZE, DEFAULT_TOP_K, HNSW_MAX_LAYERS, MAX_TOP_K, TEXT_PREVIEW_CHARS,
};
pub use vector::{normalize_l2, squared_l2_distance, stack_rows, validate_dimension};
