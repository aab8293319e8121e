// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub const DEFAULT_MAX_CHUNK_SIZE: usize = 512;
pub const DEFAULT_TOP_K: usize = 5;
pub const MAX_TOP_K: usize = 100;
pub const DEFAULT_HNSW_MAX_CONNECTIONS: usize = 32;
pub const DEFAULT_HNSW_EF_CONSTRUCTION: usize = 200;
pub const DEFAULT_HNSW_EF_SEARCH: usize = 64;
/// hnsw_rs refuses more layers than this.
pub const HNSW_MAX_LAYERS: usize = 16;
pub const TEXT_PREVIEW_CHARS: usize = 100;
