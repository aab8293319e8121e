// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::error::AppError;
use crate::utils::DEFAULT_MAX_CHUNK_SIZE;

/// 文本规范化：换行转空格、去除首尾空白、全部小写
///
/// Lossy on purpose: chunk boundaries and embeddings are computed on this form
/// for both ingested and query documents.
pub fn normalize(text: &str) -> String {
    text.replace(['\r', '\n'], " ").trim().to_lowercase()
}

/// Normalize `text` and cut its words into groups of exactly
/// `max_chunk_size` (the last group may be shorter), each joined by single
/// spaces.
pub fn split(text: &str, max_chunk_size: usize) -> Result<Vec<String>, AppError> {
    if max_chunk_size == 0 {
        return Err(AppError::InvalidInput(
            "max_chunk_size must be greater than 0".to_string(),
        ));
    }

    let normalized = normalize(text);
    let words: Vec<&str> = normalized.split_whitespace().collect();

    Ok(words
        .chunks(max_chunk_size)
        .map(|group| group.join(" "))
        .collect())
}

#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    max_chunk_size: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
        }
    }
}

impl TextChunker {
    pub fn new(max_chunk_size: usize) -> Result<Self, AppError> {
        if max_chunk_size == 0 {
            return Err(AppError::InvalidInput(
                "max_chunk_size must be greater than 0".to_string(),
            ));
        }
        Ok(Self { max_chunk_size })
    }

    pub fn chunk(&self, text: &str) -> Result<Vec<String>, AppError> {
        split(text, self.max_chunk_size)
    }
}
