// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::error::AppError;
use std::path::Path;
use tokenizers::Tokenizer as HfTokenizer;

/// Token ids for one text, truncated to the model's maximum length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    pub ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub type_ids: Vec<u32>,
}

impl Encoding {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Clone)]
pub struct Tokenizer {
    tokenizer: HfTokenizer,
    max_length: usize,
}

impl Tokenizer {
    pub fn from_file<P: AsRef<Path>>(path: P, max_length: usize) -> Result<Self, AppError> {
        let tokenizer = HfTokenizer::from_file(path.as_ref())
            .map_err(|e| AppError::ModelLoadError(format!("tokenizer: {}", e)))?;

        Ok(Self {
            tokenizer,
            max_length: max_length.max(1),
        })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn encode(&self, text: &str) -> Result<Encoding, AppError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| AppError::TokenizationError(e.to_string()))?;

        let keep = encoding.get_ids().len().min(self.max_length);
        Ok(Encoding {
            ids: encoding.get_ids()[..keep].to_vec(),
            attention_mask: encoding.get_attention_mask()[..keep].to_vec(),
            type_ids: encoding.get_type_ids()[..keep].to_vec(),
        })
    }

    pub fn encode_batch(&self, texts: &[String]) -> Result<Vec<Encoding>, AppError> {
        texts.iter().map(|t| self.encode(t)).collect()
    }
}

/// Right-pad every encoding to the longest one. Returns row-major
/// `(ids, attention_mask, type_ids)` buffers of `len * width` and the width.
pub fn pad_batch(encodings: &[Encoding]) -> (Vec<u32>, Vec<u32>, Vec<u32>, usize) {
    let width = encodings.iter().map(Encoding::len).max().unwrap_or(0);
    let mut ids = vec![0u32; encodings.len() * width];
    let mut mask = vec![0u32; encodings.len() * width];
    let mut type_ids = vec![0u32; encodings.len() * width];

    for (row, encoding) in encodings.iter().enumerate() {
        let offset = row * width;
        ids[offset..offset + encoding.len()].copy_from_slice(&encoding.ids);
        mask[offset..offset + encoding.len()].copy_from_slice(&encoding.attention_mask);
        type_ids[offset..offset + encoding.len()].copy_from_slice(&encoding.type_ids);
    }

    (ids, mask, type_ids, width)
}
