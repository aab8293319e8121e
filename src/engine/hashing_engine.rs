// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::EmbeddingEngine;
use crate::error::AppError;
use crate::utils::normalize_l2;

const FNV_OFFSET: u64 = 1469598103934665603;
const FNV_PRIME: u64 = 1099511628211;

/// 基于特征哈希的词袋向量化引擎
///
/// Each word is hashed into one of `dimension` buckets with a sign taken from
/// the top hash bit, then the vector is L2-normalized. Texts sharing words land
/// close together in L2, which is enough for offline use and tests. Not a
/// semantic model.
#[derive(Debug, Clone)]
pub struct HashingEngine {
    dimension: usize,
}

impl HashingEngine {
    pub fn new(dimension: usize) -> Result<Self, AppError> {
        if dimension == 0 {
            return Err(AppError::ModelLoadError(
                "hashing dimension must be greater than 0".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    fn fnv1a(bytes: &[u8]) -> u64 {
        let mut hash = FNV_OFFSET;
        for &byte in bytes {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }

    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];

        for word in text.split_whitespace() {
            let token = word.trim_matches(|c: char| !c.is_alphanumeric());
            if token.is_empty() {
                continue;
            }
            let hash = Self::fnv1a(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        normalize_l2(&mut embedding);
        embedding
    }
}

impl EmbeddingEngine for HashingEngine {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        Ok(texts.iter().map(|t| self.generate_embedding(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::squared_l2_distance;

    fn embed(engine: &HashingEngine, text: &str) -> Vec<f32> {
        engine.embed_batch(&[text.to_string()]).unwrap().remove(0)
    }

    #[test]
    fn test_deterministic_and_unit_length() {
        let engine = HashingEngine::new(256).unwrap();
        let a = embed(&engine, "quarterly revenue grew");
        let b = embed(&engine, "quarterly revenue grew");
        assert_eq!(a, b);

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_shared_words_are_closer() {
        let engine = HashingEngine::new(256).unwrap();
        let query = embed(&engine, "quarterly revenue grew significantly");
        let related = embed(&engine, "the quarterly revenue grew in every region");
        let unrelated = embed(&engine, "heavy rain is forecast for the weekend");

        let near = squared_l2_distance(&query, &related).unwrap();
        let far = squared_l2_distance(&query, &unrelated).unwrap();
        assert!(near < far, "near={} far={}", near, far);
    }

    #[test]
    fn test_punctuation_is_ignored() {
        let engine = HashingEngine::new(64).unwrap();
        assert_eq!(embed(&engine, "revenue, grew."), embed(&engine, "revenue grew"));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let engine = HashingEngine::new(32).unwrap();
        assert!(embed(&engine, "   ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(HashingEngine::new(0).is_err());
    }
}
