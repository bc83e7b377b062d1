//! Offline feature-hashing embedding provider.
//!
//! Each lowercase alphanumeric token is hashed with SHA-256 into one of
//! [`EMBEDDING_DIM`] buckets with a sign taken from the hash. Texts sharing
//! words land close together; no model files are needed. Output is not
//! normalized; the [`Normalizer`](super::Normalizer) does that.

use anyhow::Result;
use sha2::{Digest, Sha256};

use super::{EmbeddingProvider, EMBEDDING_DIM};

#[derive(Debug, Default, Clone, Copy)]
pub struct HashingEmbeddingProvider;

impl HashingEmbeddingProvider {
    pub fn new() -> Self {
        Self
    }
}

impl EmbeddingProvider for HashingEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        for token in tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize
                % EMBEDDING_DIM;
            let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        Ok(v)
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn test_dimensions() {
        let provider = HashingEmbeddingProvider::new();
        assert_eq!(provider.embed("hello world").unwrap().len(), EMBEDDING_DIM);
    }

    #[test]
    fn test_deterministic() {
        let provider = HashingEmbeddingProvider::new();
        let a = provider.embed("funny cat video").unwrap();
        let b = provider.embed("funny cat video").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let provider = HashingEmbeddingProvider::new();
        let a = provider.embed("Cat, VIDEO!").unwrap();
        let b = provider.embed("cat video").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shared_words_score_higher() {
        let provider = HashingEmbeddingProvider::new();
        let query = provider.embed("cat").unwrap();
        let cat = provider.embed("funny cat video").unwrap();
        let news = provider.embed("serious news report").unwrap();
        assert!(cosine_similarity(&query, &cat) > cosine_similarity(&query, &news));
    }

    #[test]
    fn test_no_tokens_is_zero_vector() {
        let provider = HashingEmbeddingProvider::new();
        let v = provider.embed("  ... !!").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
