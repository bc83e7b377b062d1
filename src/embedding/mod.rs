//! Text-to-vector embedding pipeline.
//!
//! [`EmbeddingProvider`] is the raw backend seam: it may fail, and its output is
//! not trusted. [`Normalizer`] wraps a provider and turns every call into a
//! [`Fingerprint`] that is either a unit vector or the zero sentinel.

pub mod fingerprint;
pub mod hashing;
pub mod local;

use anyhow::Result;

pub use fingerprint::{cosine_similarity, Fingerprint, Normalizer};

/// Number of dimensions in every fingerprint (all-MiniLM-L6-v2).
pub const EMBEDDING_DIM: usize = 384;

/// Trait for embedding text into raw vectors.
///
/// Implementations should produce [`EMBEDDING_DIM`] components; the
/// [`Normalizer`] rejects anything else. All methods are synchronous, so
/// callers in async contexts should use `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Return the number of dimensions this provider produces.
    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Create an embedding provider from config.
///
/// `"local"` loads the ONNX model (run `recall model download` first);
/// `"hashing"` needs no model files.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => {
            let provider = local::LocalEmbeddingProvider::new(config)?;
            Ok(Box::new(provider))
        }
        "hashing" => Ok(Box::new(hashing::HashingEmbeddingProvider::new())),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local, hashing"),
    }
}

/// Build a [`Normalizer`] that creates the configured provider on first use.
pub fn lazy_normalizer(config: &crate::config::EmbeddingConfig) -> Normalizer {
    let config = config.clone();
    Normalizer::lazy(move || create_provider(&config))
}
