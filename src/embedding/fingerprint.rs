//! Fingerprints and the normalizer that produces them.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use super::{EmbeddingProvider, EMBEDDING_DIM};

/// A fixed-length text fingerprint.
///
/// Always [`EMBEDDING_DIM`] components; either L2-normalized or all zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint(Vec<f32>);

impl Fingerprint {
    /// The "could not be computed" sentinel.
    pub fn zero() -> Self {
        Self(vec![0.0; EMBEDDING_DIM])
    }

    /// Normalize a raw vector. Wrong length, non-finite components, or a zero
    /// norm all yield the sentinel.
    pub fn from_raw(raw: &[f32]) -> Self {
        if raw.len() != EMBEDDING_DIM || raw.iter().any(|x| !x.is_finite()) {
            return Self::zero();
        }
        let norm = l2_norm(raw);
        if norm == 0.0 || !norm.is_finite() {
            return Self::zero();
        }
        Self(raw.iter().map(|x| x / norm).collect())
    }

    /// Rebuild from stored components without renormalizing.
    ///
    /// Returns `None` when the length is wrong.
    pub fn from_stored(components: Vec<f32>) -> Option<Self> {
        (components.len() == EMBEDDING_DIM).then_some(Self(components))
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|x| *x == 0.0)
    }

    pub fn norm(&self) -> f32 {
        l2_norm(&self.0)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity of two vectors. Zero when either norm is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}

type ProviderFactory = Box<dyn Fn() -> anyhow::Result<Box<dyn EmbeddingProvider>> + Send + Sync>;

/// Wraps an [`EmbeddingProvider`] and guarantees a valid [`Fingerprint`] for any input.
///
/// The provider is either handed in ready-made ([`Normalizer::new`]) or built by a
/// factory on first use ([`Normalizer::lazy`]). The factory runs at most once, even
/// under concurrent first calls; if it fails, the failure is remembered and every
/// later call returns the zero sentinel.
pub struct Normalizer {
    factory: Option<ProviderFactory>,
    provider: OnceLock<Option<Arc<dyn EmbeddingProvider>>>,
}

impl Normalizer {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            factory: None,
            provider: OnceLock::from(Some(provider)),
        }
    }

    pub fn lazy<F>(factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn EmbeddingProvider>> + Send + Sync + 'static,
    {
        Self {
            factory: Some(Box::new(factory)),
            provider: OnceLock::new(),
        }
    }

    fn provider(&self) -> Option<&Arc<dyn EmbeddingProvider>> {
        self.provider
            .get_or_init(|| {
                let factory = self.factory.as_ref()?;
                match panic::catch_unwind(AssertUnwindSafe(|| factory())) {
                    Ok(Ok(provider)) => {
                        tracing::info!("embedding provider ready");
                        Some(Arc::from(provider))
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "embedding provider failed to initialize");
                        None
                    }
                    Err(_) => {
                        tracing::warn!("embedding provider panicked during initialization");
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Embed `text` into a fingerprint. Never fails, and a panicking provider
    /// is contained here.
    pub fn embed(&self, text: &str) -> Fingerprint {
        if text.trim().is_empty() {
            return Fingerprint::zero();
        }
        let Some(provider) = self.provider() else {
            return Fingerprint::zero();
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| provider.embed(text)))
            .unwrap_or_else(|_| Err(anyhow::anyhow!("embedding provider panicked")));
        match outcome {
            Ok(raw) => {
                let fingerprint = Fingerprint::from_raw(&raw);
                if fingerprint.is_zero() {
                    tracing::debug!(len = raw.len(), "embedding unusable, using zero fingerprint");
                }
                fingerprint
            }
            Err(e) => {
                tracing::warn!(error = %e, "embedding failed, using zero fingerprint");
                Fingerprint::zero()
            }
        }
    }
}
