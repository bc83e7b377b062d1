#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use recall::embedding::hashing::HashingEmbeddingProvider;
use recall::embedding::{EmbeddingProvider, Normalizer, EMBEDDING_DIM};
use recall::{Backend, MemoryService};

pub const BACKENDS: [Backend; 2] = [Backend::Sqlite, Backend::Memory];

/// Service backed by the deterministic hashing embedder.
pub fn hashing_service(backend: Backend, dir: &Path) -> MemoryService {
    let normalizer = Normalizer::new(Arc::new(HashingEmbeddingProvider::new()));
    MemoryService::with_backend(normalizer, backend, dir)
}

/// Service whose embedder returns hand-picked vectors for known texts.
pub fn scripted_service(backend: Backend, dir: &Path, script: ScriptedEmbedder) -> MemoryService {
    MemoryService::with_backend(Normalizer::new(Arc::new(script)), backend, dir)
}

/// Embedder that maps exact texts to fixed vectors and fails on anything else.
#[derive(Default)]
pub struct ScriptedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
}

impl ScriptedEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }
}

impl EmbeddingProvider for ScriptedEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no scripted vector for {text:?}"))
    }
}

/// 384-dim vector with a single spike at position `dim`.
pub fn spike(dim: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[dim % EMBEDDING_DIM] = 1.0;
    v
}

/// Unit vector whose cosine similarity to `spike(0)` is `cos`.
pub fn at_cosine(cos: f32) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[0] = cos;
    v[1] = (1.0 - cos * cos).max(0.0).sqrt();
    v
}
