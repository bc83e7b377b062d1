//! Sentence embeddings from a local all-MiniLM-L6-v2 ONNX export.
//!
//! The provider returns mean-pooled token embeddings as-is; the
//! [`Normalizer`](super::Normalizer) turns them into unit fingerprints.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

use super::{EmbeddingProvider, EMBEDDING_DIM};
use crate::config::EmbeddingConfig;

/// Token budget per summary. MiniLM was trained on 256-token inputs.
const MAX_TOKENS: usize = 256;

/// Output names seen across sentence-transformers ONNX exports.
const OUTPUT_NAMES: [&str; 2] = ["token_embeddings", "last_hidden_state"];

/// The two files `recall model download` fetches.
struct ModelFiles {
    model: PathBuf,
    tokenizer: PathBuf,
}

impl ModelFiles {
    fn locate(config: &EmbeddingConfig) -> Result<Self> {
        let dir = crate::config::expand_tilde(&config.cache_dir);
        let files = Self {
            model: dir.join("model.onnx"),
            tokenizer: dir.join("tokenizer.json"),
        };
        for path in [&files.model, &files.tokenizer] {
            anyhow::ensure!(
                path.exists(),
                "{} is missing. Run `recall model download` first.",
                path.display()
            );
        }
        Ok(files)
    }
}

pub struct LocalEmbeddingProvider {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

// Session is only touched through the Mutex; Tokenizer is Send + Sync.
unsafe impl Send for LocalEmbeddingProvider {}
unsafe impl Sync for LocalEmbeddingProvider {}

impl LocalEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let files = ModelFiles::locate(config)?;
        let session = load_session(&files.model)?;
        let tokenizer = load_tokenizer(&files.tokenizer)?;
        tracing::info!(
            model = %files.model.display(),
            name = %config.model,
            "local embedding model ready"
        );
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }

    fn encode(&self, texts: &[&str]) -> Result<Vec<Encoding>> {
        self.tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))
    }
}

fn load_session(path: &Path) -> Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(4)?
        .commit_from_file(path)
        .with_context(|| format!("failed to load ONNX model from {}", path.display()))
}

fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| anyhow::anyhow!("failed to load tokenizer {}: {e}", path.display()))?;
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: MAX_TOKENS,
            ..Default::default()
        }))
        .map_err(|e| anyhow::anyhow!("failed to configure truncation: {e}"))?;
    // Pad to the longest text so the batch forms one rectangular tensor.
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        ..Default::default()
    }));
    Ok(tokenizer)
}

/// Row-major `[batch, tokens]` model inputs.
struct BatchInputs {
    batch: usize,
    tokens: usize,
    ids: Vec<i64>,
    mask: Vec<i64>,
}

impl BatchInputs {
    fn from_encodings(encodings: &[Encoding]) -> Self {
        let tokens = encodings.first().map_or(0, |e| e.get_ids().len());
        let ids = encodings
            .iter()
            .flat_map(|e| e.get_ids().iter().map(|&id| i64::from(id)))
            .collect();
        let mask = encodings
            .iter()
            .flat_map(|e| e.get_attention_mask().iter().map(|&m| i64::from(m)))
            .collect();
        Self {
            batch: encodings.len(),
            tokens,
            ids,
            mask,
        }
    }

    fn shape(&self) -> Vec<i64> {
        vec![self.batch as i64, self.tokens as i64]
    }
}

/// Average each row's hidden states over its unmasked tokens.
///
/// `hidden` is `[batch, tokens, dim]` row-major and `mask` is `[batch, tokens]`.
/// A row with no unmasked tokens pools to all zeros.
fn mean_pool(
    hidden: &[f32],
    mask: &[i64],
    batch: usize,
    tokens: usize,
    dim: usize,
) -> Vec<Vec<f32>> {
    (0..batch)
        .map(|b| {
            let mut pooled = vec![0.0f32; dim];
            let mut weight = 0.0f32;
            for t in 0..tokens {
                let m = mask[b * tokens + t] as f32;
                if m == 0.0 {
                    continue;
                }
                let row = &hidden[(b * tokens + t) * dim..][..dim];
                for (acc, x) in pooled.iter_mut().zip(row) {
                    *acc += x * m;
                }
                weight += m;
            }
            if weight > 0.0 {
                pooled.iter_mut().for_each(|x| *x /= weight);
            }
            pooled
        })
        .collect()
}

impl EmbeddingProvider for LocalEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .pop()
            .context("model returned no embedding")
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let inputs = BatchInputs::from_encodings(&self.encode(texts)?);
        let shape = inputs.shape();
        let input_ids =
            Tensor::from_array((shape.clone(), inputs.ids.clone().into_boxed_slice()))?;
        let attention_mask =
            Tensor::from_array((shape.clone(), inputs.mask.clone().into_boxed_slice()))?;
        // Single-segment inputs
        let token_type_ids = Tensor::from_array((
            shape,
            vec![0i64; inputs.batch * inputs.tokens].into_boxed_slice(),
        ))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("session lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs! {
            "input_ids" => input_ids,
            "attention_mask" => attention_mask,
            "token_type_ids" => token_type_ids,
        })?;

        let hidden = OUTPUT_NAMES
            .iter()
            .find_map(|name| outputs.get(*name))
            .or_else(|| (outputs.len() != 0).then(|| &outputs[0]))
            .context("model produced no outputs")?;
        let (dims, data) = hidden
            .try_extract_tensor::<f32>()
            .context("failed to read hidden states")?;

        let dims: &[i64] = &dims;
        anyhow::ensure!(
            dims == [inputs.batch as i64, inputs.tokens as i64, EMBEDDING_DIM as i64],
            "unexpected hidden state shape {dims:?} for batch {}x{}",
            inputs.batch,
            inputs.tokens
        );

        Ok(mean_pool(data, &inputs.mask, inputs.batch, inputs.tokens, EMBEDDING_DIM))
    }
}
