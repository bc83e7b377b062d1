pub mod add;
pub mod clear;
pub mod import;
pub mod search;
pub mod seed;
pub mod stats;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use recall::config::{EmbeddingConfig, RecallConfig};
use recall::embedding::{self, Normalizer};
use recall::{Backend, MemoryService};

const MODEL_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/onnx/model.onnx";
const TOKENIZER_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json";

/// Compose the memory service described by `config`.
///
/// Write commands pass `eager_embedding` so a missing model fails up front
/// instead of storing zero fingerprints; read commands build the provider
/// lazily on the first query that needs it.
pub fn open_service(config: &RecallConfig, eager_embedding: bool) -> Result<Arc<MemoryService>> {
    let backend: Backend = config
        .storage
        .backend
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let data_dir = config.resolved_data_dir();
    let normalizer = if eager_embedding {
        let provider = embedding::create_provider(&config.embedding)?;
        Normalizer::new(Arc::from(provider))
    } else {
        embedding::lazy_normalizer(&config.embedding)
    };
    let service = MemoryService::with_backend(normalizer, backend, &data_dir);
    tracing::debug!(
        data_dir = %data_dir.display(),
        strategy = service.strategy(),
        "memory service ready"
    );
    Ok(Arc::new(service))
}

/// Download the ONNX embedding model and tokenizer to the cache directory.
pub async fn model_download(config: &EmbeddingConfig) -> Result<()> {
    let cache_dir = recall::config::expand_tilde(&config.cache_dir);
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("failed to create cache dir: {}", cache_dir.display()))?;

    let model_path = cache_dir.join("model.onnx");
    let tokenizer_path = cache_dir.join("tokenizer.json");

    if model_path.exists() {
        println!("Model already exists at {}", model_path.display());
    } else {
        println!("Downloading model.onnx (~90MB)...");
        download_file(MODEL_URL, &model_path).await?;
        println!("Model saved to {}", model_path.display());
    }

    if tokenizer_path.exists() {
        println!("Tokenizer already exists at {}", tokenizer_path.display());
    } else {
        println!("Downloading tokenizer.json...");
        download_file(TOKENIZER_URL, &tokenizer_path).await?;
        println!("Tokenizer saved to {}", tokenizer_path.display());
    }

    println!("Model download complete. Ready for use.");
    Ok(())
}

/// Stream a URL to `dest` with a progress bar, writing to a temp file first
/// and renaming into place once complete.
async fn download_file(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download failed with HTTP {}",
        response.status()
    );

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
                    .expect("valid template")
                    .progress_chars("##-"),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("part");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        file.write_all(&chunk)
            .await
            .context("error writing to file")?;
        pb.inc(chunk.len() as u64);
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to move download into place")?;

    pb.finish_and_clear();
    Ok(())
}
