use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::path::Path;

use recall::config::RecallConfig;

/// One already-extracted history entry.
#[derive(Debug, Deserialize)]
struct ImportEntry {
    title: String,
    #[serde(default)]
    summary: String,
    url: String,
}

/// Import `(title, summary, url)` entries from a JSON array.
///
/// With `replace`, the user's existing memory is cleared first.
pub async fn import(config: &RecallConfig, user: &str, file: &Path, replace: bool) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read import file: {}", file.display()))?;

    let entries: Vec<ImportEntry> =
        serde_json::from_str(&json).context("failed to parse import JSON")?;

    let (usable, skipped): (Vec<ImportEntry>, Vec<ImportEntry>) = entries
        .into_iter()
        .partition(|e| !e.title.trim().is_empty() && !e.url.trim().is_empty());

    let service = super::open_service(config, true)?;
    if replace {
        service.clear_memory(user)?;
    }

    println!("Importing {} memories for {user}...", usable.len());

    let pb = ProgressBar::new(usable.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} ({eta})")
            .expect("valid template")
            .progress_chars("##-"),
    );

    // Entries without a summary are embedded from their title.
    let triples: Vec<(String, String, String)> = usable
        .into_iter()
        .map(|e| {
            let summary = if e.summary.trim().is_empty() {
                e.title.clone()
            } else {
                e.summary
            };
            (e.title, summary, e.url)
        })
        .collect();

    let user_id = user.to_string();
    let progress = pb.clone();
    let imported = tokio::task::spawn_blocking(move || {
        service.add_memories_with_progress(&user_id, triples, |_| progress.inc(1))
    })
    .await??;

    pb.finish_and_clear();

    println!("Import complete:");
    println!("  Memories imported: {imported}");
    if !skipped.is_empty() {
        println!("  Entries skipped:   {} (missing title or url)", skipped.len());
    }

    Ok(())
}
