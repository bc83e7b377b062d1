use anyhow::Result;

use recall::config::RecallConfig;

/// Run a search from the terminal.
pub async fn search(
    config: &RecallConfig,
    user: &str,
    query: &str,
    k: Option<usize>,
) -> Result<()> {
    let service = super::open_service(config, false)?;
    let k = k.unwrap_or(config.retrieval.default_top_k).clamp(1, 50);

    let (user_id, query_text) = (user.to_string(), query.to_string());
    let results =
        tokio::task::spawn_blocking(move || service.search_memory(&user_id, &query_text, k))
            .await?;

    if results.is_empty() {
        println!("No matches found. Try describing the topic, people, or mood more clearly.");
        return Ok(());
    }

    println!("Top {} match(es):\n", results.len());

    for result in &results {
        let preview: String = if result.summary.chars().count() > 160 {
            let head: String = result.summary.chars().take(160).collect();
            format!("{head}...")
        } else {
            result.summary.clone()
        };

        println!("  {}. {} (score: {:.4})", result.rank, result.title, result.score);
        println!("     {}", result.source_url);
        println!("     {}", preview);
        if let Some(ref thumbnail) = result.thumbnail_url {
            println!("     thumbnail: {thumbnail}");
        }
        println!();
    }

    Ok(())
}
