//! CLI `add` command: store one memory.

use anyhow::Result;

use recall::config::RecallConfig;

pub async fn add(
    config: &RecallConfig,
    user: &str,
    title: &str,
    summary: &str,
    url: &str,
) -> Result<()> {
    let service = super::open_service(config, true)?;

    let (user_id, title_owned, summary_owned, url_owned) =
        (user.to_string(), title.to_string(), summary.to_string(), url.to_string());
    let position = tokio::task::spawn_blocking(move || {
        service.add_memory(&user_id, &title_owned, &summary_owned, &url_owned)
    })
    .await??;

    println!("Added \"{title}\" to memory for {user} (position {position}).");
    Ok(())
}
