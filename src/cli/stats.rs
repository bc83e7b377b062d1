use anyhow::Result;

use recall::config::RecallConfig;

/// Display memory statistics for one user.
pub fn stats(config: &RecallConfig, user: &str) -> Result<()> {
    let service = super::open_service(config, false)?;

    let records = service.memory_count(user);
    let fingerprints = service.fingerprint_count(user);

    println!("Memory Statistics for {user}");
    println!("{}", "=".repeat(40));
    println!("  Index strategy:      {}", service.strategy());
    println!("  Data directory:      {}", config.resolved_data_dir().display());
    println!("  Memories:            {records}");
    println!("  Fingerprints:        {fingerprints}");
    if records != fingerprints {
        println!("  WARNING: stores out of sync; the next add will reconcile them.");
    }

    Ok(())
}
