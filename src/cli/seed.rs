use anyhow::Result;

use recall::config::RecallConfig;

/// Add the demo videos for `user`. Their fingerprints are random, so search
/// results against them are not meaningful.
pub fn seed(config: &RecallConfig, user: &str) -> Result<()> {
    let service = super::open_service(config, false)?;
    let added = service.seed_demo_data(user)?;
    println!("Seeded {added} demo memories for {user}.");
    Ok(())
}
