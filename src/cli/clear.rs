//! CLI `clear` command: delete one user's memories after confirmation.

use anyhow::{bail, Result};
use std::io::Write;

use recall::config::RecallConfig;

pub fn clear(config: &RecallConfig, user: &str, yes: bool) -> Result<()> {
    let service = super::open_service(config, false)?;
    let count = service.memory_count(user);

    if count == 0 {
        println!("No memory to clear for {user}.");
        // Still remove any stray artifacts.
        service.clear_memory(user)?;
        return Ok(());
    }

    if !yes {
        println!("WARNING: This will permanently delete {count} memories for {user}.");
        print!("\nType YES to confirm: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim() != "YES" {
            bail!("clear cancelled");
        }
    }

    service.clear_memory(user)?;
    println!("Memory cleared for {user}.");
    Ok(())
}
