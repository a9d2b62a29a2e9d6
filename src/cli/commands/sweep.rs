//! Retention sweep command handler

use crate::config::Config;

pub async fn cmd_sweep(config: &Config) -> anyhow::Result<()> {
    let lifecycle = crate::build_lifecycle(config).await?;
    let deleted = lifecycle.sweep_retention().await?;

    println!(
        "✓ Deleted {deleted} offers posted more than {} days ago",
        config.lifecycle.retention_days
    );
    Ok(())
}
