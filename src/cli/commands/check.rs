//! Check command handler

use crate::config::Config;
use crate::services::CycleOutcome;

pub async fn cmd_check(config: &Config) -> anyhow::Result<()> {
    let lifecycle = crate::build_lifecycle(config).await?;
    let queries = lifecycle.store().list_queries().await?;

    if queries.is_empty() {
        println!("No queries stored.");
        println!();
        println!("Add one with: jobfeed add golang berlin");
        return Ok(());
    }

    println!("Checking {} queries", queries.len());
    println!("{:-<70}", "");

    for query in queries {
        let outcome = lifecycle.run_cycle(query.id).await;
        let summary = match outcome {
            CycleOutcome::Completed { offers } => format!("✓ {offers} offers"),
            CycleOutcome::Expired => "expired, deleted".to_string(),
            CycleOutcome::RetryScheduled => "✗ transient failure, try again later".to_string(),
            CycleOutcome::Failed => "✗ failed, see logs".to_string(),
            CycleOutcome::Missing => "gone".to_string(),
        };
        println!("#{} \"{}\" @ \"{}\": {summary}", query.id, query.keywords, query.location);
    }

    Ok(())
}
