//! Add query command handler

use crate::config::Config;
use crate::scheduler::QueryScheduler;

pub async fn cmd_add_query(config: &Config, keywords: &str, location: &str) -> anyhow::Result<()> {
    let keywords = keywords.trim().to_lowercase();
    let location = location.trim().to_lowercase();
    if keywords.is_empty() || location.is_empty() {
        anyhow::bail!("Keywords and location cannot be empty");
    }

    let lifecycle = crate::build_lifecycle(config).await?;
    let scheduler = QueryScheduler::new(lifecycle.clone(), config.scheduler.clone()).await?;

    let created = scheduler.create_and_schedule(&keywords, &location).await?;
    // Lets a first run that outlived the wait finish before the process exits.
    scheduler.shutdown().await?;

    if !created {
        println!("Query \"{keywords}\" @ \"{location}\" already exists.");
        return Ok(());
    }

    let query = lifecycle.store().get_query(&keywords, &location).await?;
    let since = chrono::Utc::now().date_naive()
        - chrono::Duration::days(config.lifecycle.feed_window_days);
    let offers = lifecycle.store().list_offers(query.id, since).await?;

    println!("✓ Added query #{}: \"{keywords}\" @ \"{location}\"", query.id);
    println!("  {} offers in the current feed", offers.len());
    for offer in offers.iter().take(10) {
        println!(
            "  • {} at {} ({}, posted {})",
            offer.title, offer.company, offer.location, offer.posted_at
        );
    }

    Ok(())
}
