//! List queries command handler

use crate::config::Config;
use crate::db::Store;

pub async fn cmd_list_queries(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let queries = store.list_queries().await?;

    if queries.is_empty() {
        println!("No queries stored.");
        println!();
        println!("Add one with: jobfeed add golang berlin");
        return Ok(());
    }

    println!("Queries ({} total)", queries.len());
    println!("{:-<70}", "");

    for query in queries {
        let updated = query
            .updated_at
            .map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());

        println!("#{} \"{}\" @ \"{}\"", query.id, query.keywords, query.location);
        println!(
            "  Created: {} | Last read: {} | Last scraped: {}",
            query.created_at.format("%Y-%m-%d %H:%M"),
            query.queried_at.format("%Y-%m-%d %H:%M"),
            updated
        );
    }

    Ok(())
}
