//! Operator status report.
//!
//! Shows the idempotence state the loaders will act on next run: the
//! persisted scrape window, the batch files still pending against the
//! index's latest loaded date, and whether a metadata fingerprint is
//! recorded. Works without the search index (degrades to a local view).

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::load_reviews;
use crate::search_index::SearchIndex;
use crate::window;

pub async fn run_status(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    match window::peek_window(&pool).await? {
        Some(value) => println!("scrape window:     {}", value),
        None => println!("scrape window:     (unset - next run starts at last12months)"),
    }

    let fingerprint: Option<String> =
        sqlx::query_scalar("SELECT file_hash FROM metadata_file_state LIMIT 1")
            .fetch_optional(&pool)
            .await
            .unwrap_or(None);
    match fingerprint {
        Some(hash) => println!("metadata loaded:   yes ({}...)", &hash[..12.min(hash.len())]),
        None => println!("metadata loaded:   no"),
    }
    println!(
        "metadata snapshot: {}",
        if config.storage.metadata_csv.exists() {
            "present"
        } else {
            "absent"
        }
    );

    let batch_count = std::fs::read_dir(&config.storage.batch_dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
                .count()
        })
        .unwrap_or(0);
    println!("batch files:       {}", batch_count);

    match SearchIndex::from_config(&config.search) {
        Ok(index) => match index.latest_scraping_date().await {
            Ok(last) => {
                match last {
                    Some(date) => println!("last loaded date:  {}", date.format("%Y-%m-%d")),
                    None => println!("last loaded date:  (no documents loaded)"),
                }
                let pending = load_reviews::pending_count(&config.storage.batch_dir, last);
                println!("pending batches:   {}", pending);
            }
            Err(e) => println!("last loaded date:  search index unreachable ({})", e),
        },
        Err(e) => println!("last loaded date:  {}", e),
    }

    pool.close().await;
    Ok(())
}
