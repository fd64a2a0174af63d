//! Time-windowed review scraper.
//!
//! For the current scrape window, walks the paginated review listing of
//! every tracked company, extracts structured review records from the page
//! cards, and writes one dated batch file. A 404, a request error, or a page
//! without extractable cards ends pagination for that company only — partial
//! failure never discards records already collected from other companies.
//! The window cursor advances after the batch file is written.

use anyhow::{Context, Result};
use rand::Rng;
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use crate::config::{Config, ScrapeConfig};
use crate::db;
use crate::models::Review;
use crate::normalize::{capitalize, clean_text_node, company_slug};
use crate::window::{self, ScrapeWindow};

const USER_AGENT: &str = "Mozilla/5.0";

struct CardSelectors {
    card: Selector,
    user: Selector,
    review_count: Selector,
    headline: Selector,
    comment: Selector,
    rating: Selector,
    date: Selector,
    reply_time: Selector,
}

impl CardSelectors {
    fn get() -> &'static CardSelectors {
        static SELECTORS: OnceLock<CardSelectors> = OnceLock::new();
        SELECTORS.get_or_init(|| CardSelectors {
            card: Selector::parse("article[data-service-review-card-paper='true']").unwrap(),
            user: Selector::parse("[data-consumer-name-typography='true']").unwrap(),
            review_count: Selector::parse("[data-consumer-reviews-count]").unwrap(),
            headline: Selector::parse("a[data-review-title-typography='true']").unwrap(),
            comment: Selector::parse("p[data-service-review-text-typography='true']").unwrap(),
            rating: Selector::parse("div[data-service-review-rating]").unwrap(),
            date: Selector::parse("time[data-service-review-date-time-ago='true']").unwrap(),
            reply_time: Selector::parse("div[class*='replyInfo'] time").unwrap(),
        })
    }
}

/// Scrape every tracked company for the current window, write the batch
/// file, and rotate the window. Returns the batch file path.
pub async fn run_scrape_reviews(config: &Config) -> Result<PathBuf> {
    let pool = db::connect(config).await?;
    let current = window::current_window(&pool).await?;
    println!("scrape-reviews (window: {})", current);

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.scrape.timeout_secs))
        .build()?;

    let mut all_reviews = Vec::new();

    for company in &config.scrape.companies {
        let slug = company_slug(company);
        println!("  company: {}", company);

        let mut sequence = 1u32;
        for page in 1..=config.scrape.max_pages {
            let url = page_url(&config.scrape, company, current, page);

            let resp = match client.get(&url).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    eprintln!("  warning: request failed for {}: {}", url, e);
                    break;
                }
            };
            if resp.status() == StatusCode::NOT_FOUND {
                println!("  {}: page {} not found, stopping", slug, page);
                break;
            }
            let body = match resp.error_for_status() {
                Ok(resp) => match resp.text().await {
                    Ok(body) => body,
                    Err(e) => {
                        eprintln!("  warning: failed to read {}: {}", url, e);
                        break;
                    }
                },
                Err(e) => {
                    eprintln!("  warning: {} returned an error status: {}", url, e);
                    break;
                }
            };

            let reviews = extract_reviews(&body, &slug, &mut sequence);
            if reviews.is_empty() {
                // No more reviews for this window/company
                break;
            }
            println!("  {}: page {}: {} reviews", slug, page, reviews.len());
            all_reviews.extend(reviews);

            // Stay within acceptable request rates
            let delay = rand::thread_rng()
                .gen_range(config.scrape.min_delay_ms..=config.scrape.max_delay_ms);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }

    let path = write_batch(&config.storage.batch_dir, &all_reviews)?;
    println!(
        "  wrote {} reviews to {}",
        all_reviews.len(),
        path.display()
    );

    let next = window::advance_window(&pool, current).await?;
    println!("  next window: {}", next);

    pool.close().await;
    Ok(path)
}

/// Build the listing URL for one company page within a window.
fn page_url(scrape: &ScrapeConfig, company: &str, window: ScrapeWindow, page: u32) -> String {
    let mut params = Vec::new();
    if let Some(date) = window.date_param() {
        params.push(format!("date={}", date));
    }
    if !scrape.languages.is_empty() {
        params.push(format!("languages={}", scrape.languages));
    }
    if scrape.verified_only {
        params.push("verified=true".to_string());
    }
    params.push(format!("page={}", page));

    format!(
        "{}/{}?{}",
        scrape.base_url.trim_end_matches('/'),
        company,
        params.join("&")
    )
}

/// Extract review records from one listing page.
///
/// Cards with no headline, no comment and no star rating carry no usable
/// content and are dropped. `sequence` numbers the kept reviews across all
/// pages of one company.
pub fn extract_reviews(html: &str, slug: &str, sequence: &mut u32) -> Vec<Review> {
    let sel = CardSelectors::get();
    let doc = Html::parse_document(html);
    let mut reviews = Vec::new();

    for card in doc.select(&sel.card) {
        let user_name = card
            .select(&sel.user)
            .next()
            .map(|el| clean_text_node(&el.text().collect::<String>()))
            .unwrap_or_default();

        let review_count = card
            .select(&sel.review_count)
            .next()
            .and_then(|el| el.value().attr("data-consumer-reviews-count"))
            .map(|count| format!("{} reviews", count))
            .unwrap_or_default();

        let headline = card
            .select(&sel.headline)
            .next()
            .map(|el| clean_text_node(&el.text().collect::<String>()))
            .unwrap_or_default();

        let comment_text = card
            .select(&sel.comment)
            .next()
            .map(|el| clean_text_node(&el.text().collect::<String>()))
            .unwrap_or_default();

        let stars = card
            .select(&sel.rating)
            .next()
            .and_then(|el| el.value().attr("data-service-review-rating"))
            .and_then(|v| v.parse::<i64>().ok());

        let review_date_absolute = datetime_prefix(card.select(&sel.date).next());
        let response_date = datetime_prefix(card.select(&sel.reply_time).next());

        if headline.is_empty() && comment_text.is_empty() && stars.is_none() {
            // No usable content
            continue;
        }

        let review_id = format!("{}-{:05}", slug, sequence);
        *sequence += 1;

        reviews.push(Review {
            review_id,
            company_name: capitalize(slug),
            user_name,
            review_count,
            review_date_absolute,
            response_date,
            headline,
            comment_text,
            stars,
        });
    }

    reviews
}

/// First ten characters of a `datetime` attribute (`YYYY-MM-DD`).
fn datetime_prefix(element: Option<ElementRef>) -> Option<String> {
    element
        .and_then(|el| el.value().attr("datetime"))
        .and_then(|dt| dt.get(..10))
        .map(str::to_string)
}

/// Write the day's batch file atomically: temp file in the drop directory,
/// then rename. A same-day rerun replaces the existing batch, keeping the
/// at-most-one-file-per-day invariant.
fn write_batch(batch_dir: &Path, reviews: &[Review]) -> Result<PathBuf> {
    std::fs::create_dir_all(batch_dir)
        .with_context(|| format!("Failed to create batch directory {}", batch_dir.display()))?;

    let filename = format!("{}.json", chrono::Local::now().format("%Y%m%d"));
    let path = batch_dir.join(&filename);
    let tmp_path = batch_dir.join(format!("{}.tmp", filename));

    let body = serde_json::to_vec_pretty(reviews)?;
    std::fs::write(&tmp_path, body)
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, &path)
        .with_context(|| format!("Failed to move batch file into place at {}", path.display()))?;

    Ok(path)
}
