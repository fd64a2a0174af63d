//! Incremental review loader.
//!
//! Replays the batch-file drop directory into the search index. The only
//! ordering key is the 8-digit date in each filename: anything dated at or
//! before the most recent `scraping_date` already in the index is skipped,
//! so re-running with unchanged inputs loads nothing. There is no
//! transaction across files — a failed file is reported and the rest still
//! load, and the date check keeps the retry safe.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::models::{Review, ReviewDocument};
use crate::normalize::{extract_numeric, normalize_date};
use crate::search_index::SearchIndex;

const SOURCE: &str = "trustpilot";
const DATE_FMT: &str = "%Y-%m-%d";

/// Per-run load report. `loaded == 0 && failed == 0` is the explicit
/// no-op outcome, not an error.
#[derive(Debug, Default)]
pub struct LoadSummary {
    pub last_loaded: Option<NaiveDate>,
    pub loaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub documents: usize,
}

pub async fn run_load_reviews(config: &Config) -> Result<LoadSummary> {
    let index = SearchIndex::from_config(&config.search)?;

    if index.ensure_index().await? {
        println!("created index '{}'", index.index_name());
    } else {
        println!("index '{}' already exists", index.index_name());
    }

    load_pending(&index, &config.storage.batch_dir).await
}

/// Load every batch file newer than the latest loaded date.
pub async fn load_pending(index: &SearchIndex, batch_dir: &Path) -> Result<LoadSummary> {
    let last_loaded = index.latest_scraping_date().await?;
    match last_loaded {
        Some(date) => println!("last loaded batch date: {}", date.format(DATE_FMT)),
        None => println!("no documents loaded yet"),
    }

    let mut summary = LoadSummary {
        last_loaded,
        ..Default::default()
    };

    let mut batches = list_batch_files(batch_dir)?;
    batches.sort();

    for (date, path) in batches {
        let filename = file_name(&path);

        if let Some(last) = last_loaded {
            if date <= last {
                println!("  already loaded: {}", filename);
                summary.skipped += 1;
                continue;
            }
        }

        match load_batch_file(index, &path, date).await {
            Ok(count) => {
                println!("  loaded {} ({} documents)", filename, count);
                summary.loaded += 1;
                summary.documents += count;
            }
            Err(e) => {
                // One bad file must not block the rest
                eprintln!("  failed to load {}: {:#}", filename, e);
                summary.failed += 1;
            }
        }
    }

    if summary.loaded == 0 && summary.failed == 0 {
        println!("no new batch files - nothing to load");
    }

    Ok(summary)
}

/// Count the batch files dated after `last` (status display).
pub fn pending_count(batch_dir: &Path, last: Option<NaiveDate>) -> usize {
    list_batch_files(batch_dir)
        .map(|batches| {
            batches
                .into_iter()
                .filter(|(date, _)| last.map_or(true, |l| *date > l))
                .count()
        })
        .unwrap_or(0)
}

/// Enumerate the batch files with a parseable date, warning about the rest.
fn list_batch_files(batch_dir: &Path) -> Result<Vec<(NaiveDate, PathBuf)>> {
    let mut batches = Vec::new();

    let entries = std::fs::read_dir(batch_dir)
        .with_context(|| format!("Failed to read batch directory {}", batch_dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        match batch_date(&file_name(&path)) {
            Some(date) => batches.push((date, path)),
            None => eprintln!(
                "  warning: skipping {}: filename has no 8-digit date prefix",
                file_name(&path)
            ),
        }
    }

    Ok(batches)
}

/// Parse the `YYYYMMDD` prefix of a batch filename.
fn batch_date(filename: &str) -> Option<NaiveDate> {
    let prefix = filename.get(..8)?;
    if !prefix.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(prefix, "%Y%m%d").ok()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read one batch file and submit it as a single bulk request.
async fn load_batch_file(index: &SearchIndex, path: &Path, date: NaiveDate) -> Result<usize> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let reviews: Vec<Review> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid batch file", path.display()))?;

    if reviews.is_empty() {
        return Ok(0);
    }

    let filename = file_name(path);
    let action = json!({ "index": { "_index": index.index_name() } }).to_string();

    let mut payload = String::new();
    for review in &reviews {
        payload.push_str(&action);
        payload.push('\n');
        payload.push_str(&serde_json::to_string(&to_document(review, date, &filename))?);
        payload.push('\n');
    }

    index.bulk(payload).await?;
    Ok(reviews.len())
}

/// Project a batch record into the indexed document shape, normalizing the
/// loosely formatted source fields.
fn to_document(review: &Review, scraping_date: NaiveDate, filename: &str) -> ReviewDocument {
    ReviewDocument {
        company_name: review.company_name.clone(),
        user_name: review.user_name.trim().to_string(),
        review_count: extract_numeric(Some(&review.review_count)),
        headline: review.headline.trim().to_string(),
        review: review.comment_text.trim().to_string(),
        review_date_absolute: normalize_date(review.review_date_absolute.as_deref())
            .map(|d| d.format(DATE_FMT).to_string()),
        response_date: normalize_date(review.response_date.as_deref())
            .map(|d| d.format(DATE_FMT).to_string()),
        rating: review.stars.unwrap_or(0) as f64,
        source: SOURCE.to_string(),
        scraping_date: scraping_date.format(DATE_FMT).to_string(),
        filename: filename.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search_index::test_index;

    fn review(id: &str) -> Review {
        Review {
            review_id: id.to_string(),
            company_name: "Amazon".to_string(),
            user_name: " Claire D. ".to_string(),
            review_count: "1,204 reviews".to_string(),
            review_date_absolute: Some("Jan 5, 2024".to_string()),
            response_date: None,
            headline: "Livraison rapide".to_string(),
            comment_text: "Très satisfaite.".to_string(),
            stars: Some(5),
        }
    }

    fn write_batch_file(dir: &Path, name: &str, reviews: &[Review]) {
        std::fs::write(dir.join(name), serde_json::to_vec(reviews).unwrap()).unwrap();
    }

    #[test]
    fn test_batch_date_parsing() {
        assert_eq!(
            batch_date("20240211.json"),
            NaiveDate::from_ymd_opt(2024, 2, 11)
        );
        assert_eq!(batch_date("notadate.json"), None);
        assert_eq!(batch_date("2024.json"), None);
        assert_eq!(batch_date("99999999.json"), None);
    }

    #[test]
    fn test_to_document_normalizes_fields() {
        let doc = to_document(
            &review("amazon-00001"),
            NaiveDate::from_ymd_opt(2024, 2, 11).unwrap(),
            "20240211.json",
        );
        assert_eq!(doc.review_count, 1204);
        assert_eq!(doc.user_name, "Claire D.");
        assert_eq!(doc.review_date_absolute.as_deref(), Some("2024-01-05"));
        assert_eq!(doc.response_date, None);
        assert_eq!(doc.rating, 5.0);
        assert_eq!(doc.source, "trustpilot");
        assert_eq!(doc.scraping_date, "2024-02-11");
        assert_eq!(doc.filename, "20240211.json");
    }

    #[test]
    fn test_missing_stars_rate_as_zero() {
        let mut r = review("amazon-00002");
        r.stars = None;
        let doc = to_document(
            &r,
            NaiveDate::from_ymd_opt(2024, 2, 11).unwrap(),
            "20240211.json",
        );
        assert_eq!(doc.rating, 0.0);
    }

    #[tokio::test]
    async fn test_only_files_after_last_date_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        write_batch_file(dir.path(), "20240209.json", &[review("a-00001")]);
        write_batch_file(dir.path(), "20240210.json", &[review("a-00002")]);
        write_batch_file(dir.path(), "20240211.json", &[review("a-00003")]);
        write_batch_file(dir.path(), "notadate.json", &[review("a-00004")]);

        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/reviews/_search")
            .with_status(200)
            .with_body(r#"{"hits":{"hits":[{"_source":{"scraping_date":"2024-02-10"}}]}}"#)
            .create_async()
            .await;
        let bulk = server
            .mock("POST", "/_bulk")
            .with_status(200)
            .with_body(r#"{"errors":false,"items":[]}"#)
            .expect(1)
            .create_async()
            .await;

        let index = test_index(&server.url());
        let summary = load_pending(&index, dir.path()).await.unwrap();

        assert_eq!(summary.loaded, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.documents, 1);
        bulk.assert_async().await;
    }

    #[tokio::test]
    async fn test_rerun_with_no_new_files_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        write_batch_file(dir.path(), "20240210.json", &[review("a-00001")]);

        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/reviews/_search")
            .with_status(200)
            .with_body(r#"{"hits":{"hits":[{"_source":{"scraping_date":"2024-02-10"}}]}}"#)
            .create_async()
            .await;
        let bulk = server
            .mock("POST", "/_bulk")
            .expect(0)
            .create_async()
            .await;

        let index = test_index(&server.url());
        let summary = load_pending(&index, dir.path()).await.unwrap();

        assert_eq!(summary.loaded, 0);
        assert_eq!(summary.skipped, 1);
        bulk.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_file_does_not_block_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        // Malformed batch content sorts first, valid file second
        std::fs::write(dir.path().join("20240211.json"), b"not json").unwrap();
        write_batch_file(dir.path(), "20240212.json", &[review("a-00001")]);

        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/reviews/_search")
            .with_status(200)
            .with_body(r#"{"hits":{"hits":[]}}"#)
            .create_async()
            .await;
        let bulk = server
            .mock("POST", "/_bulk")
            .with_status(200)
            .with_body(r#"{"errors":false,"items":[]}"#)
            .expect(1)
            .create_async()
            .await;

        let index = test_index(&server.url());
        let summary = load_pending(&index, dir.path()).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.loaded, 1);
        bulk.assert_async().await;
    }
}
