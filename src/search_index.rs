//! Search-engine REST client.
//!
//! Talks to the cluster through its documented HTTP APIs only: index
//! existence checks, index creation with an explicit mapping, the
//! newline-delimited bulk endpoint, and `_search` queries. Requests are
//! synchronous from the pipeline's point of view, carry basic auth and a
//! bounded timeout, and are never retried.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Certificate, Client};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::SearchConfig;
use crate::models::Comment;

#[derive(Debug)]
pub struct SearchIndex {
    base_url: String,
    index: String,
    username: String,
    password: String,
    client: Client,
}

impl SearchIndex {
    /// Build a client from configuration.
    ///
    /// Missing connection parameters are a fatal configuration error,
    /// surfaced before any network call is attempted.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        if config.url.trim().is_empty()
            || config.username.trim().is_empty()
            || config.password.trim().is_empty()
        {
            bail!("missing search connection parameters: search.url, search.username and search.password are required");
        }

        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));

        if let Some(ca_path) = &config.ca_cert {
            let pem = std::fs::read(ca_path)
                .with_context(|| format!("Failed to read CA certificate: {}", ca_path.display()))?;
            builder = builder.add_root_certificate(
                Certificate::from_pem(&pem).with_context(|| "Invalid CA certificate")?,
            );
        }

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            client: builder.build()?,
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Verify the target index exists, creating it with the explicit field
    /// mapping when absent. Check-before-create: the incremental path never
    /// deletes or recreates an existing index.
    ///
    /// Returns `true` if the index was created by this call.
    pub async fn ensure_index(&self) -> Result<bool> {
        let url = self.url(&self.index);
        let head = self
            .client
            .head(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .with_context(|| format!("HEAD {} failed", url))?;

        if head.status().is_success() {
            return Ok(false);
        }

        let resp = self
            .client
            .put(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&index_settings())
            .send()
            .await
            .with_context(|| format!("PUT {} failed", url))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!(
                "index creation failed: PUT {} -> {}: {}",
                url,
                status,
                truncate(&body, 300)
            );
        }

        Ok(true)
    }

    /// The most recent `scraping_date` across all loaded documents, or
    /// `None` when nothing has been loaded yet.
    pub async fn latest_scraping_date(&self) -> Result<Option<NaiveDate>> {
        let query = json!({
            "size": 1,
            "sort": [{ "scraping_date": { "order": "desc" } }],
            "_source": ["scraping_date"]
        });

        let url = self.url(&format!("{}/_search", self.index));
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&query)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!(
                "latest-date query failed: POST {} -> {}: {}",
                url,
                status,
                truncate(&body, 300)
            );
        }

        let value: Value = serde_json::from_str(&body)
            .with_context(|| "latest-date query returned invalid JSON")?;
        let date = value["hits"]["hits"]
            .as_array()
            .and_then(|hits| hits.first())
            .and_then(|hit| hit["_source"]["scraping_date"].as_str())
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());

        Ok(date)
    }

    /// Submit one newline-delimited bulk payload. The caller builds the
    /// action/document pairs; this reports any HTTP or item-level failure.
    pub async fn bulk(&self, payload: String) -> Result<()> {
        let url = self.url("_bulk");
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(payload)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!(
                "bulk request failed: POST {} -> {}: {}",
                url,
                status,
                truncate(&body, 300)
            );
        }

        // A 200 response can still carry per-item failures
        if let Ok(value) = serde_json::from_str::<Value>(&body) {
            if value["errors"].as_bool() == Some(true) {
                bail!("bulk request reported item errors: {}", truncate(&body, 300));
            }
        }

        Ok(())
    }

    /// The most recent comments for a company, newest review first.
    /// `company` must already be the stored display form.
    pub async fn recent_comments(&self, company: &str, limit: i64) -> Result<Vec<Comment>> {
        let query = json!({
            "size": limit,
            "query": { "term": { "company_name": company } },
            "sort": [{ "review_date_absolute": { "order": "desc" } }],
            "_source": ["headline", "review", "rating", "review_date_absolute"]
        });

        let url = self.url(&format!("{}/_search", self.index));
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&query)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!(
                "comments query failed: POST {} -> {}: {}",
                url,
                status,
                truncate(&body, 300)
            );
        }

        let value: Value =
            serde_json::from_str(&body).with_context(|| "comments query returned invalid JSON")?;
        let comments = value["hits"]["hits"]
            .as_array()
            .map(|hits| {
                hits.iter()
                    .filter_map(|hit| serde_json::from_value(hit["_source"].clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        Ok(comments)
    }
}

/// Index settings and the explicit field mapping for review documents.
fn index_settings() -> Value {
    json!({
        "settings": {
            "index": { "number_of_shards": 1, "number_of_replicas": 0 }
        },
        "mappings": {
            "properties": {
                "company_name": { "type": "keyword" },
                "user_name": { "type": "keyword" },
                "review_count": { "type": "integer" },
                "headline": { "type": "text" },
                "review": { "type": "text" },
                "review_date_absolute": { "type": "date", "format": "yyyy-MM-dd" },
                "response_date": { "type": "date", "format": "yyyy-MM-dd" },
                "rating": { "type": "float" },
                "source": { "type": "keyword" },
                "scraping_date": { "type": "date", "format": "yyyy-MM-dd" },
                "filename": { "type": "keyword" }
            }
        }
    })
}

/// Clamp a response body for log output, staying on a char boundary.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
pub(crate) fn test_index(base_url: &str) -> SearchIndex {
    SearchIndex::from_config(&SearchConfig {
        url: base_url.to_string(),
        index: "reviews".to_string(),
        username: "elastic".to_string(),
        password: "secret".to_string(),
        ca_cert: None,
        timeout_secs: 5,
    })
    .expect("test client")
}
