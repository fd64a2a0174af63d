//! Core data models shared across the pipeline.
//!
//! These types mirror the on-disk batch/snapshot formats and the documents
//! stored in the search index.

use serde::{Deserialize, Serialize};

/// One scraped review as written to a daily batch file.
///
/// `review_id` is `<company-slug>-<sequence>`, unique within a batch.
/// Date fields keep the raw `YYYY-MM-DD` strings lifted from the page;
/// normalization happens at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub review_id: String,
    pub company_name: String,
    pub user_name: String,
    pub review_count: String,
    pub review_date_absolute: Option<String>,
    pub response_date: Option<String>,
    pub headline: String,
    pub comment_text: String,
    pub stars: Option<i64>,
}

/// A review projected into the search-index document shape.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewDocument {
    pub company_name: String,
    pub user_name: String,
    pub review_count: i64,
    pub headline: String,
    pub review: String,
    pub review_date_absolute: Option<String>,
    pub response_date: Option<String>,
    pub rating: f64,
    pub source: String,
    pub scraping_date: String,
    pub filename: String,
}

/// One company metadata record, one CSV snapshot row.
///
/// Field names match the snapshot header so the same struct serializes the
/// scrape output and deserializes the loader input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyMetadata {
    pub id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "numberOfReviews")]
    pub number_of_reviews: i64,
    #[serde(rename = "trustScore")]
    pub trust_score: f64,
    #[serde(rename = "websiteUrl")]
    pub website_url: Option<String>,
    pub stars: f64,
    pub category: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    #[serde(rename = "zipCode")]
    pub zip_code: Option<String>,
    pub five_star_percentage: String,
    pub four_star_percentage: String,
    pub three_star_percentage: String,
    pub two_star_percentage: String,
    pub one_star_percentage: String,
}

/// A comment row returned by the serving API's listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub headline: Option<String>,
    pub review: Option<String>,
    pub rating: Option<f64>,
    pub review_date_absolute: Option<String>,
}
