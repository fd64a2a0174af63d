//! # Review Pipeline
//!
//! An incremental scrape-and-load pipeline for customer reviews, with a
//! sentiment serving API.
//!
//! Review listings are scraped one relative time window per run, written to
//! dated JSON batch files, and bulk-loaded into a search index; company
//! metadata is scraped once into a CSV snapshot and upserted into a small
//! relational schema. Both load paths are idempotent — the review loader
//! skips batch files at or before the latest loaded date, the metadata
//! loader short-circuits on an unchanged snapshot fingerprint — so the whole
//! pipeline can be re-run safely by an external scheduler.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ Review pages │──▶│ Batch files   │──▶│ Search index │
//! │ (per window) │   │ YYYYMMDD.json│   │ (bulk load)  │
//! └──────┬───────┘   └──────────────┘   └──────┬──────┘
//!        │ window cursor                       │
//! ┌──────▼───────┐   ┌──────────────┐   ┌──────▼──────┐
//! │ Profile pages│──▶│ CSV snapshot │──▶│   SQLite     │
//! │  (metadata)  │   │ (fingerprint)│   │  (upserts)   │
//! └──────────────┘   └──────────────┘   └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | Pure field normalizers |
//! | [`window`] | Rotating scrape-window state machine |
//! | [`scrape_reviews`] | Paginated review scraping |
//! | [`scrape_metadata`] | Company profile scraping |
//! | [`load_reviews`] | Incremental search-index loader |
//! | [`load_metadata`] | Fingerprint-gated relational loader |
//! | [`search_index`] | Search-engine REST client |
//! | [`sentiment`] | Text cleaning and classifier seam |
//! | [`server`] | Serving API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema setup |

pub mod config;
pub mod db;
pub mod load_metadata;
pub mod load_reviews;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod scrape_metadata;
pub mod scrape_reviews;
pub mod search_index;
pub mod sentiment;
pub mod server;
pub mod status;
pub mod window;
