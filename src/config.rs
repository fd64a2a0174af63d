use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub db: DbConfig,
    pub search: SearchConfig,
    pub scrape: ScrapeConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Drop directory for daily review batch files (`YYYYMMDD.json`).
    pub batch_dir: PathBuf,
    /// Path of the company metadata CSV snapshot.
    pub metadata_csv: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    pub url: String,
    #[serde(default = "default_index")]
    pub index: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Optional CA certificate (PEM) for a self-signed cluster.
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_index() -> String {
    "reviews".to_string()
}
fn default_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScrapeConfig {
    /// Review-page URL prefix; the company domain is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Tracked company domains (e.g. `"www.amazon.fr"`).
    pub companies: Vec<String>,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_languages")]
    pub languages: String,
    #[serde(default = "default_verified_only")]
    pub verified_only: bool,
    /// Bounds of the randomized delay between page fetches.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://www.trustpilot.com/review".to_string()
}
fn default_max_pages() -> u32 {
    5
}
fn default_languages() -> String {
    "fr".to_string()
}
fn default_verified_only() -> bool {
    true
}
fn default_min_delay_ms() -> u64 {
    1500
}
fn default_max_delay_ms() -> u64 {
    3000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Bearer token expected by the serving API.
    pub token: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate scraping
    if config.scrape.companies.is_empty() {
        anyhow::bail!("scrape.companies must list at least one company domain");
    }
    if config.scrape.max_pages == 0 {
        anyhow::bail!("scrape.max_pages must be > 0");
    }
    if config.scrape.min_delay_ms > config.scrape.max_delay_ms {
        anyhow::bail!("scrape.min_delay_ms must be <= scrape.max_delay_ms");
    }

    // Validate search connection
    if config.search.url.trim().is_empty() {
        anyhow::bail!("search.url must not be empty");
    }
    if config.search.timeout_secs == 0 {
        anyhow::bail!("search.timeout_secs must be > 0");
    }

    Ok(config)
}
