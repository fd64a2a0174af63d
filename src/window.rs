//! Rotating scrape-window state machine.
//!
//! Each pipeline run scrapes one relative time window and then rotates the
//! cursor so the next run covers the following window, wrapping after `all`.
//! The cursor survives across runs in a [`StateStore`]; the transition logic
//! itself is pure.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

/// State-table key of the persisted window cursor.
const WINDOW_KEY: &str = "scrape_window";

/// The relative time windows a review page can be filtered by, in rotation
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeWindow {
    Last12Months,
    Last6Months,
    Last3Months,
    Last30Days,
    All,
}

pub const WINDOW_ORDER: [ScrapeWindow; 5] = [
    ScrapeWindow::Last12Months,
    ScrapeWindow::Last6Months,
    ScrapeWindow::Last3Months,
    ScrapeWindow::Last30Days,
    ScrapeWindow::All,
];

impl ScrapeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeWindow::Last12Months => "last12months",
            ScrapeWindow::Last6Months => "last6months",
            ScrapeWindow::Last3Months => "last3months",
            ScrapeWindow::Last30Days => "last30days",
            ScrapeWindow::All => "all",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        WINDOW_ORDER.iter().copied().find(|w| w.as_str() == s)
    }

    /// Interpret a persisted value, treating unset or unrecognized values as
    /// a reset to the first window.
    pub fn from_persisted(value: Option<&str>) -> Self {
        value
            .and_then(ScrapeWindow::parse)
            .unwrap_or(ScrapeWindow::Last12Months)
    }

    /// The next window in rotation order, wrapping after `all`.
    pub fn successor(self) -> Self {
        let idx = WINDOW_ORDER
            .iter()
            .position(|w| *w == self)
            .unwrap_or(0);
        WINDOW_ORDER[(idx + 1) % WINDOW_ORDER.len()]
    }

    /// Value of the `date=` query parameter, absent for `all`.
    pub fn date_param(&self) -> Option<&'static str> {
        match self {
            ScrapeWindow::All => None,
            other => Some(other.as_str()),
        }
    }
}

impl std::fmt::Display for ScrapeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A durable name→value store for pipeline cursors.
///
/// The window component only ever goes through this seam, so the machine is
/// testable against any backing store.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn read(&self, name: &str) -> Result<Option<String>>;
    async fn write(&self, name: &str, value: &str) -> Result<()>;
}

#[async_trait]
impl StateStore for SqlitePool {
    async fn read(&self, name: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM pipeline_state WHERE name = ?")
                .bind(name)
                .fetch_optional(self)
                .await?;
        Ok(value)
    }

    async fn write(&self, name: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO pipeline_state (name, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(value)
        .bind(now)
        .execute(self)
        .await?;
        Ok(())
    }
}

/// Read the current scrape window, persisting the reset value when the
/// stored one is unset or unrecognized.
pub async fn current_window(store: &impl StateStore) -> Result<ScrapeWindow> {
    let stored = store.read(WINDOW_KEY).await?;
    let window = ScrapeWindow::from_persisted(stored.as_deref());

    if stored.as_deref() != Some(window.as_str()) {
        store.write(WINDOW_KEY, window.as_str()).await?;
    }

    Ok(window)
}

/// Persist and return the successor of `current`. Exactly one value exists;
/// it is overwritten.
pub async fn advance_window(
    store: &impl StateStore,
    current: ScrapeWindow,
) -> Result<ScrapeWindow> {
    let next = current.successor();
    store.write(WINDOW_KEY, next.as_str()).await?;
    Ok(next)
}

/// Read the raw persisted value without resetting it (status display).
pub async fn peek_window(store: &impl StateStore) -> Result<Option<String>> {
    store.read(WINDOW_KEY).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        pool
    }

    #[test]
    fn test_cycle_returns_to_start() {
        let mut w = ScrapeWindow::Last12Months;
        for _ in 0..WINDOW_ORDER.len() {
            w = w.successor();
        }
        assert_eq!(w, ScrapeWindow::Last12Months);
    }

    #[test]
    fn test_unrecognized_advances_to_second() {
        let w = ScrapeWindow::from_persisted(Some("bogus")).successor();
        assert_eq!(w, ScrapeWindow::Last6Months);
    }

    #[test]
    fn test_all_wraps_to_first() {
        assert_eq!(ScrapeWindow::All.successor(), ScrapeWindow::Last12Months);
    }

    #[test]
    fn test_date_param() {
        assert_eq!(
            ScrapeWindow::Last30Days.date_param(),
            Some("last30days")
        );
        assert_eq!(ScrapeWindow::All.date_param(), None);
    }

    #[tokio::test]
    async fn test_unset_defaults_to_first_and_persists() {
        let pool = pool().await;
        assert_eq!(
            current_window(&pool).await.unwrap(),
            ScrapeWindow::Last12Months
        );
        assert_eq!(
            peek_window(&pool).await.unwrap().as_deref(),
            Some("last12months")
        );
    }

    #[tokio::test]
    async fn test_invalid_stored_value_resets() {
        let pool = pool().await;
        pool.write(WINDOW_KEY, "lastcentury").await.unwrap();
        assert_eq!(
            current_window(&pool).await.unwrap(),
            ScrapeWindow::Last12Months
        );
    }

    #[tokio::test]
    async fn test_advance_overwrites_single_row() {
        let pool = pool().await;
        let mut w = current_window(&pool).await.unwrap();
        for _ in 0..WINDOW_ORDER.len() {
            w = advance_window(&pool, w).await.unwrap();
        }
        assert_eq!(w, ScrapeWindow::Last12Months);

        let rows: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pipeline_state WHERE name = 'scrape_window'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(rows, 1);
    }
}
