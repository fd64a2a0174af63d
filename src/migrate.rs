use anyhow::Result;
use sqlx::SqlitePool;

/// Create the relational metadata schema and the pipeline state tables.
/// Every statement is idempotent; `init` can be re-run at any time.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Category lookup, unique by name
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS category (
            category_id INTEGER PRIMARY KEY AUTOINCREMENT,
            category_name TEXT UNIQUE NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entreprise (
            entreprise_id TEXT PRIMARY KEY,
            entreprise_name TEXT,
            email TEXT,
            phone TEXT,
            web_site TEXT,
            category_id INTEGER,
            FOREIGN KEY (category_id) REFERENCES category(category_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS adress (
            entreprise_id TEXT PRIMARY KEY REFERENCES entreprise(entreprise_id),
            street_number TEXT,
            street_name TEXT,
            zip_code TEXT,
            city TEXT,
            country TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rating (
            entreprise_id TEXT PRIMARY KEY REFERENCES entreprise(entreprise_id),
            one_star REAL,
            two_star REAL,
            three_star REAL,
            four_star REAL,
            five_star REAL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Single-row fingerprint of the last fully loaded metadata snapshot
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS metadata_file_state (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_hash TEXT UNIQUE NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Named durable cursors (scrape window)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_state (
            name TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
