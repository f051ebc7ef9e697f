use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::ScrapeError;

pub async fn create_pool(database_url: &str) -> Result<PgPool, ScrapeError> {
    if database_url.trim().is_empty() {
        return Err(ScrapeError::Config("DATABASE_URL is empty".to_string()));
    }
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), ScrapeError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| ScrapeError::Database(e.into()))
}
