use std::str::FromStr;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime, UtcOffset};

/// UTC with nanosecond precision, so stored timestamps sort as text.
const TIMESTAMP_FORMAT: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]Z"
);

/// Fixed-width RFC 3339 text for a TEXT timestamp column.
pub fn timestamp(at: OffsetDateTime) -> sqlx::Result<String> {
    at.to_offset(UtcOffset::UTC)
        .format(TIMESTAMP_FORMAT)
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

/// Open the pool for `database_url`, creating the database file when missing.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("parse DATABASE_URL {database_url}"))?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await
        .context("connect to database")
}

/// Private in-memory database: one connection that never expires.
#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("memory url")
        .foreign_keys(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("memory pool")
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn timestamps_have_a_fixed_width() {
        let base = datetime!(2024-01-01 12:00:00 UTC);
        let whole = timestamp(base).unwrap();
        let half = timestamp(base + time::Duration::milliseconds(500)).unwrap();
        let later = timestamp(base + time::Duration::milliseconds(550)).unwrap();

        assert_eq!(whole, "2024-01-01T12:00:00.000000000Z");
        assert_eq!(half, "2024-01-01T12:00:00.500000000Z");
        assert!(whole < half && half < later);
    }

    #[test]
    fn timestamps_are_normalized_to_utc() {
        let local = datetime!(2024-01-01 14:00:00 +2);
        assert_eq!(timestamp(local).unwrap(), "2024-01-01T12:00:00.000000000Z");
    }

    #[tokio::test]
    async fn stored_timestamps_decode_back() {
        let pool = memory_pool().await;
        let at = datetime!(2024-01-01 12:00:00.123456789 UTC);
        let back: OffsetDateTime = sqlx::query_scalar("SELECT ?")
            .bind(timestamp(at).unwrap())
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(back, at);
    }
}
