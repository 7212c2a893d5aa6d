use chrono::{DateTime, FixedOffset};
use sqlx::{Row, SqlitePool};

/// A SQLite-backed table with a fixed name and its own record shape.
#[async_trait::async_trait]
pub trait Table {
    type Record<'a>;

    fn name(&self) -> &str;
    fn pool(&self) -> &SqlitePool;

    async fn create(&self) -> Result<(), sqlx::Error>;
    async fn insert<'a>(&self, record: Self::Record<'a>) -> Result<(), sqlx::Error>;

    async fn count(&self) -> Result<u32, sqlx::Error> {
        let query = format!("SELECT COUNT(*) FROM {}", self.name());
        Ok(sqlx::query(&query)
            .fetch_one(self.pool())
            .await?
            .try_get(0)?)
    }
}

pub(crate) async fn is_table_exists(
    pool: &SqlitePool,
    table_name: &str,
) -> Result<bool, sqlx::Error> {
    Ok(
        sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(table_name)
            .fetch_optional(pool)
            .await?
            .is_some(),
    )
}

pub(crate) fn scraped_at() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(
        &chrono::offset::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    )
    .unwrap()
}
