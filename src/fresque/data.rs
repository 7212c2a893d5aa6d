use crate::data::{is_table_exists, scraped_at, Table};
use crate::{CrawlerError, EventRecord};
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};

pub struct EventTable {
    name: String,
    pool: SqlitePool,
}

#[async_trait::async_trait]
impl Table for EventTable {
    type Record<'a> = &'a EventRecord;

    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create(&self) -> Result<(), sqlx::Error> {
        if !is_table_exists(self.pool(), &self.name).await? {
            let query = format!(
                r#"
                    CREATE TABLE {} (
                        source_id INTEGER NOT NULL,
                        event_page_url TEXT NOT NULL,
                        title TEXT,
                        start_time DATETIME,
                        end_time DATETIME,
                        full_location_text TEXT,
                        venue_name TEXT,
                        street_address TEXT,
                        city TEXT,
                        department_code TEXT,
                        postal_code TEXT,
                        latitude TEXT,
                        longitude TEXT,
                        is_online BOOLEAN,
                        is_training BOOLEAN,
                        is_sold_out BOOLEAN,
                        is_kid_friendly BOOLEAN,
                        ticket_url TEXT,
                        description TEXT,
                        scraped_at DATETIME,
                        PRIMARY KEY (source_id, event_page_url)
                    )
                "#,
                &self.name
            );
            sqlx::query(query.as_str()).execute(self.pool()).await?;
        }
        Ok(())
    }

    async fn insert<'a>(&self, record: Self::Record<'a>) -> Result<(), sqlx::Error> {
        let mut tx = self.pool().begin().await?;
        let query = format!(
            r#"INSERT OR IGNORE INTO {} (
                source_id,
                event_page_url,
                title,
                start_time,
                end_time,
                full_location_text,
                venue_name,
                street_address,
                city,
                department_code,
                postal_code,
                latitude,
                longitude,
                is_online,
                is_training,
                is_sold_out,
                is_kid_friendly,
                ticket_url,
                description,
                scraped_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            self.name
        );
        sqlx::query(&query)
            .bind(record.source_id)
            .bind(record.event_page_url.trim())
            .bind(&record.title)
            .bind(record.start_time)
            .bind(record.end_time)
            .bind(&record.full_location_text)
            .bind(&record.venue_name)
            .bind(&record.street_address)
            .bind(&record.city)
            .bind(&record.department_code)
            .bind(&record.postal_code)
            .bind(&record.latitude)
            .bind(&record.longitude)
            .bind(record.is_online)
            .bind(record.is_training)
            .bind(record.is_sold_out)
            .bind(record.is_kid_friendly)
            .bind(&record.ticket_url)
            .bind(&record.description)
            .bind(scraped_at())
            .execute(&mut tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

/// SQLite sink for the output collection; `(source_id, event_page_url)` is
/// the only identity, duplicate inserts are ignored.
pub struct EventStore {
    events: EventTable,
}

impl EventStore {
    pub async fn new(name: &str) -> Result<EventStore, CrawlerError> {
        let opt = SqliteConnectOptions::new()
            .filename(format!("{name}.db"))
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opt).await?;
        let events = EventTable {
            name: format!("{name}_records"),
            pool,
        };
        if !is_table_exists(events.pool(), events.name()).await? {
            tracing::debug!("Create table {}", events.name());
        } else {
            tracing::debug!("Use table {}", events.name());
        }
        events.create().await?;
        Ok(EventStore { events })
    }

    pub async fn insert_all(&self, records: &[EventRecord]) -> Result<(), CrawlerError> {
        for record in records {
            self.events.insert(record).await?;
        }
        Ok(())
    }

    pub async fn count(&self) -> Result<u32, CrawlerError> {
        Ok(self.events.count().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::Path;
    use tokio::fs;

    fn record(url: &str) -> EventRecord {
        let date = NaiveDate::from_ymd_opt(2024, 1, 25).unwrap();
        EventRecord {
            source_id: 200,
            title: "Fresque du Climat à Lyon".to_string(),
            start_time: date.and_hms_opt(14, 0, 0).unwrap(),
            end_time: date.and_hms_opt(16, 30, 0).unwrap(),
            full_location_text: "12 Rue de Paris, Lyon, France".to_string(),
            venue_name: String::new(),
            street_address: "12 Rue de Paris".to_string(),
            city: "Lyon".to_string(),
            department_code: "69".to_string(),
            postal_code: "69002".to_string(),
            latitude: "45.764043".to_string(),
            longitude: "4.835659".to_string(),
            is_online: false,
            is_training: false,
            is_sold_out: false,
            is_kid_friendly: false,
            event_page_url: url.to_string(),
            ticket_url: "https://billets.example/42".to_string(),
            description: "Atelier collaboratif.".to_string(),
        }
    }

    #[tokio::test]
    async fn create_new_file() {
        if Path::new("test_events.db").is_file() {
            fs::remove_file("test_events.db").await.unwrap();
        }

        assert!(!Path::new("test_events.db").is_file());
        EventStore::new("test_events").await.unwrap();
        assert!(Path::new("test_events.db").is_file());

        fs::remove_file("test_events.db").await.unwrap();
    }

    #[tokio::test]
    async fn insert_and_count() {
        if Path::new("test_events2.db").is_file() {
            fs::remove_file("test_events2.db").await.unwrap();
        }

        let store = EventStore::new("test_events2").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);

        store
            .insert_all(&[record("https://x/e/1"), record("https://x/e/2")])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        fs::remove_file("test_events2.db").await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_page_url_is_ignored() {
        if Path::new("test_events3.db").is_file() {
            fs::remove_file("test_events3.db").await.unwrap();
        }

        let store = EventStore::new("test_events3").await.unwrap();
        store
            .insert_all(&[record("https://x/e/1"), record("https://x/e/1")])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        fs::remove_file("test_events3.db").await.unwrap();
    }
}
