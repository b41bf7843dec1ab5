//! Persistence seams: append-only full-record storage and the keyed ban list.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use sqlx::mysql::MySqlPool;
use sqlx::Row;
use thiserror::Error;

use crate::domain::BanRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Append-only archive of full notification payloads, kept for audit.
#[async_trait]
pub trait BounceStore: Send + Sync {
    async fn append(&self, payload: &Value) -> Result<(), StoreError>;
}

/// Keyed ban list. One record per lowercase email; upsert overwrites
/// timestamp and reason unconditionally, so replays and races converge.
#[async_trait]
pub trait BanStore: Send + Sync {
    /// Asserts the unique email key. Idempotent, called on every run.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    async fn upsert(&self, ban: &BanRecord) -> Result<(), StoreError>;

    async fn all(&self) -> Result<Vec<BanRecord>, StoreError>;
}

pub struct MySqlBounceStore {
    pool: MySqlPool,
    table: String,
}

impl MySqlBounceStore {
    pub fn new(pool: MySqlPool, table: &str) -> Self {
        MySqlBounceStore {
            pool,
            table: table.to_string(),
        }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let ddl = format!(
            r#"CREATE TABLE IF NOT EXISTS `{}` (
                id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
                payload JSON NOT NULL,
                received_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )"#,
            self.table
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl BounceStore for MySqlBounceStore {
    async fn append(&self, payload: &Value) -> Result<(), StoreError> {
        let sql = format!("INSERT INTO `{}` (payload) VALUES (?)", self.table);
        sqlx::query(&sql)
            .bind(payload.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct MySqlBanStore {
    pool: MySqlPool,
    table: String,
}

impl MySqlBanStore {
    pub fn new(pool: MySqlPool, table: &str) -> Self {
        MySqlBanStore {
            pool,
            table: table.to_string(),
        }
    }
}

#[async_trait]
impl BanStore for MySqlBanStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        // The unique key on email is the whole correctness mechanism for
        // concurrent and repeated upserts.
        let ddl = format!(
            r#"CREATE TABLE IF NOT EXISTS `{}` (
                email VARCHAR(255) NOT NULL,
                timestamp DATETIME NOT NULL,
                reason TEXT NOT NULL,
                PRIMARY KEY (email)
            )"#,
            self.table
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }

    async fn upsert(&self, ban: &BanRecord) -> Result<(), StoreError> {
        let sql = format!(
            r#"INSERT INTO `{}` (email, timestamp, reason) VALUES (?, ?, ?)
               ON DUPLICATE KEY UPDATE timestamp = VALUES(timestamp), reason = VALUES(reason)"#,
            self.table
        );
        sqlx::query(&sql)
            .bind(&ban.email)
            .bind(ban.timestamp.naive_utc())
            .bind(&ban.reason)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<BanRecord>, StoreError> {
        let sql = format!("SELECT email, timestamp, reason FROM `{}`", self.table);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut bans = Vec::with_capacity(rows.len());
        for row in rows {
            let naive: chrono::NaiveDateTime = row.try_get("timestamp")?;
            bans.push(BanRecord {
                email: row.try_get("email")?,
                timestamp: Utc.from_utc_datetime(&naive),
                reason: row.try_get("reason")?,
            });
        }
        Ok(bans)
    }
}
