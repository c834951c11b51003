//! Daily log queries
//!
//! Every query is keyed by owner: a user can only ever reach their own entries.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::db::models::{DailyLog, LogTag};
use crate::{Error, Result};

const LOG_COLUMNS: &str = "id, user_id, date, title, tag, content, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub date: NaiveDate,
    pub title: Option<String>,
    pub tag: LogTag,
    pub content: String,
}

pub async fn insert_log(pool: &SqlitePool, user_id: i64, entry: &LogEntry) -> Result<DailyLog> {
    let now = Utc::now();
    let id = sqlx::query(
        r#"
        INSERT INTO daily_logs (user_id, date, title, tag, content, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(entry.date)
    .bind(&entry.title)
    .bind(entry.tag.code())
    .bind(&entry.content)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_log(pool, user_id, id).await
}

pub async fn get_log(pool: &SqlitePool, user_id: i64, id: i64) -> Result<DailyLog> {
    sqlx::query_as::<_, DailyLog>(&format!(
        "SELECT {} FROM daily_logs WHERE id = ? AND user_id = ?",
        LOG_COLUMNS
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("daily log {}", id)))
}

/// Newest date first, then newest entry
pub async fn list_logs(pool: &SqlitePool, user_id: i64) -> Result<Vec<DailyLog>> {
    let logs = sqlx::query_as::<_, DailyLog>(&format!(
        "SELECT {} FROM daily_logs WHERE user_id = ? ORDER BY date DESC, created_at DESC, id DESC",
        LOG_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(logs)
}

pub async fn update_log(
    pool: &SqlitePool,
    user_id: i64,
    id: i64,
    entry: &LogEntry,
) -> Result<DailyLog> {
    let result = sqlx::query(
        r#"
        UPDATE daily_logs SET date = ?, title = ?, tag = ?, content = ?, updated_at = ?
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(entry.date)
    .bind(&entry.title)
    .bind(entry.tag.code())
    .bind(&entry.content)
    .bind(Utc::now())
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("daily log {}", id)));
    }
    get_log(pool, user_id, id).await
}

pub async fn delete_log(pool: &SqlitePool, user_id: i64, id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM daily_logs WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("daily log {}", id)));
    }
    Ok(())
}
