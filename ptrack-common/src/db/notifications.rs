//! Notification log queries

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::db::models::{NotificationLog, NotificationType};
use crate::Result;

pub async fn record_notification(
    pool: &SqlitePool,
    participant_id: i64,
    notification_type: NotificationType,
    recipient_id: Option<i64>,
    sent_at: DateTime<Utc>,
) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO notification_logs (participant_id, notification_type, sent_at, recipient_id)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(participant_id)
    .bind(notification_type.code())
    .bind(sent_at)
    .bind(recipient_id)
    .execute(pool)
    .await?
    .last_insert_rowid();
    Ok(id)
}

pub async fn count_notifications(
    pool: &SqlitePool,
    notification_type: Option<NotificationType>,
) -> Result<i64> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notification_logs WHERE (?1 IS NULL OR notification_type = ?1)",
    )
    .bind(notification_type.map(|t| t.code()))
    .fetch_one(pool)
    .await?;
    Ok(total)
}

/// One page of the log, most recent first, optionally limited to one type
pub async fn list_notifications(
    pool: &SqlitePool,
    notification_type: Option<NotificationType>,
    limit: i64,
    offset: i64,
) -> Result<Vec<NotificationLog>> {
    let logs = sqlx::query_as::<_, NotificationLog>(
        r#"
        SELECT n.id, n.participant_id, p.study_id, n.notification_type, n.sent_at,
               n.recipient_id, u.username AS recipient_username
        FROM notification_logs n
        JOIN participants p ON p.id = n.participant_id
        LEFT JOIN users u ON u.id = n.recipient_id
        WHERE (?1 IS NULL OR n.notification_type = ?1)
        ORDER BY n.sent_at DESC, n.id DESC
        LIMIT ?2 OFFSET ?3
        "#,
    )
    .bind(notification_type.map(|t| t.code()))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(logs)
}
