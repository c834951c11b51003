//! Screening session queries

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::db::models::ScreeningSession;
use crate::roles::SiteScope;
use crate::{Error, Result};

const SESSION_COLUMNS: &str =
    "id, ra_id, site_id, date, number_screened, number_eligible, created_at";

#[derive(Debug, Clone)]
pub struct NewScreeningSession {
    pub ra_id: i64,
    pub site_id: i64,
    pub date: NaiveDate,
    pub number_screened: i64,
    pub number_eligible: i64,
}

pub async fn insert_session(pool: &SqlitePool, new: &NewScreeningSession) -> Result<ScreeningSession> {
    let id = sqlx::query(
        r#"
        INSERT INTO screening_sessions (ra_id, site_id, date, number_screened, number_eligible, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new.ra_id)
    .bind(new.site_id)
    .bind(new.date)
    .bind(new.number_screened)
    .bind(new.number_eligible)
    .bind(Utc::now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_session(pool, id).await
}

pub async fn get_session(pool: &SqlitePool, id: i64) -> Result<ScreeningSession> {
    sqlx::query_as::<_, ScreeningSession>(&format!(
        "SELECT {} FROM screening_sessions WHERE id = ?",
        SESSION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("screening session {}", id)))
}

/// Sessions visible under `scope`, most recent date first
pub async fn list_sessions(pool: &SqlitePool, scope: SiteScope) -> Result<Vec<ScreeningSession>> {
    let sessions = match scope {
        SiteScope::All => {
            sqlx::query_as::<_, ScreeningSession>(&format!(
                "SELECT {} FROM screening_sessions ORDER BY date DESC, id DESC",
                SESSION_COLUMNS
            ))
            .fetch_all(pool)
            .await?
        }
        SiteScope::Site(None) => Vec::new(),
        SiteScope::Site(Some(site_id)) => {
            sqlx::query_as::<_, ScreeningSession>(&format!(
                "SELECT {} FROM screening_sessions WHERE site_id = ? ORDER BY date DESC, id DESC",
                SESSION_COLUMNS
            ))
            .bind(site_id)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(sessions)
}

/// Total infants screened across the sessions visible under `scope`
pub async fn total_screened(pool: &SqlitePool, scope: SiteScope) -> Result<i64> {
    let total: Option<i64> = match scope {
        SiteScope::All => {
            sqlx::query_scalar("SELECT SUM(number_screened) FROM screening_sessions")
                .fetch_one(pool)
                .await?
        }
        SiteScope::Site(None) => None,
        SiteScope::Site(Some(site_id)) => {
            sqlx::query_scalar(
                "SELECT SUM(number_screened) FROM screening_sessions WHERE site_id = ?",
            )
            .bind(site_id)
            .fetch_one(pool)
            .await?
        }
    };
    Ok(total.unwrap_or(0))
}
