//! Participant queries

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::checklist::TrackingItem;
use crate::db::models::Participant;
use crate::roles::SiteScope;
use crate::schedule;
use crate::{Error, Result};

const SELECT_PARTICIPANT: &str = "SELECT p.*, s.name AS site_name \
     FROM participants p JOIN sites s ON s.id = p.site_id";

/// Fields captured at registration
#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub site_id: i64,
    pub screening_session_id: Option<i64>,
    pub study_id: String,
    pub enrollment_date: NaiveDate,
    pub date_of_birth: Option<NaiveDate>,
}

/// Participants visible under `scope`, newest enrollment first
pub async fn list_participants(pool: &SqlitePool, scope: SiteScope) -> Result<Vec<Participant>> {
    let participants = match scope {
        SiteScope::All => {
            sqlx::query_as::<_, Participant>(&format!(
                "{} ORDER BY p.enrollment_date DESC, p.id DESC",
                SELECT_PARTICIPANT
            ))
            .fetch_all(pool)
            .await?
        }
        SiteScope::Site(None) => Vec::new(),
        SiteScope::Site(Some(site_id)) => {
            sqlx::query_as::<_, Participant>(&format!(
                "{} WHERE p.site_id = ? ORDER BY p.enrollment_date DESC, p.id DESC",
                SELECT_PARTICIPANT
            ))
            .bind(site_id)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(participants)
}

pub async fn get_participant(pool: &SqlitePool, id: i64) -> Result<Participant> {
    sqlx::query_as::<_, Participant>(&format!("{} WHERE p.id = ?", SELECT_PARTICIPANT))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("participant {}", id)))
}

/// Whether `study_id` is taken by a participant other than `exclude_id`
pub async fn study_id_exists(
    pool: &SqlitePool,
    study_id: &str,
    exclude_id: Option<i64>,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM participants WHERE study_id = ?1 AND (?2 IS NULL OR id != ?2))",
    )
    .bind(study_id)
    .bind(exclude_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Insert a participant; the due date is derived from the enrollment date
pub async fn insert_participant(pool: &SqlitePool, new: &NewParticipant) -> Result<Participant> {
    let id = sqlx::query(
        r#"
        INSERT INTO participants (site_id, screening_session_id, study_id, enrollment_date,
                                  due_date, date_of_birth, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new.site_id)
    .bind(new.screening_session_id)
    .bind(&new.study_id)
    .bind(new.enrollment_date)
    .bind(schedule::due_date_for(new.enrollment_date))
    .bind(new.date_of_birth)
    .bind(Utc::now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_participant(pool, id).await
}

/// Persist every editable column of `participant`
///
/// The due date is recalculated from the enrollment date first, so a stale
/// value can never be written.
pub async fn save_participant(pool: &SqlitePool, participant: &mut Participant) -> Result<()> {
    participant.recalculate_due_date();

    let item_columns: Vec<String> = TrackingItem::ALL
        .iter()
        .map(|item| format!("{} = ?, {} = ?", item.key(), item.comment_key()))
        .collect();

    let sql = format!(
        "UPDATE participants SET study_id = ?, enrollment_date = ?, due_date = ?, \
         date_of_birth = ?, {}, monitor_downloaded_at = ?, monitor_downloaded_by = ?, \
         ultrasound_downloaded_at = ?, ultrasound_downloaded_by = ? WHERE id = ?",
        item_columns.join(", ")
    );

    let mut query = sqlx::query(&sql)
        .bind(&participant.study_id)
        .bind(participant.enrollment_date)
        .bind(participant.due_date)
        .bind(participant.date_of_birth);

    for item in TrackingItem::ALL {
        let state = participant.checklist.get(item);
        query = query.bind(state.done).bind(state.comment.clone());
    }

    let result = query
        .bind(participant.monitor_downloaded_at)
        .bind(participant.monitor_downloaded_by)
        .bind(participant.ultrasound_downloaded_at)
        .bind(participant.ultrasound_downloaded_by)
        .bind(participant.id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("participant {}", participant.id)));
    }
    Ok(())
}

/// Quick confirmation of a monitor or ultrasound download
pub async fn mark_downloaded(
    pool: &SqlitePool,
    id: i64,
    item: TrackingItem,
    user_id: i64,
    at: DateTime<Utc>,
) -> Result<Participant> {
    let mut participant = get_participant(pool, id).await?;
    participant.checklist.set_done(item, true);
    match item {
        TrackingItem::MonitorDownloaded => {
            participant.monitor_downloaded_at = Some(at);
            participant.monitor_downloaded_by = Some(user_id);
        }
        TrackingItem::UltrasoundDownloaded => {
            participant.ultrasound_downloaded_at = Some(at);
            participant.ultrasound_downloaded_by = Some(user_id);
        }
        other => {
            return Err(Error::InvalidInput(format!(
                "{} has no download confirmation",
                other.key()
            )))
        }
    }
    save_participant(pool, &mut participant).await?;
    Ok(participant)
}
