//! Database models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use crate::checklist::{Checklist, TrackingItem};
use crate::roles::{Principal, Role};
use crate::schedule::{self, StatusColor};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Site {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Option<Role>,
    pub site_id: Option<i64>,
    pub is_active: bool,
    pub is_superuser: bool,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(skip)]
    pub password_salt: String,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.id,
            username: self.username.clone(),
            role: self.role,
            site_id: self.site_id,
            is_superuser: self.is_superuser,
        }
    }

    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }
}

impl<'r> FromRow<'r, SqliteRow> for User {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let role: Option<String> = row.try_get("role")?;
        Ok(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            role: role.as_deref().and_then(Role::from_code),
            site_id: row.try_get("site_id")?,
            is_active: row.try_get("is_active")?,
            is_superuser: row.try_get("is_superuser")?,
            password_hash: row.try_get("password_hash")?,
            password_salt: row.try_get("password_salt")?,
            date_joined: row.try_get("date_joined")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ScreeningSession {
    pub id: i64,
    pub ra_id: i64,
    pub site_id: i64,
    pub date: NaiveDate,
    pub number_screened: i64,
    pub number_eligible: i64,
    pub created_at: DateTime<Utc>,
}

/// Enrolled infant with its tracking checklist
///
/// `site_name` is joined from `sites` so callers can build study ids and
/// reports without a second query.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: i64,
    pub site_id: i64,
    pub site_name: String,
    pub screening_session_id: Option<i64>,
    pub study_id: String,
    pub enrollment_date: NaiveDate,
    pub due_date: NaiveDate,
    pub date_of_birth: Option<NaiveDate>,
    pub checklist: Checklist,
    pub monitor_downloaded_at: Option<DateTime<Utc>>,
    pub monitor_downloaded_by: Option<i64>,
    pub ultrasound_downloaded_at: Option<DateTime<Utc>>,
    pub ultrasound_downloaded_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Participant {
    /// Realign the due date with the enrollment date; called before every save
    pub fn recalculate_due_date(&mut self) {
        self.due_date = schedule::due_date_for(self.enrollment_date);
    }

    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        schedule::days_remaining(self.due_date, today)
    }

    pub fn status_color(&self, today: NaiveDate) -> StatusColor {
        StatusColor::from_days(self.days_remaining(today))
    }

    pub fn is_completed(&self) -> bool {
        self.checklist.is_completed()
    }

    pub fn missing_items(&self) -> Vec<TrackingItem> {
        self.checklist.missing_items()
    }
}

impl<'r> FromRow<'r, SqliteRow> for Participant {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let mut checklist = Checklist::default();
        for item in TrackingItem::ALL {
            checklist.set_done(item, row.try_get(item.key())?);
            checklist.set_comment(item, row.try_get(item.comment_key().as_str())?);
        }

        Ok(Participant {
            id: row.try_get("id")?,
            site_id: row.try_get("site_id")?,
            site_name: row.try_get("site_name")?,
            screening_session_id: row.try_get("screening_session_id")?,
            study_id: row.try_get("study_id")?,
            enrollment_date: row.try_get("enrollment_date")?,
            due_date: row.try_get("due_date")?,
            date_of_birth: row.try_get("date_of_birth")?,
            checklist,
            monitor_downloaded_at: row.try_get("monitor_downloaded_at")?,
            monitor_downloaded_by: row.try_get("monitor_downloaded_by")?,
            ultrasound_downloaded_at: row.try_get("ultrasound_downloaded_at")?,
            ultrasound_downloaded_by: row.try_get("ultrasound_downloaded_by")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Kind of reminder recorded in the notification log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    DailyPrompt,
    EarlyReminder,
    FinalReminder,
    OverdueAlert,
}

impl NotificationType {
    pub const ALL: [NotificationType; 4] = [
        NotificationType::DailyPrompt,
        NotificationType::EarlyReminder,
        NotificationType::FinalReminder,
        NotificationType::OverdueAlert,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            NotificationType::DailyPrompt => "DAILY_PROMPT",
            NotificationType::EarlyReminder => "EARLY_REMINDER",
            NotificationType::FinalReminder => "FINAL_REMINDER",
            NotificationType::OverdueAlert => "OVERDUE_ALERT",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.code() == code)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            NotificationType::DailyPrompt => "Daily Prompt",
            NotificationType::EarlyReminder => "Early Reminder",
            NotificationType::FinalReminder => "Final Reminder",
            NotificationType::OverdueAlert => "Overdue Alert",
        }
    }

    /// Reminder kind for a participant `days` before (or after) its due date
    pub fn for_days_remaining(days: i64) -> Option<Self> {
        match days {
            2 => Some(NotificationType::EarlyReminder),
            0 | 1 => Some(NotificationType::FinalReminder),
            d if d < 0 => Some(NotificationType::OverdueAlert),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationLog {
    pub id: i64,
    pub participant_id: i64,
    pub study_id: String,
    pub notification_type: NotificationType,
    pub sent_at: DateTime<Utc>,
    pub recipient_id: Option<i64>,
    pub recipient_username: Option<String>,
}

impl<'r> FromRow<'r, SqliteRow> for NotificationLog {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let code: String = row.try_get("notification_type")?;
        let notification_type =
            NotificationType::from_code(&code).ok_or_else(|| sqlx::Error::ColumnDecode {
                index: "notification_type".to_string(),
                source: format!("unknown notification type: {}", code).into(),
            })?;

        Ok(NotificationLog {
            id: row.try_get("id")?,
            participant_id: row.try_get("participant_id")?,
            study_id: row.try_get("study_id")?,
            notification_type,
            sent_at: row.try_get("sent_at")?,
            recipient_id: row.try_get("recipient_id")?,
            recipient_username: row.try_get("recipient_username")?,
        })
    }
}

/// Category of a personal daily log entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogTag {
    #[serde(rename = "OBS")]
    Observation,
    #[serde(rename = "EQP")]
    Equipment,
    #[serde(rename = "REM")]
    Reminder,
    #[default]
    #[serde(rename = "MISC")]
    Miscellaneous,
}

impl LogTag {
    pub fn code(&self) -> &'static str {
        match self {
            LogTag::Observation => "OBS",
            LogTag::Equipment => "EQP",
            LogTag::Reminder => "REM",
            LogTag::Miscellaneous => "MISC",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        [
            LogTag::Observation,
            LogTag::Equipment,
            LogTag::Reminder,
            LogTag::Miscellaneous,
        ]
        .into_iter()
        .find(|t| t.code() == code)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyLog {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub title: Option<String>,
    pub tag: LogTag,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for DailyLog {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let tag: String = row.try_get("tag")?;
        Ok(DailyLog {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            date: row.try_get("date")?,
            title: row.try_get("title")?,
            tag: LogTag::from_code(&tag).unwrap_or_default(),
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_type_for_days() {
        assert_eq!(NotificationType::for_days_remaining(3), None);
        assert_eq!(
            NotificationType::for_days_remaining(2),
            Some(NotificationType::EarlyReminder)
        );
        assert_eq!(
            NotificationType::for_days_remaining(1),
            Some(NotificationType::FinalReminder)
        );
        assert_eq!(
            NotificationType::for_days_remaining(0),
            Some(NotificationType::FinalReminder)
        );
        assert_eq!(
            NotificationType::for_days_remaining(-4),
            Some(NotificationType::OverdueAlert)
        );
    }

    #[test]
    fn test_codes_round_trip() {
        for t in NotificationType::ALL {
            assert_eq!(NotificationType::from_code(t.code()), Some(t));
        }
        assert_eq!(LogTag::from_code("EQP"), Some(LogTag::Equipment));
        assert_eq!(LogTag::from_code("???"), None);
        assert_eq!(LogTag::default(), LogTag::Miscellaneous);
    }
}
