//! Integration tests for the reminder run against a real database

use chrono::{Duration, NaiveDate};
use ptrack_common::db::models::NotificationType;
use ptrack_common::db::participants::{self, NewParticipant};
use ptrack_common::db::users::{self, NewUser};
use ptrack_common::db::{init_database, notifications, sites};
use ptrack_common::{Role, TrackingItem};
use ptrack_web::mail::MemoryMailer;
use ptrack_web::reminders::send_reminders;
use sqlx::SqlitePool;
use tempfile::TempDir;

const BASE_URL: &str = "https://tracker.test";

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
}

async fn setup() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("ptrack.db")).await.unwrap();
    (dir, pool)
}

async fn add_user(pool: &SqlitePool, username: &str, role: Role, site_id: i64, email: &str) -> i64 {
    users::create_user(
        pool,
        &NewUser {
            username: username.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: email.to_string(),
            role: Some(role),
            site_id: Some(site_id),
            is_active: true,
            is_superuser: false,
            password: "correct-horse".to_string(),
        },
    )
    .await
    .unwrap()
    .id
}

/// Participant whose deadline is `days_remaining` days after `today()`
async fn add_participant(pool: &SqlitePool, site_id: i64, study_id: &str, days_remaining: i64) -> i64 {
    participants::insert_participant(
        pool,
        &NewParticipant {
            site_id,
            screening_session_id: None,
            study_id: study_id.to_string(),
            enrollment_date: today() + Duration::days(days_remaining - 7),
            date_of_birth: None,
        },
    )
    .await
    .unwrap()
    .id
}

/// Two sites: Nairobi has a full team (RO without email), Kisumu only a PI
async fn seed(pool: &SqlitePool) {
    let nairobi = sites::create_site(pool, "Nairobi").await.unwrap().id;
    let kisumu = sites::create_site(pool, "Kisumu").await.unwrap().id;

    add_user(pool, "ra", Role::ResearchAssistant, nairobi, "ra@example.org").await;
    add_user(pool, "ro", Role::ResearchOfficer, nairobi, "").await;
    add_user(pool, "pi", Role::Admin, nairobi, "pi@example.org").await;
    add_user(pool, "pi_k", Role::Admin, kisumu, "pi_k@example.org").await;
    // Another site's RA must not get Nairobi's due-soon mail
    add_user(pool, "ra_k", Role::ResearchAssistant, kisumu, "ra_k@example.org").await;

    add_participant(pool, nairobi, "Nairobi_001", 2).await;
    add_participant(pool, nairobi, "Nairobi_002", 6).await;
    add_participant(pool, kisumu, "Kisumu_001", -1).await;
}

#[tokio::test]
async fn test_reminder_run_routes_by_urgency() {
    let (_dir, pool) = setup().await;
    seed(&pool).await;
    let mailer = MemoryMailer::new();

    let summary = send_reminders(&pool, &mailer, BASE_URL, today(), false)
        .await
        .unwrap();

    assert_eq!(summary.due_soon_participants, 1);
    assert_eq!(summary.overdue_participants, 1);
    assert_eq!(summary.emails_sent, 4);
    assert_eq!(summary.emails_failed, 0);
    assert_eq!(summary.skipped_without_email, 1);
    assert_eq!(summary.notifications_recorded, 4);

    let sent = mailer.sent();
    let due_soon: Vec<&str> = sent
        .iter()
        .filter(|e| e.subject == "Pending uploads due soon (D-2)")
        .map(|e| e.to.as_str())
        .collect();
    assert_eq!(due_soon, ["ra@example.org", "pi@example.org"]);

    let overdue: Vec<_> = sent
        .iter()
        .filter(|e| e.subject == "Overdue uploads – Immediate Action Required")
        .collect();
    assert_eq!(overdue.len(), 2);
    assert!(overdue.iter().any(|e| e.to == "pi_k@example.org"));
    assert!(overdue[0].text_body.contains("Kisumu_001"));
    assert!(!overdue[0].text_body.contains("Nairobi_002"));

    let early = notifications::list_notifications(&pool, Some(NotificationType::EarlyReminder), 100, 0)
        .await
        .unwrap();
    assert_eq!(early.len(), 2);
    assert!(early.iter().all(|n| n.study_id == "Nairobi_001"));

    let alerts = notifications::list_notifications(&pool, Some(NotificationType::OverdueAlert), 100, 0)
        .await
        .unwrap();
    assert_eq!(alerts.len(), 2);
}

#[tokio::test]
async fn test_dry_run_sends_and_records_nothing() {
    let (_dir, pool) = setup().await;
    seed(&pool).await;
    let mailer = MemoryMailer::new();

    let summary = send_reminders(&pool, &mailer, BASE_URL, today(), true)
        .await
        .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.due_soon_participants, 1);
    assert_eq!(summary.emails_sent, 0);
    assert_eq!(summary.notifications_recorded, 0);
    assert!(mailer.sent().is_empty());
    assert_eq!(notifications::count_notifications(&pool, None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_completed_participants_are_not_reminded() {
    let (_dir, pool) = setup().await;
    let site = sites::create_site(&pool, "Nairobi").await.unwrap().id;
    add_user(&pool, "pi", Role::Admin, site, "pi@example.org").await;
    let id = add_participant(&pool, site, "Nairobi_001", -3).await;

    let mut participant = participants::get_participant(&pool, id).await.unwrap();
    for item in TrackingItem::ALL.iter().filter(|item| item.is_required()) {
        participant.checklist.set_done(*item, true);
    }
    participants::save_participant(&pool, &mut participant)
        .await
        .unwrap();

    let mailer = MemoryMailer::new();
    let summary = send_reminders(&pool, &mailer, BASE_URL, today(), false)
        .await
        .unwrap();

    assert_eq!(summary.overdue_participants, 0);
    assert_eq!(summary.emails_sent, 0);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn test_failed_send_is_counted_and_run_continues() {
    let (_dir, pool) = setup().await;
    seed(&pool).await;
    let mailer = MemoryMailer::new();
    mailer.reject("ra@example.org");

    let summary = send_reminders(&pool, &mailer, BASE_URL, today(), false)
        .await
        .unwrap();

    assert_eq!(summary.emails_failed, 1);
    assert_eq!(summary.emails_sent, 3);
    assert_eq!(summary.notifications_recorded, 3);

    let recipients: Vec<String> = mailer.sent().into_iter().map(|e| e.to).collect();
    assert!(!recipients.contains(&"ra@example.org".to_string()));
    assert!(recipients.contains(&"pi@example.org".to_string()));
    assert!(recipients.contains(&"pi_k@example.org".to_string()));

    // No log row names the recipient whose mail bounced
    let logs = notifications::list_notifications(&pool, None, 100, 0)
        .await
        .unwrap();
    assert_eq!(logs.len(), 3);
    assert!(logs
        .iter()
        .all(|n| n.recipient_username.as_deref() != Some("ra")));
}

#[tokio::test]
async fn test_log_write_failure_does_not_stop_delivery() {
    let (_dir, pool) = setup().await;
    seed(&pool).await;
    sqlx::query("DROP TABLE notification_logs")
        .execute(&pool)
        .await
        .unwrap();
    let mailer = MemoryMailer::new();

    let summary = send_reminders(&pool, &mailer, BASE_URL, today(), false)
        .await
        .unwrap();

    // Every recipient is still mailed
    assert_eq!(summary.emails_sent, 4);
    assert_eq!(mailer.sent().len(), 4);
    assert_eq!(summary.notifications_recorded, 0);
    assert_eq!(summary.notifications_failed, 4);
}
