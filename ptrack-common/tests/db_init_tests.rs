//! Integration tests for database initialization and queries
//!
//! Each test works on a fresh database inside a temporary directory.

use chrono::{Duration, NaiveDate, Utc};
use ptrack_common::checklist::TrackingItem;
use ptrack_common::db::init::init_database;
use ptrack_common::db::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};
use ptrack_common::db::participants::{self, NewParticipant};
use ptrack_common::db::screening::{self, NewScreeningSession};
use ptrack_common::db::users::{self, NewUser, SessionLookup, UserFilter};
use ptrack_common::db::{notifications, sites, NotificationType};
use ptrack_common::{Error, Role, SiteScope};
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn fresh_db() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("temp dir");
    let pool = init_database(&dir.path().join("ptrack.db"))
        .await
        .expect("init database");
    (dir, pool)
}

fn new_user(username: &str, role: Option<Role>, site_id: Option<i64>) -> NewUser {
    NewUser {
        username: username.to_string(),
        first_name: String::new(),
        last_name: String::new(),
        email: format!("{}@example.org", username.to_lowercase()),
        role,
        site_id,
        is_active: true,
        is_superuser: false,
        password: "password123".to_string(),
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("ptrack.db");
    assert!(!db_path.exists());

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing_and_is_migrated_once() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ptrack.db");

    let pool1 = init_database(&db_path).await.unwrap();
    assert_eq!(get_schema_version(&pool1).await.unwrap(), CURRENT_SCHEMA_VERSION);
    drop(pool1);

    let pool2 = init_database(&db_path).await.unwrap();
    let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(versions, CURRENT_SCHEMA_VERSION as i64);
}

#[tokio::test]
async fn test_vital_sign_columns_added_by_migration() {
    let (_dir, pool) = fresh_db().await;
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('participants') WHERE name LIKE 'vital_sign_monitoring_done%'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_site_names_are_unique() {
    let (_dir, pool) = fresh_db().await;
    sites::create_site(&pool, "Nairobi").await.unwrap();

    match sites::create_site(&pool, " Nairobi ").await {
        Err(Error::Validation(fields)) => assert!(fields.get("name").is_some()),
        other => panic!("expected validation error, got {other:?}"),
    }
    match sites::create_site(&pool, "  ").await {
        Err(Error::Validation(_)) => {}
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(sites::list_sites(&pool).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_username_lookup_is_case_insensitive() {
    let (_dir, pool) = fresh_db().await;
    let site = sites::create_site(&pool, "Kisumu").await.unwrap();
    let created = users::create_user(&pool, &new_user("MaryA", Some(Role::ResearchAssistant), Some(site.id)))
        .await
        .unwrap();
    assert_eq!(created.username, "marya");

    let found = users::find_user_by_username(&pool, "MARYA").await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(created.id));
}

#[tokio::test]
async fn test_user_filters_and_recipient_queries() {
    let (_dir, pool) = fresh_db().await;
    let a = sites::create_site(&pool, "A").await.unwrap();
    let b = sites::create_site(&pool, "B").await.unwrap();

    users::create_user(&pool, &new_user("ra_a", Some(Role::ResearchAssistant), Some(a.id))).await.unwrap();
    users::create_user(&pool, &new_user("ro_a", Some(Role::ResearchOfficer), Some(a.id))).await.unwrap();
    users::create_user(&pool, &new_user("ad_b", Some(Role::Admin), Some(b.id))).await.unwrap();
    let mut pending = new_user("ra_b", Some(Role::ResearchAssistant), Some(b.id));
    pending.is_active = false;
    let pending = users::create_user(&pool, &pending).await.unwrap();

    let inactive = users::list_users(&pool, &UserFilter { is_active: Some(false), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0].id, pending.id);

    let at_a = users::list_active_with_roles(&pool, &Role::ALL, Some(a.id)).await.unwrap();
    assert_eq!(at_a.len(), 2);

    let admins = users::list_active_with_roles(&pool, &[Role::Admin], None).await.unwrap();
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0].username, "ad_b");

    let approvers = users::list_approvers(&pool).await.unwrap();
    assert_eq!(approvers.len(), 1);

    let changed = users::set_active_many(&pool, &[pending.id], true).await.unwrap();
    assert_eq!(changed, 1);
    assert!(users::get_user(&pool, pending.id).await.unwrap().is_active);
}

#[tokio::test]
async fn test_session_idle_timeout() {
    let (_dir, pool) = fresh_db().await;
    let user = users::create_user(&pool, &new_user("officer", Some(Role::ResearchOfficer), None))
        .await
        .unwrap();
    let session = users::create_session(&pool, user.id).await.unwrap();
    let timeout = Duration::minutes(30);

    let lookup = users::resolve_session(&pool, &session.token, timeout, Utc::now()).await.unwrap();
    assert!(matches!(lookup, SessionLookup::Valid(u) if u.id == user.id));

    let later = Utc::now() + Duration::minutes(31);
    let lookup = users::resolve_session(&pool, &session.token, timeout, later).await.unwrap();
    assert!(matches!(lookup, SessionLookup::Expired));

    // Expired sessions are removed
    let lookup = users::resolve_session(&pool, &session.token, timeout, Utc::now()).await.unwrap();
    assert!(matches!(lookup, SessionLookup::Unknown));
}

#[tokio::test]
async fn test_participant_due_date_follows_enrollment() {
    let (_dir, pool) = fresh_db().await;
    let site = sites::create_site(&pool, "Mombasa").await.unwrap();

    let mut p = participants::insert_participant(
        &pool,
        &NewParticipant {
            site_id: site.id,
            screening_session_id: None,
            study_id: "Mombasa_001".to_string(),
            enrollment_date: date(2025, 1, 1),
            date_of_birth: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(p.due_date, date(2025, 1, 8));
    assert_eq!(p.site_name, "Mombasa");

    p.enrollment_date = date(2025, 1, 20);
    p.checklist.set_done(TrackingItem::BloodCultureDone, true);
    p.checklist.set_comment(TrackingItem::CaseReportFormUploaded, Some("Form lost".to_string()));
    participants::save_participant(&pool, &mut p).await.unwrap();

    let reloaded = participants::get_participant(&pool, p.id).await.unwrap();
    assert_eq!(reloaded.due_date, date(2025, 1, 27));
    assert!(reloaded.checklist.is_done(TrackingItem::BloodCultureDone));
    assert_eq!(
        reloaded.checklist.comment_for("case_report_form_uploaded"),
        Some("Form lost")
    );
}

#[tokio::test]
async fn test_study_id_uniqueness_check() {
    let (_dir, pool) = fresh_db().await;
    let site = sites::create_site(&pool, "Kilifi").await.unwrap();
    let p = participants::insert_participant(
        &pool,
        &NewParticipant {
            site_id: site.id,
            screening_session_id: None,
            study_id: "Kilifi_010".to_string(),
            enrollment_date: date(2025, 2, 1),
            date_of_birth: None,
        },
    )
    .await
    .unwrap();

    assert!(participants::study_id_exists(&pool, "Kilifi_010", None).await.unwrap());
    assert!(!participants::study_id_exists(&pool, "Kilifi_010", Some(p.id)).await.unwrap());
    assert!(!participants::study_id_exists(&pool, "Kilifi_011", None).await.unwrap());

    // A write that skips the check is still stopped by the constraint
    let err = participants::insert_participant(
        &pool,
        &NewParticipant {
            site_id: site.id,
            screening_session_id: None,
            study_id: "Kilifi_010".to_string(),
            enrollment_date: date(2025, 2, 2),
            date_of_birth: None,
        },
    )
    .await
    .unwrap_err();
    assert!(err.is_unique_violation());
}

#[tokio::test]
async fn test_mark_downloaded_records_who_and_when() {
    let (_dir, pool) = fresh_db().await;
    let site = sites::create_site(&pool, "Eldoret").await.unwrap();
    let officer = users::create_user(&pool, &new_user("ro", Some(Role::ResearchOfficer), Some(site.id)))
        .await
        .unwrap();
    let p = participants::insert_participant(
        &pool,
        &NewParticipant {
            site_id: site.id,
            screening_session_id: None,
            study_id: "Eldoret_001".to_string(),
            enrollment_date: date(2025, 3, 1),
            date_of_birth: None,
        },
    )
    .await
    .unwrap();

    let at = Utc::now();
    let marked = participants::mark_downloaded(&pool, p.id, TrackingItem::MonitorDownloaded, officer.id, at)
        .await
        .unwrap();
    assert!(marked.checklist.is_done(TrackingItem::MonitorDownloaded));
    assert_eq!(marked.monitor_downloaded_by, Some(officer.id));
    assert!(marked.monitor_downloaded_at.is_some());

    let err = participants::mark_downloaded(&pool, p.id, TrackingItem::BloodCultureDone, officer.id, at).await;
    assert!(matches!(err, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_scoped_listing_and_screening_totals() {
    let (_dir, pool) = fresh_db().await;
    let a = sites::create_site(&pool, "A").await.unwrap();
    let b = sites::create_site(&pool, "B").await.unwrap();
    let ra = users::create_user(&pool, &new_user("ra", Some(Role::ResearchAssistant), Some(a.id)))
        .await
        .unwrap();

    for (site, study_id) in [(&a, "A_001"), (&a, "A_002"), (&b, "B_001")] {
        participants::insert_participant(
            &pool,
            &NewParticipant {
                site_id: site.id,
                screening_session_id: None,
                study_id: study_id.to_string(),
                enrollment_date: date(2025, 4, 1),
                date_of_birth: None,
            },
        )
        .await
        .unwrap();
    }

    for (site, screened) in [(&a, 12), (&a, 8), (&b, 5)] {
        screening::insert_session(
            &pool,
            &NewScreeningSession {
                ra_id: ra.id,
                site_id: site.id,
                date: date(2025, 4, 1),
                number_screened: screened,
                number_eligible: 1,
            },
        )
        .await
        .unwrap();
    }

    assert_eq!(participants::list_participants(&pool, SiteScope::All).await.unwrap().len(), 3);
    assert_eq!(participants::list_participants(&pool, SiteScope::Site(Some(a.id))).await.unwrap().len(), 2);
    assert!(participants::list_participants(&pool, SiteScope::Site(None)).await.unwrap().is_empty());

    assert_eq!(screening::total_screened(&pool, SiteScope::All).await.unwrap(), 25);
    assert_eq!(screening::total_screened(&pool, SiteScope::Site(Some(a.id))).await.unwrap(), 20);
    assert_eq!(screening::total_screened(&pool, SiteScope::Site(None)).await.unwrap(), 0);
}

#[tokio::test]
async fn test_notification_log_round_trip() {
    let (_dir, pool) = fresh_db().await;
    let site = sites::create_site(&pool, "Thika").await.unwrap();
    let admin = users::create_user(&pool, &new_user("pi", Some(Role::Admin), Some(site.id)))
        .await
        .unwrap();
    let p = participants::insert_participant(
        &pool,
        &NewParticipant {
            site_id: site.id,
            screening_session_id: None,
            study_id: "Thika_001".to_string(),
            enrollment_date: date(2025, 5, 1),
            date_of_birth: None,
        },
    )
    .await
    .unwrap();

    notifications::record_notification(&pool, p.id, NotificationType::OverdueAlert, Some(admin.id), Utc::now())
        .await
        .unwrap();
    notifications::record_notification(&pool, p.id, NotificationType::EarlyReminder, None, Utc::now())
        .await
        .unwrap();

    assert_eq!(notifications::count_notifications(&pool, None).await.unwrap(), 2);
    let all = notifications::list_notifications(&pool, None, 10, 0).await.unwrap();
    assert_eq!(all.len(), 2);
    // Most recent first
    assert_eq!(all[0].notification_type, NotificationType::EarlyReminder);

    let second_page = notifications::list_notifications(&pool, None, 1, 1).await.unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].notification_type, NotificationType::OverdueAlert);

    let overdue = notifications::list_notifications(&pool, Some(NotificationType::OverdueAlert), 10, 0)
        .await
        .unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].study_id, "Thika_001");
    assert_eq!(overdue[0].recipient_username.as_deref(), Some("pi"));
}
