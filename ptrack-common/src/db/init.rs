//! Database initialization
//!
//! Opens (creating if necessary) the SQLite database, applies connection
//! pragmas, creates any missing tables and runs pending migrations. Every
//! step is idempotent, so it is safe to run on each startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL lets the reminder job read while the web service writes
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Create every table that does not exist yet
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_sites_table(pool).await?;
    create_users_table(pool).await?;
    create_sessions_table(pool).await?;
    create_screening_sessions_table(pool).await?;
    create_participants_table(pool).await?;
    create_notification_logs_table(pool).await?;
    create_daily_logs_table(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sites_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Study team accounts
///
/// `role` is NULL only for superusers created from the operator CLI.
/// Deleting a site leaves its users without a site.
async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            role TEXT CHECK (role IN ('RA', 'RO', 'AD')),
            site_id INTEGER REFERENCES sites(id) ON DELETE SET NULL,
            is_active INTEGER NOT NULL DEFAULT 0,
            is_superuser INTEGER NOT NULL DEFAULT 0,
            password_hash TEXT NOT NULL,
            password_salt TEXT NOT NULL,
            date_joined TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL,
            last_seen_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_screening_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS screening_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ra_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
            date DATE NOT NULL,
            number_screened INTEGER NOT NULL DEFAULT 0 CHECK (number_screened >= 0),
            number_eligible INTEGER NOT NULL DEFAULT 0 CHECK (number_eligible >= 0),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Participants and their tracking checklist
///
/// Each checklist item is a `<key>` boolean column paired with a
/// `<key>_comment` text column (see `checklist::TrackingItem`).
async fn create_participants_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS participants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
            screening_session_id INTEGER REFERENCES screening_sessions(id) ON DELETE CASCADE,
            study_id TEXT NOT NULL UNIQUE,
            enrollment_date DATE NOT NULL,
            due_date DATE NOT NULL,
            date_of_birth DATE,

            monitor_downloaded INTEGER NOT NULL DEFAULT 0,
            monitor_downloaded_comment TEXT,
            monitor_downloaded_at TIMESTAMP,
            monitor_downloaded_by INTEGER REFERENCES users(id) ON DELETE SET NULL,

            ultrasound_downloaded INTEGER NOT NULL DEFAULT 0,
            ultrasound_downloaded_comment TEXT,
            ultrasound_downloaded_at TIMESTAMP,
            ultrasound_downloaded_by INTEGER REFERENCES users(id) ON DELETE SET NULL,

            case_report_form_uploaded INTEGER NOT NULL DEFAULT 0,
            case_report_form_uploaded_comment TEXT,
            video_laryngoscope_uploaded INTEGER NOT NULL DEFAULT 0,
            video_laryngoscope_uploaded_comment TEXT,
            rop_final_report_uploaded INTEGER NOT NULL DEFAULT 0,
            rop_final_report_uploaded_comment TEXT,
            head_ultrasound_images_uploaded INTEGER NOT NULL DEFAULT 0,
            head_ultrasound_images_uploaded_comment TEXT,
            head_ultrasound_report_uploaded INTEGER NOT NULL DEFAULT 0,
            head_ultrasound_report_uploaded_comment TEXT,
            cost_effectiveness_data_uploaded INTEGER NOT NULL DEFAULT 0,
            cost_effectiveness_data_uploaded_comment TEXT,
            blood_culture_done INTEGER NOT NULL DEFAULT 0,
            blood_culture_done_comment TEXT,
            admission_notes_day1_uploaded INTEGER NOT NULL DEFAULT 0,
            admission_notes_day1_uploaded_comment TEXT,
            admission_notes_24hr_uploaded INTEGER NOT NULL DEFAULT 0,
            admission_notes_24hr_uploaded_comment TEXT,

            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_notification_logs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notification_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            participant_id INTEGER NOT NULL REFERENCES participants(id) ON DELETE CASCADE,
            notification_type TEXT NOT NULL,
            sent_at TIMESTAMP NOT NULL,
            recipient_id INTEGER REFERENCES users(id) ON DELETE SET NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_daily_logs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            date DATE NOT NULL,
            title TEXT,
            tag TEXT NOT NULL DEFAULT 'MISC' CHECK (tag IN ('OBS', 'EQP', 'REM', 'MISC')),
            content TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
