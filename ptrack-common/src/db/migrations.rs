//! Database schema migrations
//!
//! Versioned, sequential migrations tracked in the `schema_version` table.
//! Each migration checks current state before changing anything, so running
//! it against a database that already has the change is a no-op.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - deployed databases depend on them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Use ALTER TABLE** - preserve participant data

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        warn!("This may indicate a downgrade. Proceeding with caution.");
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    info!("All migrations completed successfully");
    Ok(())
}

/// Migration v1: Site lookup indexes
///
/// Dashboards and reminders filter participants and users by site on every
/// request.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: Add site indexes");

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_participants_site ON participants(site_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_site ON users(site_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_screening_sessions_site ON screening_sessions(site_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Migration v2: Add vital sign monitoring item to participants
///
/// **Background:** The checklist originally stopped at the 24-hour
/// admission notes. Vital sign monitoring was added later as an optional
/// item with its own comment column.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: Add vital_sign_monitoring_done to participants");

    let columns_to_add = [
        ("vital_sign_monitoring_done", "INTEGER NOT NULL DEFAULT 0"),
        ("vital_sign_monitoring_done_comment", "TEXT"),
    ];

    for (column_name, column_type) in columns_to_add {
        let has_column: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM pragma_table_info('participants') WHERE name = '{}'",
            column_name
        ))
        .fetch_one(pool)
        .await?;

        if has_column > 0 {
            info!("  {} column already exists - skipping", column_name);
            continue;
        }

        match sqlx::query(&format!(
            "ALTER TABLE participants ADD COLUMN {} {}",
            column_name, column_type
        ))
        .execute(pool)
        .await
        {
            Ok(_) => info!("  ✓ Added {} column to participants table", column_name),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
                info!("  {} column added concurrently - skipping", column_name);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
