//! User and session queries

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use crate::auth;
use crate::db::models::{Session, User};
use crate::roles::Role;
use crate::{Error, Result};

const USER_COLUMNS: &str = "id, username, first_name, last_name, email, role, site_id, \
     is_active, is_superuser, password_hash, password_salt, date_joined";

/// Account to insert; the password is hashed here
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Option<Role>,
    pub site_id: Option<i64>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub password: String,
}

/// Filters for the admin user listing
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub site_id: Option<i64>,
    pub is_active: Option<bool>,
}

/// Insert a user; the username is stored lowercased
pub async fn create_user(pool: &SqlitePool, new: &NewUser) -> Result<User> {
    let salt = auth::generate_salt();
    let hash = auth::hash_password(&new.password, &salt);

    let id = sqlx::query(
        r#"
        INSERT INTO users (username, first_name, last_name, email, role, site_id,
                           is_active, is_superuser, password_hash, password_salt, date_joined)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new.username.trim().to_lowercase())
    .bind(new.first_name.trim())
    .bind(new.last_name.trim())
    .bind(new.email.trim())
    .bind(new.role.map(|r| r.code()))
    .bind(new.site_id)
    .bind(new.is_active)
    .bind(new.is_superuser)
    .bind(hash)
    .bind(salt)
    .bind(Utc::now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_user(pool, id).await
}

pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<User> {
    sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("user {}", id)))
}

/// Case-insensitive username lookup
pub async fn find_user_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username.trim().to_lowercase())
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn list_users(pool: &SqlitePool, filter: &UserFilter) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT {} FROM users
        WHERE (?1 IS NULL OR role = ?1)
          AND (?2 IS NULL OR site_id = ?2)
          AND (?3 IS NULL OR is_active = ?3)
        ORDER BY date_joined DESC, id DESC
        "#,
        USER_COLUMNS
    ))
    .bind(filter.role.map(|r| r.code()))
    .bind(filter.site_id)
    .bind(filter.is_active)
    .fetch_all(pool)
    .await?;
    Ok(users)
}

/// Active PIs and superusers, the audience for signup approvals
pub async fn list_approvers(pool: &SqlitePool) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE is_active = 1 AND (role = 'AD' OR is_superuser = 1) ORDER BY id",
        USER_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(users)
}

/// Active users holding one of `roles`, optionally limited to one site
pub async fn list_active_with_roles(
    pool: &SqlitePool,
    roles: &[Role],
    site_id: Option<i64>,
) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE is_active = 1 AND (?1 IS NULL OR site_id = ?1) ORDER BY id",
        USER_COLUMNS
    ))
    .bind(site_id)
    .fetch_all(pool)
    .await?;

    Ok(users
        .into_iter()
        .filter(|u| u.role.map(|r| roles.contains(&r)).unwrap_or(false))
        .collect())
}

pub async fn set_active(pool: &SqlitePool, id: i64, active: bool) -> Result<()> {
    let result = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
        .bind(active)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("user {}", id)));
    }
    Ok(())
}

/// Bulk activate/deactivate; returns the number of users changed
pub async fn set_active_many(pool: &SqlitePool, ids: &[i64], active: bool) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut updated = 0;
    for id in ids {
        updated += sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }
    tx.commit().await?;
    Ok(updated)
}

pub async fn delete_user(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// ========================================
// Sessions
// ========================================

pub async fn create_session(pool: &SqlitePool, user_id: i64) -> Result<Session> {
    let now = Utc::now();
    let session = Session {
        token: auth::generate_session_token(),
        user_id,
        created_at: now,
        last_seen_at: now,
    };

    sqlx::query(
        "INSERT INTO sessions (token, user_id, created_at, last_seen_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&session.token)
    .bind(session.user_id)
    .bind(session.created_at)
    .bind(session.last_seen_at)
    .execute(pool)
    .await?;

    Ok(session)
}

/// Outcome of resolving a session token
#[derive(Debug)]
pub enum SessionLookup {
    Valid(User),
    /// Token existed but was idle too long; it has been deleted
    Expired,
    Unknown,
}

/// Resolve a token to its (active) user, bumping `last_seen_at`
///
/// A session unused for longer than `idle_timeout` is deleted and reported
/// as expired. Sessions of deactivated users are treated as unknown.
pub async fn resolve_session(
    pool: &SqlitePool,
    token: &str,
    idle_timeout: Duration,
    now: DateTime<Utc>,
) -> Result<SessionLookup> {
    let session = sqlx::query_as::<_, Session>(
        "SELECT token, user_id, created_at, last_seen_at FROM sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    let Some(session) = session else {
        return Ok(SessionLookup::Unknown);
    };

    if now - session.last_seen_at > idle_timeout {
        delete_session(pool, token).await?;
        return Ok(SessionLookup::Expired);
    }

    let user = match get_user(pool, session.user_id).await {
        Ok(user) if user.is_active => user,
        Ok(_) | Err(Error::NotFound(_)) => return Ok(SessionLookup::Unknown),
        Err(e) => return Err(e),
    };

    sqlx::query("UPDATE sessions SET last_seen_at = ? WHERE token = ?")
        .bind(now)
        .bind(token)
        .execute(pool)
        .await?;

    Ok(SessionLookup::Valid(user))
}

pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}
