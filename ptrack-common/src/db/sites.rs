//! Site queries

use sqlx::SqlitePool;

use crate::db::models::Site;
use crate::{Error, FieldErrors, Result};

pub async fn list_sites(pool: &SqlitePool) -> Result<Vec<Site>> {
    let sites = sqlx::query_as::<_, Site>("SELECT id, name FROM sites ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(sites)
}

pub async fn get_site(pool: &SqlitePool, id: i64) -> Result<Site> {
    sqlx::query_as::<_, Site>("SELECT id, name FROM sites WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("site {}", id)))
}

pub async fn find_site_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Site>> {
    let site = sqlx::query_as::<_, Site>("SELECT id, name FROM sites WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(site)
}

/// Create a site; names are trimmed and must be unique
pub async fn create_site(pool: &SqlitePool, name: &str) -> Result<Site> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation(FieldErrors::single(
            "name",
            "This field is required.",
        )));
    }
    if find_site_by_name(pool, name).await?.is_some() {
        return Err(Error::Validation(FieldErrors::single(
            "name",
            "Site with this name already exists.",
        )));
    }

    let id = sqlx::query("INSERT INTO sites (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?
        .last_insert_rowid();

    Ok(Site {
        id,
        name: name.to_string(),
    })
}
