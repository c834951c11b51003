//! Study sites

use axum::{extract::State, http::StatusCode, Extension, Json};
use ptrack_common::db::{models::Site, sites};
use serde::Deserialize;
use tracing::info;

use crate::api::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/sites
///
/// Public: the signup form needs the list before anyone is logged in.
pub async fn list_sites(State(state): State<AppState>) -> ApiResult<Json<Vec<Site>>> {
    Ok(Json(sites::list_sites(&state.db).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateSiteRequest {
    pub name: String,
}

/// POST /api/sites
pub async fn create_site(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateSiteRequest>,
) -> ApiResult<(StatusCode, Json<Site>)> {
    if !current.principal().is_admin() {
        return Err(ApiError::forbidden("Only admins can create sites."));
    }

    let site = sites::create_site(&state.db, &req.name).await?;
    info!("Site {} created by {}", site.name, current.user.username);
    Ok((StatusCode::CREATED, Json(site)))
}
