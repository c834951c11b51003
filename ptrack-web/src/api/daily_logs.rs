//! Personal daily logs
//!
//! Entries are private to their author; another user's id yields 404.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use ptrack_common::db::daily_logs;
use ptrack_common::db::models::DailyLog;
use ptrack_common::forms::DailyLogForm;
use ptrack_common::time;
use serde_json::{json, Value};

use crate::api::auth::CurrentUser;
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/logs
pub async fn list_logs(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<DailyLog>>> {
    Ok(Json(daily_logs::list_logs(&state.db, current.user.id).await?))
}

/// POST /api/logs
pub async fn create_log(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(form): Json<DailyLogForm>,
) -> ApiResult<(StatusCode, Json<DailyLog>)> {
    let entry = form.validate(time::local_today())?;
    let log = daily_logs::insert_log(&state.db, current.user.id, &entry).await?;
    Ok((StatusCode::CREATED, Json(log)))
}

/// POST /api/logs/:id
pub async fn update_log(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(form): Json<DailyLogForm>,
) -> ApiResult<Json<DailyLog>> {
    let entry = form.validate(time::local_today())?;
    let log = daily_logs::update_log(&state.db, current.user.id, id, &entry).await?;
    Ok(Json(log))
}

/// DELETE /api/logs/:id
pub async fn delete_log(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    daily_logs::delete_log(&state.db, current.user.id, id).await?;
    Ok(Json(json!({ "message": "Log deleted." })))
}
