//! Notification log listing

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use ptrack_common::db::models::{NotificationLog, NotificationType};
use ptrack_common::db::notifications;
use serde::{Deserialize, Serialize};

use crate::api::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{calculate_pagination, PAGE_SIZE};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    /// `EARLY_REMINDER`, `OVERDUE_ALERT`, ...
    #[serde(rename = "type")]
    pub notification_type: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct NotificationListResponse {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub notifications: Vec<NotificationLog>,
}

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<NotificationListResponse>> {
    if !current.principal().is_admin() {
        return Err(ApiError::forbidden("Only PIs or superusers can view notifications."));
    }

    let notification_type = match query.notification_type.as_deref() {
        None | Some("") => None,
        Some(code) => Some(NotificationType::from_code(code).ok_or_else(|| {
            ApiError::BadRequest(format!("Unknown notification type: {}", code))
        })?),
    };

    let total = notifications::count_notifications(&state.db, notification_type).await?;
    let pagination = calculate_pagination(total, query.page);
    let logs = notifications::list_notifications(
        &state.db,
        notification_type,
        PAGE_SIZE,
        pagination.offset,
    )
    .await?;

    Ok(Json(NotificationListResponse {
        total,
        page: pagination.page,
        page_size: PAGE_SIZE,
        total_pages: pagination.total_pages,
        notifications: logs,
    }))
}
