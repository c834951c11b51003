//! PDF export of completed participants

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Extension,
};
use ptrack_common::db::{participants, sites};
use tracing::info;

use crate::api::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::report::{self, REPORT_FILENAME};
use crate::AppState;

/// GET /api/dashboard/summary/pdf
pub async fn download_completed_pdf(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Response> {
    let principal = current.principal();
    if !principal.is_admin() {
        return Err(ApiError::forbidden("Only PIs or superusers can download PDF."));
    }

    let site_label = if principal.is_superuser {
        "All Sites".to_string()
    } else {
        match principal.site_id {
            Some(site_id) => sites::get_site(&state.db, site_id).await?.name,
            None => "No Site".to_string(),
        }
    };

    let visible = participants::list_participants(&state.db, principal.site_scope()).await?;
    let rows = report::report_rows(&visible);
    let pdf = report::render_pdf(&site_label, &rows)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!(
        "Completion report ({} rows) downloaded by {}",
        rows.len(),
        current.user.username
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", REPORT_FILENAME),
            ),
        ],
        pdf,
    )
        .into_response())
}
