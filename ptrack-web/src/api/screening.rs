//! Screening sessions

use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::NaiveDate;
use ptrack_common::db::models::ScreeningSession;
use ptrack_common::db::screening::{self, NewScreeningSession};
use ptrack_common::db::sites;
use ptrack_common::forms::validate_screening_counts;
use ptrack_common::{time, Error, Role};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ScreeningRequest {
    pub date: Option<NaiveDate>,
    pub number_screened: i64,
    pub number_eligible: i64,
    /// Only honoured for superusers; everyone else records for their own site
    pub site: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ScreeningResponse {
    pub message: String,
    pub session: ScreeningSession,
}

/// POST /api/screening
pub async fn record_screening_session(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<ScreeningRequest>,
) -> ApiResult<(StatusCode, Json<ScreeningResponse>)> {
    let principal = current.principal();
    if !principal.allowed(&[Role::ResearchAssistant, Role::Admin]) {
        return Err(ApiError::forbidden(
            "Only RAs, PIs, or superusers can record screening sessions.",
        ));
    }

    validate_screening_counts(req.number_screened, req.number_eligible)?;

    let site_id = if principal.is_superuser {
        req.site.or(principal.site_id)
    } else {
        principal.site_id
    }
    .ok_or_else(|| ApiError::field("site", "Site must be specified either by selection or your user profile."))?;

    match sites::get_site(&state.db, site_id).await {
        Ok(_) => {}
        Err(Error::NotFound(_)) => return Err(ApiError::field("site", "Select a valid choice.")),
        Err(e) => return Err(e.into()),
    }

    let session = screening::insert_session(
        &state.db,
        &NewScreeningSession {
            ra_id: current.user.id,
            site_id,
            date: req.date.unwrap_or_else(time::local_today),
            number_screened: req.number_screened,
            number_eligible: req.number_eligible,
        },
    )
    .await?;
    info!(
        "Screening session {} recorded by {}: screened {}, eligible {}",
        session.id, current.user.username, session.number_screened, session.number_eligible
    );

    Ok((
        StatusCode::CREATED,
        Json(ScreeningResponse {
            message: format!(
                "Screening saved. Screened: {}, Eligible: {}.",
                session.number_screened, session.number_eligible
            ),
            session,
        }),
    ))
}

/// GET /api/screening
pub async fn list_screening_sessions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<ScreeningSession>>> {
    let principal = current.principal();
    if principal.role.is_none() && !principal.is_superuser {
        return Err(ApiError::forbidden("Permission denied."));
    }
    Ok(Json(
        screening::list_sessions(&state.db, principal.site_scope()).await?,
    ))
}
