//! Role dashboards
//!
//! All three read the participants of the caller's site (every site for a
//! superuser) and differ only in filtering and order.

use axum::{extract::State, Extension, Json};
use ptrack_common::db::{participants, screening};
use ptrack_common::{time, Role};
use serde::Serialize;

use crate::api::auth::CurrentUser;
use crate::api::participants::ParticipantView;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub participants: Vec<ParticipantView>,
}

/// GET /api/dashboard/ra
///
/// Participants still missing items, newest enrollment first.
pub async fn ra_dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<DashboardResponse>> {
    let principal = current.principal();
    if !principal.allowed(&[Role::ResearchAssistant, Role::Admin]) {
        return Err(ApiError::forbidden(
            "Only RAs, PIs, or superusers can access the dashboard.",
        ));
    }

    let today = time::local_today();
    let participants = participants::list_participants(&state.db, principal.site_scope())
        .await?
        .into_iter()
        .filter(|p| !p.is_completed())
        .map(|p| ParticipantView::new(&p, today, &principal))
        .collect();

    Ok(Json(DashboardResponse { participants }))
}

/// GET /api/dashboard/ro
///
/// Participants still missing items, most urgent first.
pub async fn ro_dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<DashboardResponse>> {
    let principal = current.principal();
    if !principal.allowed(&[Role::ResearchOfficer, Role::Admin]) {
        return Err(ApiError::forbidden(
            "Only ROs, PIs, or superusers can access the dashboard.",
        ));
    }

    let today = time::local_today();
    let mut participants: Vec<ParticipantView> =
        participants::list_participants(&state.db, principal.site_scope())
            .await?
            .into_iter()
            .filter(|p| !p.is_completed())
            .map(|p| ParticipantView::new(&p, today, &principal))
            .collect();
    participants.sort_by_key(|p| p.days_remaining);

    Ok(Json(DashboardResponse { participants }))
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub participants: Vec<ParticipantView>,
    pub pending: Vec<ParticipantView>,
    pub completed: Vec<ParticipantView>,
    pub number_screened: i64,
}

/// GET /api/dashboard/summary
pub async fn summary_dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<SummaryResponse>> {
    let principal = current.principal();
    if !principal.allowed(&[Role::Admin, Role::ResearchOfficer]) {
        return Err(ApiError::forbidden(
            "Only PIs or superusers can access this page.",
        ));
    }

    let today = time::local_today();
    let scope = principal.site_scope();
    let all = participants::list_participants(&state.db, scope).await?;

    let mut pending = Vec::new();
    let mut completed = Vec::new();
    for participant in &all {
        let view = ParticipantView::new(participant, today, &principal);
        if participant.is_completed() {
            completed.push(view);
        } else {
            pending.push(view);
        }
    }

    Ok(Json(SummaryResponse {
        participants: all
            .iter()
            .map(|p| ParticipantView::new(p, today, &principal))
            .collect(),
        pending,
        completed,
        number_screened: screening::total_screened(&state.db, scope).await?,
    }))
}
