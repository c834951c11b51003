//! Participant registration, detail, update and quick confirmations

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use ptrack_common::db::models::Participant;
use ptrack_common::db::participants::{self, NewParticipant};
use ptrack_common::db::{screening, sites};
use ptrack_common::forms::{self, DUPLICATE_STUDY_ID_MESSAGE};
use ptrack_common::schedule::StatusColor;
use ptrack_common::{time, Dashboard, Error, FieldErrors, Principal, Role, TrackingItem};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ItemView {
    pub key: &'static str,
    pub label: &'static str,
    pub required: bool,
    pub done: bool,
    pub comment: Option<String>,
}

/// Participant as sent to clients, with derived schedule and completion state
#[derive(Debug, Serialize)]
pub struct ParticipantView {
    pub id: i64,
    pub site_id: i64,
    pub site_name: String,
    pub screening_session_id: Option<i64>,
    pub study_id: String,
    pub enrollment_date: NaiveDate,
    pub due_date: NaiveDate,
    pub date_of_birth: Option<NaiveDate>,
    pub days_remaining: i64,
    pub status_color: StatusColor,
    pub is_completed: bool,
    pub items: Vec<ItemView>,
    pub missing_items: Vec<&'static str>,
    pub monitor_downloaded_at: Option<DateTime<Utc>>,
    pub monitor_downloaded_by: Option<i64>,
    pub ultrasound_downloaded_at: Option<DateTime<Utc>>,
    pub ultrasound_downloaded_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub can_edit: bool,
}

impl ParticipantView {
    pub fn new(participant: &Participant, today: NaiveDate, principal: &Principal) -> Self {
        let items = participant
            .checklist
            .iter()
            .map(|(item, state)| ItemView {
                key: item.key(),
                label: item.label(),
                required: item.is_required(),
                done: state.done,
                comment: state.comment.clone(),
            })
            .collect();

        Self {
            id: participant.id,
            site_id: participant.site_id,
            site_name: participant.site_name.clone(),
            screening_session_id: participant.screening_session_id,
            study_id: participant.study_id.clone(),
            enrollment_date: participant.enrollment_date,
            due_date: participant.due_date,
            date_of_birth: participant.date_of_birth,
            days_remaining: participant.days_remaining(today),
            status_color: participant.status_color(today),
            is_completed: participant.is_completed(),
            items,
            missing_items: participant
                .missing_items()
                .iter()
                .map(TrackingItem::label)
                .collect(),
            monitor_downloaded_at: participant.monitor_downloaded_at,
            monitor_downloaded_by: participant.monitor_downloaded_by,
            ultrasound_downloaded_at: participant.ultrasound_downloaded_at,
            ultrasound_downloaded_by: participant.ultrasound_downloaded_by,
            created_at: participant.created_at,
            can_edit: principal.can_confirm_items(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Three digits; the site name is prefixed to form the study id
    pub study_number: String,
    pub enrollment_date: Option<NaiveDate>,
    pub site: Option<i64>,
    pub date_of_birth: Option<NaiveDate>,
    pub screening_session_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ParticipantResponse {
    pub message: String,
    pub participant: ParticipantView,
}

/// Site a new participant is registered at
///
/// RAs always register at their own site. PIs must pick one. A superuser
/// may pick one and otherwise falls back to their own profile.
fn registration_site(principal: &Principal, selected: Option<i64>) -> Result<i64, FieldErrors> {
    if principal.is_superuser {
        return selected.or(principal.site_id).ok_or_else(|| {
            FieldErrors::single("site", "Site must be selected for superuser registration.")
        });
    }

    match principal.role {
        Some(Role::ResearchAssistant) => principal.site_id,
        Some(Role::Admin) | Some(Role::ResearchOfficer) => match selected {
            Some(site_id) => Some(site_id),
            None => return Err(FieldErrors::single("site", "This field is required.")),
        },
        None => None,
    }
    .ok_or_else(|| {
        FieldErrors::single(
            "study_number",
            "Site must be specified either by selection or your user profile.",
        )
    })
}

/// POST /api/participants
pub async fn register_participant(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<ParticipantResponse>)> {
    let principal = current.principal();
    if !principal.allowed(&[Role::ResearchAssistant, Role::Admin]) {
        return Err(ApiError::forbidden(
            "Only RAs, PIs, or superusers can register participants.",
        ));
    }

    let mut errors = FieldErrors::new();
    let study_number = match forms::validate_study_number(&req.study_number) {
        Ok(number) => Some(number),
        Err(message) => {
            errors.add("study_number", message);
            None
        }
    };
    let site_id = match registration_site(&principal, req.site) {
        Ok(site_id) => site_id,
        Err(site_errors) => {
            errors.merge(site_errors);
            return Err(ApiError::Validation(errors));
        }
    };
    let Some(study_number) = study_number else {
        return Err(ApiError::Validation(errors));
    };

    let site = match sites::get_site(&state.db, site_id).await {
        Ok(site) => site,
        Err(Error::NotFound(_)) => {
            return Err(ApiError::field("site", "Select a valid choice."));
        }
        Err(e) => return Err(e.into()),
    };

    let study_id = forms::full_study_id(&site.name, study_number);
    if participants::study_id_exists(&state.db, &study_id, None).await? {
        return Err(ApiError::field("study_number", DUPLICATE_STUDY_ID_MESSAGE));
    }

    if let Some(session_id) = req.screening_session_id {
        let session = match screening::get_session(&state.db, session_id).await {
            Ok(session) => session,
            Err(Error::NotFound(_)) => {
                return Err(ApiError::field(
                    "screening_session_id",
                    "Select a valid choice.",
                ))
            }
            Err(e) => return Err(e.into()),
        };
        if session.site_id != site.id {
            return Err(ApiError::field(
                "screening_session_id",
                "Screening session belongs to a different site.",
            ));
        }
    }

    let today = time::local_today();
    let participant = participants::insert_participant(
        &state.db,
        &NewParticipant {
            site_id: site.id,
            screening_session_id: req.screening_session_id,
            study_id,
            enrollment_date: req.enrollment_date.unwrap_or(today),
            date_of_birth: req.date_of_birth,
        },
    )
    .await
    .map_err(ApiError::on_conflict("study_number", DUPLICATE_STUDY_ID_MESSAGE))?;
    info!(
        "Participant {} registered by {}",
        participant.study_id, current.user.username
    );

    Ok((
        StatusCode::CREATED,
        Json(ParticipantResponse {
            message: format!("Participant {} registered.", participant.study_id),
            participant: ParticipantView::new(&participant, today, &principal),
        }),
    ))
}

/// GET /api/participants/:id
pub async fn participant_detail(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ParticipantView>> {
    let principal = current.principal();
    let participant = participants::get_participant(&state.db, id).await?;
    if !principal.can_see_site(participant.site_id) {
        return Err(ApiError::forbidden(
            "You can only view participants from your site.",
        ));
    }
    Ok(Json(ParticipantView::new(
        &participant,
        time::local_today(),
        &principal,
    )))
}

/// Partial update; absent fields are left alone
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRequest {
    pub study_id: Option<String>,
    pub date_of_birth: Option<String>,
    pub enrollment_date: Option<String>,
    /// Keys of the items that are confirmed; items not listed are cleared
    pub items: Option<Vec<String>>,
    /// Comment per item, keyed by item key or comment key
    pub comments: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub message: String,
    pub warnings: Vec<String>,
    pub redirect: Dashboard,
    pub redirect_url: &'static str,
    pub participant: ParticipantView,
}

/// POST /api/participants/:id/update
pub async fn update_participant(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRequest>,
) -> ApiResult<Json<UpdateResponse>> {
    let principal = current.principal();
    let mut participant = participants::get_participant(&state.db, id).await?;

    if !principal.is_superuser {
        if principal.role.is_none() {
            return Err(ApiError::forbidden(
                "You do not have permission to update this participant.",
            ));
        }
        if principal.site_id != Some(participant.site_id) {
            return Err(ApiError::forbidden(
                "Access Denied. Participant does not belong to your site.",
            ));
        }
    }

    let mut warnings = Vec::new();

    if let Some(study_id) = &req.study_id {
        let study_id = study_id.trim();
        if study_id.is_empty() {
            return Err(ApiError::field("study_id", "This field is required."));
        }
        if participants::study_id_exists(&state.db, study_id, Some(participant.id)).await? {
            return Err(ApiError::field("study_id", DUPLICATE_STUDY_ID_MESSAGE));
        }
        participant.study_id = study_id.to_string();
    }

    if let Some(value) = req.date_of_birth.as_deref().filter(|v| !v.trim().is_empty()) {
        match time::parse_iso_date(value) {
            Some(date) => participant.date_of_birth = Some(date),
            None => warnings.push("Invalid Date of Birth format. Use YYYY-MM-DD.".to_string()),
        }
    }
    if let Some(value) = req.enrollment_date.as_deref().filter(|v| !v.trim().is_empty()) {
        match time::parse_iso_date(value) {
            Some(date) => participant.enrollment_date = date,
            None => {
                warnings.push("Invalid Enrollment Date format. Use YYYY-MM-DD.".to_string())
            }
        }
    }

    if req.items.is_some() || req.comments.is_some() {
        if principal.can_confirm_items() {
            apply_items(&mut participant, &req)?;
        } else {
            warn!(
                "Ignoring checklist changes from {} on {}",
                current.user.username, participant.study_id
            );
            warnings.push(
                "Only ROs, PIs, or superusers can confirm tracking items.".to_string(),
            );
        }
    }

    participants::save_participant(&state.db, &mut participant)
        .await
        .map_err(ApiError::on_conflict("study_id", DUPLICATE_STUDY_ID_MESSAGE))?;
    info!(
        "Participant {} updated by {}",
        participant.study_id, current.user.username
    );

    let redirect = principal.after_update_dashboard();
    Ok(Json(UpdateResponse {
        message: format!("Participant {} updated successfully.", participant.study_id),
        warnings,
        redirect,
        redirect_url: redirect.path(),
        participant: ParticipantView::new(&participant, time::local_today(), &principal),
    }))
}

/// Apply checkbox and comment changes, rejecting unknown item keys
fn apply_items(participant: &mut Participant, req: &UpdateRequest) -> ApiResult<()> {
    let mut errors = FieldErrors::new();

    if let Some(keys) = &req.items {
        let mut confirmed = Vec::with_capacity(keys.len());
        for key in keys {
            match TrackingItem::from_key(key) {
                Some(item) => confirmed.push(item),
                None => errors.add("items", format!("Unknown tracking item: {}", key)),
            }
        }
        for item in TrackingItem::ALL {
            participant
                .checklist
                .set_done(item, confirmed.contains(&item));
        }
    }

    if let Some(comments) = &req.comments {
        for (field, comment) in comments {
            let key = field.strip_suffix("_comment").unwrap_or(field);
            match TrackingItem::from_key(key) {
                Some(item) => participant
                    .checklist
                    .set_comment(item, Some(comment.clone())),
                None => errors.add("comments", format!("Unknown tracking item: {}", field)),
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

async fn mark_downloaded(
    state: &AppState,
    current: &CurrentUser,
    id: i64,
    item: TrackingItem,
) -> ApiResult<Json<ParticipantResponse>> {
    let principal = current.principal();
    let participant = participants::get_participant(&state.db, id).await?;

    let permitted = principal.is_superuser
        || (principal.site_id == Some(participant.site_id)
            && principal.has_role(&[Role::ResearchOfficer, Role::Admin]));
    if !permitted {
        return Err(ApiError::forbidden("Permission denied."));
    }

    let participant =
        participants::mark_downloaded(&state.db, id, item, current.user.id, time::now()).await?;
    let what = match item {
        TrackingItem::MonitorDownloaded => "Monitor",
        _ => "Ultrasound",
    };
    info!(
        "{} download confirmed for {} by {}",
        what, participant.study_id, current.user.username
    );

    Ok(Json(ParticipantResponse {
        message: format!("{} download confirmed for {}", what, participant.study_id),
        participant: ParticipantView::new(&participant, time::local_today(), &principal),
    }))
}

/// POST /api/participants/:id/monitor
pub async fn mark_monitor_downloaded(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ParticipantResponse>> {
    mark_downloaded(&state, &current, id, TrackingItem::MonitorDownloaded).await
}

/// POST /api/participants/:id/ultrasound
pub async fn mark_ultrasound_downloaded(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ParticipantResponse>> {
    mark_downloaded(&state, &current, id, TrackingItem::UltrasoundDownloaded).await
}
