//! Session authentication
//!
//! Protected routes accept the session token either from the
//! `ptrack_session` cookie or an `Authorization: Bearer` header. The
//! middleware resolves it to an active user and stores a [`CurrentUser`]
//! in the request extensions.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Duration;
use ptrack_common::auth::verify_password;
use ptrack_common::db::models::User;
use ptrack_common::db::users::{self, SessionLookup};
use ptrack_common::{time, Dashboard, Principal};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub const SESSION_COOKIE: &str = "ptrack_session";
pub const SESSION_TIMEOUT_MESSAGE: &str = "Session timed out due to inactivity.";
const LOGIN_FAILED_MESSAGE: &str = "Invalid username or password, or account not yet approved.";

/// Authenticated user attached to the request
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

impl CurrentUser {
    pub fn principal(&self) -> Principal {
        self.user.principal()
    }
}

/// Pull the session token out of the cookie or bearer header
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// Session middleware for protected routes
///
/// Unknown tokens get 401; idle sessions are expired and reported with the
/// timeout message so clients can show the auto-logout notice.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("Authentication required.".to_string()))?;

    let idle_timeout = Duration::minutes(state.config.session.idle_timeout_minutes);
    match users::resolve_session(&state.db, &token, idle_timeout, time::now()).await? {
        SessionLookup::Valid(user) => {
            request
                .extensions_mut()
                .insert(CurrentUser { user, token });
            Ok(next.run(request).await)
        }
        SessionLookup::Expired => {
            info!("Session expired after inactivity");
            Err(ApiError::Unauthorized(SESSION_TIMEOUT_MESSAGE.to_string()))
        }
        SessionLookup::Unknown => Err(ApiError::Unauthorized(
            "Authentication required.".to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Profile returned by login and `/api/me`
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: User,
    pub role_display: Option<&'static str>,
    pub dashboard: Dashboard,
    pub dashboard_url: &'static str,
}

impl ProfileResponse {
    fn for_user(user: User) -> Self {
        let dashboard = user.principal().landing_dashboard();
        Self {
            role_display: user.role.map(|r| r.display_name()),
            dashboard,
            dashboard_url: dashboard.path(),
            user,
        }
    }
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    let user = users::find_user_by_username(&state.db, &req.username).await?;
    let user = match user {
        Some(user)
            if user.is_active
                && verify_password(&req.password, &user.password_salt, &user.password_hash) =>
        {
            user
        }
        _ => {
            warn!("Failed login for {}", req.username.trim().to_lowercase());
            return Err(ApiError::Unauthorized(LOGIN_FAILED_MESSAGE.to_string()));
        }
    };

    let session = users::create_session(&state.db, user.id).await?;
    info!("User {} logged in", user.username);

    let cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/",
        SESSION_COOKIE, session.token
    );
    let profile = ProfileResponse::for_user(user);
    let body = Json(json!({
        "token": session.token,
        "user": profile.user,
        "role_display": profile.role_display,
        "dashboard": profile.dashboard,
        "dashboard_url": profile.dashboard_url,
    }));

    let mut response = (StatusCode::OK, body).into_response();
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::Internal(format!("Invalid session cookie: {}", e)))?;
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

/// POST /api/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Response> {
    users::delete_session(&state.db, &current.token).await?;
    info!("User {} logged out", current.user.username);

    let mut response = Json(json!({ "message": "Logged out." })).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        HeaderValue::from_static("ptrack_session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0"),
    );
    Ok(response)
}

/// GET /api/me
pub async fn me(Extension(current): Extension<CurrentUser>) -> Json<ProfileResponse> {
    Json(ProfileResponse::for_user(current.user))
}
