//! Account signup, approval and admin user management
//!
//! New accounts start inactive. Every active PI or superuser with an email
//! address is told about the request and approves or rejects it.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use ptrack_common::db::models::User;
use ptrack_common::db::{sites, users};
use ptrack_common::forms::SignupForm;
use ptrack_common::{Error, Role};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::mail::{escape_html, Email};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub message: &'static str,
    pub user_id: i64,
    /// Approvers that could not be notified
    pub notify_failures: usize,
}

/// POST /api/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(form): Json<SignupForm>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    let valid = form.validate()?;

    if users::find_user_by_username(&state.db, &valid.username)
        .await?
        .is_some()
    {
        return Err(ApiError::field(
            "username",
            "A user with that username already exists.",
        ));
    }

    let site = match sites::get_site(&state.db, valid.site_id).await {
        Ok(site) => site,
        Err(Error::NotFound(_)) => {
            return Err(ApiError::field(
                "site",
                "Select a valid choice. That choice is not one of the available choices.",
            ))
        }
        Err(e) => return Err(e.into()),
    };

    let user = users::create_user(
        &state.db,
        &users::NewUser {
            username: valid.username,
            first_name: valid.first_name,
            last_name: valid.last_name,
            email: valid.email,
            role: Some(valid.role),
            site_id: Some(site.id),
            is_active: false,
            is_superuser: false,
            password: valid.password,
        },
    )
    .await
    .map_err(ApiError::on_conflict(
        "username",
        "A user with that username already exists.",
    ))?;
    info!(
        "Signup pending approval: {} ({}) at {}",
        user.username,
        valid.role.code(),
        site.name
    );

    let approve_url = state.absolute_url(&format!("/api/users/{}/approve", user.id));
    let reject_url = state.absolute_url(&format!("/api/users/{}/reject", user.id));
    let mut notify_failures = 0;

    for admin in users::list_approvers(&state.db).await? {
        if !admin.has_email() {
            continue;
        }
        let email = Email {
            to: admin.email.clone(),
            subject: format!(
                "New Signup Pending Approval: {} ({})",
                user.username,
                valid.role.code()
            ),
            text_body: format!(
                "A new user has signed up.\n\nUsername: {}\nRole: {}\nSite: {}\n\nApprove: {}\nReject: {}",
                user.username,
                valid.role.code(),
                site.name,
                approve_url,
                reject_url
            ),
            html_body: None,
        };
        if let Err(e) = state.mailer.send(&email).await {
            warn!("Could not notify approver {}: {}", admin.username, e);
            notify_failures += 1;
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "Account created successfully. An admin will review and activate your account shortly.",
            user_id: user.id,
            notify_failures,
        }),
    ))
}

fn require_admin(current: &CurrentUser, message: &str) -> ApiResult<()> {
    if current.principal().is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden(message))
    }
}

/// POST /api/users/:id/approve
pub async fn approve_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    require_admin(&current, "Only admins can approve users.")?;

    let user = users::get_user(&state.db, user_id).await?;
    users::set_active(&state.db, user.id, true).await?;
    info!("User {} approved by {}", user.username, current.user.username);

    let login_url = state.absolute_url("/api/login");
    let email_sent = notify_user(
        &state,
        &user,
        Email {
            to: user.email.clone(),
            subject: "Your account has been approved".to_string(),
            text_body: format!(
                "Hello {},\n\nYour account has been approved. You can now log in here: {}",
                user.username, login_url
            ),
            html_body: Some(format!(
                "<html><body>\
                 <p>Hello <strong>{name}</strong>,</p>\
                 <p>Your account has been <strong>approved</strong> and you can now access the system.</p>\
                 <p><a href=\"{url}\" style=\"background-color:#007bff;color:white;padding:10px 20px;\
                 text-decoration:none;border-radius:5px;\">Click here to login</a></p>\
                 <p>Thank you,<br/>Preterm Africa Study Team</p>\
                 </body></html>",
                name = escape_html(&user.username),
                url = escape_html(&login_url),
            )),
        },
    )
    .await;

    Ok(Json(json!({
        "message": format!("User {} has been approved and activated.", user.username),
        "email_sent": email_sent,
    })))
}

/// POST /api/users/:id/reject
///
/// The rejection notice goes out before the account is deleted.
pub async fn reject_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    require_admin(&current, "Only admins can reject users.")?;

    let user = users::get_user(&state.db, user_id).await?;
    let email_sent = notify_user(
        &state,
        &user,
        Email {
            to: user.email.clone(),
            subject: "Your account has been rejected".to_string(),
            text_body: format!(
                "Hello {},\n\nYour signup request has been rejected. Please contact the admin if you believe this is a mistake.",
                user.username
            ),
            html_body: Some(format!(
                "<html><body>\
                 <p>Hello <strong>{}</strong>,</p>\
                 <p>Your signup request has been <strong>rejected</strong>.</p>\
                 <p>If you believe this is a mistake, please contact the admin.</p>\
                 <p>Thank you,<br/>Preterm Africa Study Team</p>\
                 </body></html>",
                escape_html(&user.username)
            )),
        },
    )
    .await;

    users::delete_user(&state.db, user.id).await?;
    info!("User {} rejected by {}", user.username, current.user.username);

    Ok(Json(json!({
        "message": format!("User {} has been rejected and removed.", user.username),
        "email_sent": email_sent,
    })))
}

/// Send to `user`, reporting whether delivery happened
async fn notify_user(state: &AppState, user: &User, email: Email) -> bool {
    if !user.has_email() {
        return false;
    }
    match state.mailer.send(&email).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Could not email {}: {}", user.username, e);
            false
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub role: Option<String>,
    pub site: Option<i64>,
    pub is_active: Option<bool>,
}

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Vec<User>>> {
    require_admin(&current, "Only admins can manage users.")?;

    let role = match query.role.as_deref() {
        None | Some("") => None,
        Some(code) => Some(
            Role::from_code(code)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown role: {}", code)))?,
        ),
    };

    let filter = users::UserFilter {
        role,
        site_id: query.site,
        is_active: query.is_active,
    };
    Ok(Json(users::list_users(&state.db, &filter).await?))
}

#[derive(Debug, Deserialize)]
pub struct BulkUsersRequest {
    pub user_ids: Vec<i64>,
}

/// POST /api/users/bulk-approve
pub async fn bulk_approve(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<BulkUsersRequest>,
) -> ApiResult<Json<Value>> {
    require_admin(&current, "Only admins can approve users.")?;

    let updated = users::set_active_many(&state.db, &req.user_ids, true).await?;
    info!("{} user(s) approved by {}", updated, current.user.username);
    Ok(Json(json!({
        "updated": updated,
        "message": format!("{} user(s) successfully approved.", updated),
    })))
}

/// POST /api/users/bulk-deactivate
pub async fn bulk_deactivate(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<BulkUsersRequest>,
) -> ApiResult<Json<Value>> {
    require_admin(&current, "Only admins can reject users.")?;

    let updated = users::set_active_many(&state.db, &req.user_ids, false).await?;
    info!("{} user(s) deactivated by {}", updated, current.user.username);
    Ok(Json(json!({
        "updated": updated,
        "message": format!("{} user(s) marked as inactive/rejected.", updated),
    })))
}
