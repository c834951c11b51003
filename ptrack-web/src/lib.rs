//! ptrack-web library - HTTP service for the preterm study tracker
//!
//! JSON API over the tracker database: accounts and approval, participant
//! registration and checklist confirmation, role dashboards, the PDF
//! completion report and personal daily logs. The reminder job used by
//! `ptrack-admin` lives here too so both binaries share one mailer.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use ptrack_common::config::TrackerConfig;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod mail;
pub mod pagination;
pub mod reminders;
pub mod report;

pub use error::{ApiError, ApiResult};
pub use mail::{Email, Mailer};

/// Request bodies larger than this are rejected with 413
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<TrackerConfig>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: TrackerConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            mailer,
        }
    }

    /// `base_url` joined with `path`, for links in emails
    pub fn absolute_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.server.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Build application router
///
/// Everything under `/api` except signup, login, the site list and the
/// resource list requires a session.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let protected = Router::new()
        .route("/api/logout", post(api::logout))
        .route("/api/me", get(api::me))
        .route("/api/sites", post(api::create_site))
        .route("/api/users", get(api::list_users))
        .route("/api/users/bulk-approve", post(api::bulk_approve))
        .route("/api/users/bulk-deactivate", post(api::bulk_deactivate))
        .route("/api/users/:id/approve", post(api::approve_user))
        .route("/api/users/:id/reject", post(api::reject_user))
        .route("/api/dashboard/ra", get(api::ra_dashboard))
        .route("/api/dashboard/ro", get(api::ro_dashboard))
        .route("/api/dashboard/summary", get(api::summary_dashboard))
        .route("/api/dashboard/summary/pdf", get(api::download_completed_pdf))
        .route(
            "/api/screening",
            get(api::list_screening_sessions).post(api::record_screening_session),
        )
        .route("/api/participants", post(api::register_participant))
        .route("/api/participants/:id", get(api::participant_detail))
        .route("/api/participants/:id/update", post(api::update_participant))
        .route("/api/participants/:id/monitor", post(api::mark_monitor_downloaded))
        .route(
            "/api/participants/:id/ultrasound",
            post(api::mark_ultrasound_downloaded),
        )
        .route("/api/notifications", get(api::list_notifications))
        .route("/api/logs", get(api::list_logs).post(api::create_log))
        .route("/api/logs/:id", post(api::update_log).delete(api::delete_log))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::session_middleware,
        ));

    let public = Router::new()
        .route("/api/sites", get(api::list_sites))
        .route("/api/signup", post(api::signup))
        .route("/api/login", post(api::login))
        .route("/api/resources", get(api::resources))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
