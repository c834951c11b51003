//! HTTP API handlers for ptrack-web

pub mod accounts;
pub mod auth;
pub mod daily_logs;
pub mod dashboards;
pub mod health;
pub mod notifications;
pub mod participants;
pub mod report;
pub mod resources;
pub mod screening;
pub mod sites;

pub use accounts::{approve_user, bulk_approve, bulk_deactivate, list_users, reject_user, signup};
pub use auth::{login, logout, me, session_middleware, CurrentUser};
pub use daily_logs::{create_log, delete_log, list_logs, update_log};
pub use dashboards::{ra_dashboard, ro_dashboard, summary_dashboard};
pub use health::health_routes;
pub use notifications::list_notifications;
pub use participants::{
    mark_monitor_downloaded, mark_ultrasound_downloaded, participant_detail,
    register_participant, update_participant,
};
pub use report::download_completed_pdf;
pub use resources::resources;
pub use screening::{list_screening_sessions, record_screening_session};
pub use sites::{create_site, list_sites};
