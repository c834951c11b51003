//! # Preterm Tracker Common Library
//!
//! Shared code for the tracker web service and operator tools:
//! - Database models, initialization and queries
//! - Participant tracking checklist and completion rules
//! - Due-date scheduling and urgency classification
//! - Roles and permission checks
//! - Form validation
//! - Configuration loading
//! - Password hashing and session tokens

pub mod auth;
pub mod checklist;
pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod roles;
pub mod schedule;
pub mod time;

pub use checklist::{Checklist, TrackingItem};
pub use error::{Error, FieldErrors, Result};
pub use roles::{Dashboard, Principal, Role, SiteScope};
