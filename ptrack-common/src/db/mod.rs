//! Database initialization, models and queries

pub mod daily_logs;
pub mod init;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod participants;
pub mod screening;
pub mod sites;
pub mod users;

pub use init::*;
pub use migrations::*;
pub use models::*;
