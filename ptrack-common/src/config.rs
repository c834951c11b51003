//! Configuration loading and resolution
//!
//! Resolution order (highest priority first):
//! 1. Command-line argument (applied by the binaries via [`TrackerConfig::apply_overrides`])
//! 2. Environment variables (`PTRACK_*`)
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! A missing or unreadable config file is never fatal: a warning is logged
//! and the defaults are used.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "PTRACK_CONFIG";

const APP_DIR_NAME: &str = "ptrack";
const CONFIG_FILE_NAME: &str = "config.toml";
const DATABASE_FILE_NAME: &str = "ptrack.db";

/// Complete service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub mail: MailConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Absolute URL of the deployment, used for links inside emails
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5780,
            base_url: "http://127.0.0.1:5780".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database; `None` means the platform default
    pub path: Option<PathBuf>,
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_database_path)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions unused for longer than this are expired (auto-logout)
    pub idle_timeout_minutes: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: 30,
        }
    }
}

/// How outbound mail is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    /// Write messages to the log instead of sending them
    Log,
    /// Deliver through an SMTP relay
    Smtp,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub transport: MailTransport,
    pub from: String,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            transport: MailTransport::Log,
            from: "Preterm Tracker <noreply@localhost>".to_string(),
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Values supplied on the command line; `None` leaves the lower tiers in charge
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<PathBuf>,
    pub base_url: Option<String>,
}

impl TrackerConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load from an explicit file; a parse error is reported, a missing file is not
    pub fn load_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config = Self::from_toml_str(&content)?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!(
                    "Config file {} not readable ({}); using defaults",
                    path.display(),
                    e
                );
                Ok(Self::default())
            }
        }
    }

    /// Resolve the full configuration: file (explicit or discovered), then env
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = explicit_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
            .or_else(discover_config_file);

        let mut config = match path {
            Some(path) => Self::load_file(&path)?,
            None => {
                warn!("No config file found; using compiled defaults");
                Self::default()
            }
        };

        config.apply_env();
        Ok(config)
    }

    /// Apply `PTRACK_*` environment variables over file values
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("PTRACK_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PTRACK_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid PTRACK_PORT value: {}", port),
            }
        }
        if let Ok(url) = std::env::var("PTRACK_BASE_URL") {
            self.server.base_url = url;
        }
        if let Ok(path) = std::env::var("PTRACK_DATABASE") {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Ok(transport) = std::env::var("PTRACK_MAIL_TRANSPORT") {
            match transport.to_lowercase().as_str() {
                "smtp" => self.mail.transport = MailTransport::Smtp,
                "log" => self.mail.transport = MailTransport::Log,
                other => warn!("Ignoring unknown PTRACK_MAIL_TRANSPORT: {}", other),
            }
        }
        if let Ok(host) = std::env::var("PTRACK_SMTP_HOST") {
            self.mail.smtp_host = Some(host);
        }
        if let Ok(user) = std::env::var("PTRACK_SMTP_USERNAME") {
            self.mail.smtp_username = Some(user);
        }
        if let Ok(password) = std::env::var("PTRACK_SMTP_PASSWORD") {
            self.mail.smtp_password = Some(password);
        }
    }

    /// Apply command-line values, the highest priority tier
    pub fn apply_overrides(&mut self, cli: &CliOverrides) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(path) = &cli.database {
            self.database.path = Some(path.clone());
        }
        if let Some(url) = &cli.base_url {
            self.server.base_url = url.clone();
        }
    }

    /// Check values that would otherwise fail later at an awkward moment
    pub fn validate(&self) -> Result<()> {
        if self.session.idle_timeout_minutes <= 0 {
            return Err(Error::Config(
                "session.idle_timeout_minutes must be positive".to_string(),
            ));
        }
        if self.mail.transport == MailTransport::Smtp && self.mail.smtp_host.is_none() {
            return Err(Error::Config(
                "mail.transport = \"smtp\" requires mail.smtp_host".to_string(),
            ));
        }
        Ok(())
    }
}

/// `<config_dir>/ptrack/config.toml` if it exists, else `/etc/ptrack/config.toml` on Linux
fn discover_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(APP_DIR_NAME).join(CONFIG_FILE_NAME);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./ptrack_data"))
        .join(DATABASE_FILE_NAME)
}
