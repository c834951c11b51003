//! Operator commands for the preterm tracker
//!
//! **Usage:**
//! ```bash
//! ptrack-admin send-reminders [--dry-run] [--today YYYY-MM-DD]
//! ptrack-admin create-superuser --username admin --email admin@example.org --password ...
//! ptrack-admin create-site --name Nairobi
//! ```
//!
//! `send-reminders` is meant to be run daily from cron.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use ptrack_common::auth::MIN_PASSWORD_LEN;
use ptrack_common::config::{CliOverrides, TrackerConfig};
use ptrack_common::db::users::{self, NewUser};
use ptrack_common::db::{init_database, sites};
use ptrack_common::time;
use ptrack_web::mail::mailer_from_config;
use ptrack_web::reminders::send_reminders;
use tracing::info;

#[derive(Parser, Debug)]
#[clap(name = "ptrack-admin")]
#[clap(about = "Operator commands for the preterm study tracker")]
struct Args {
    /// Path to the TOML config file
    #[clap(short, long, env = "PTRACK_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file
    #[clap(long)]
    database: Option<PathBuf>,

    /// Absolute URL used for links in emails
    #[clap(long)]
    base_url: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Email grouped reminders for participants with missing items
    SendReminders {
        /// Compose and log emails without sending or recording them
        #[clap(long)]
        dry_run: bool,

        /// Reference date instead of today (YYYY-MM-DD)
        #[clap(long, value_name = "DATE")]
        today: Option<NaiveDate>,
    },

    /// Create an active superuser account
    CreateSuperuser {
        #[clap(long)]
        username: String,
        #[clap(long)]
        email: String,
        #[clap(long, env = "PTRACK_SUPERUSER_PASSWORD")]
        password: String,
    },

    /// Add a study site
    CreateSite {
        #[clap(long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = TrackerConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    config.apply_overrides(&CliOverrides {
        database: args.database,
        base_url: args.base_url,
        ..CliOverrides::default()
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "ptrack_web={level},ptrack_common={level}",
                    level = config.logging.level
                )
                .into()
            }),
        )
        .init();

    config.validate().context("Invalid configuration")?;
    let pool = init_database(&config.database.resolved_path())
        .await
        .context("Failed to initialize database")?;

    match args.command {
        Command::SendReminders { dry_run, today } => {
            let mailer = mailer_from_config(&config.mail).context("Failed to configure mail")?;
            let today = today.unwrap_or_else(time::local_today);
            let summary = send_reminders(
                &pool,
                mailer.as_ref(),
                &config.server.base_url,
                today,
                dry_run,
            )
            .await
            .context("Reminder run failed")?;

            println!(
                "Reminders for {}{}: {} due soon, {} overdue; {} emails sent, {} failed, {} recipients without email, {} notifications logged, {} not logged",
                today,
                if summary.dry_run { " (dry run)" } else { "" },
                summary.due_soon_participants,
                summary.overdue_participants,
                summary.emails_sent,
                summary.emails_failed,
                summary.skipped_without_email,
                summary.notifications_recorded,
                summary.notifications_failed
            );
        }

        Command::CreateSuperuser {
            username,
            email,
            password,
        } => {
            if password.chars().count() < MIN_PASSWORD_LEN {
                bail!("Password must be at least {} characters", MIN_PASSWORD_LEN);
            }
            if users::find_user_by_username(&pool, &username).await?.is_some() {
                bail!("User {} already exists", username.trim().to_lowercase());
            }

            let user = users::create_user(
                &pool,
                &NewUser {
                    username,
                    first_name: String::new(),
                    last_name: String::new(),
                    email,
                    role: None,
                    site_id: None,
                    is_active: true,
                    is_superuser: true,
                    password,
                },
            )
            .await
            .context("Failed to create superuser")?;
            info!("Superuser {} created", user.username);
            println!("Superuser {} created (id {})", user.username, user.id);
        }

        Command::CreateSite { name } => {
            let site = sites::create_site(&pool, &name)
                .await
                .context("Failed to create site")?;
            println!("Site {} created (id {})", site.name, site.id);
        }
    }

    Ok(())
}
