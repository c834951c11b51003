//! Reminder emails for missing tracking items
//!
//! Participants with missing items are grouped by urgency. Those due within
//! two days go to every active team member of their site, one email per
//! site. Overdue participants go to every active PI in a single digest.
//! Each delivered email is recorded in the notification log, one row per
//! participant listed.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use ptrack_common::db::models::{NotificationType, Participant, User};
use ptrack_common::db::{notifications, participants, users};
use ptrack_common::schedule::Urgency;
use ptrack_common::{time, Result, Role, SiteScope, TrackingItem};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::mail::{escape_html, Email, Mailer};

const DUE_SOON_COLOR: &str = "#f0ad4e";
const OVERDUE_COLOR: &str = "#d9534f";

/// One participant line in a reminder table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRow {
    pub participant_id: i64,
    pub site_id: i64,
    pub site_name: String,
    pub study_id: String,
    pub missing: Vec<&'static str>,
    pub days_remaining: i64,
}

impl ReminderRow {
    fn days_cell(&self) -> String {
        if self.days_remaining >= 0 {
            self.days_remaining.to_string()
        } else {
            "Overdue".to_string()
        }
    }
}

#[derive(Debug, Default)]
pub struct ReminderPlan {
    /// Due-soon rows keyed by site id
    pub due_soon: BTreeMap<i64, Vec<ReminderRow>>,
    pub overdue: Vec<ReminderRow>,
}

impl ReminderPlan {
    pub fn is_empty(&self) -> bool {
        self.due_soon.is_empty() && self.overdue.is_empty()
    }
}

/// Group participants with missing items by urgency as of `today`
pub fn plan_reminders(participants: &[Participant], today: NaiveDate) -> ReminderPlan {
    let mut plan = ReminderPlan::default();

    for participant in participants {
        let missing = participant.missing_items();
        if missing.is_empty() {
            continue;
        }

        let days = participant.days_remaining(today);
        let Some(urgency) = Urgency::from_days(days) else {
            continue;
        };

        let row = ReminderRow {
            participant_id: participant.id,
            site_id: participant.site_id,
            site_name: participant.site_name.clone(),
            study_id: participant.study_id.clone(),
            missing: missing.iter().map(TrackingItem::reminder_label).collect(),
            days_remaining: days,
        };

        match urgency {
            Urgency::DueSoon => plan.due_soon.entry(row.site_id).or_default().push(row),
            Urgency::Overdue => plan.overdue.push(row),
        }
    }

    plan
}

fn html_table(rows: &[ReminderRow], title: &str, color: &str) -> String {
    let body: String = rows
        .iter()
        .map(|row| {
            format!(
                "<tr><td>{}</td><td>{}</td><td style=\"text-align:center;\">{}</td></tr>",
                escape_html(&row.study_id),
                escape_html(&row.missing.join(", ")),
                row.days_cell()
            )
        })
        .collect();

    format!(
        "<div style=\"border:1px solid #ddd; border-radius:10px; padding:15px; margin:20px 0; \
         font-family:Arial, sans-serif; font-size:14px; color:#333;\">\
         <h3 style=\"color:{color}; margin-top:0;\">{title}</h3>\
         <table border=\"1\" cellpadding=\"8\" cellspacing=\"0\" \
         style=\"border-collapse: collapse; width:100%; font-size:13px;\">\
         <tr style=\"background-color:#f9f9f9; text-align:left;\">\
         <th>Study ID</th><th>Missing Items</th><th style=\"text-align:center;\">Days Remaining</th>\
         </tr>{body}</table></div>"
    )
}

fn text_table(rows: &[ReminderRow]) -> String {
    rows.iter()
        .map(|row| {
            format!(
                "- {}: {} (days remaining: {})\n",
                row.study_id,
                row.missing.join(", "),
                row.days_cell()
            )
        })
        .collect()
}

fn html_message(
    recipient: &User,
    intro: &str,
    table: &str,
    link_text: &str,
    link_color: &str,
    base_url: &str,
) -> String {
    format!(
        "<div style=\"font-family:Arial, sans-serif; color:#333; font-size:14px;\">\
         <p>Dear {name},</p><p>{intro}</p>{table}\
         <p style=\"margin:20px 0;\"><a href=\"{url}\" style=\"background-color:{link_color}; \
         color:white; padding:10px 16px; border-radius:5px; text-decoration:none; \
         font-weight:bold;\">{link_text}</a></p>\
         <p>Best regards,<br><strong>Preterm Baby Tracker System</strong></p></div>",
        name = escape_html(&recipient.username),
        url = escape_html(base_url),
    )
}

/// Reminder to one site member about that site's due-soon participants
pub fn due_soon_email(recipient: &User, rows: &[ReminderRow], base_url: &str) -> Email {
    let min_days = rows.iter().map(|r| r.days_remaining).min().unwrap_or(0);
    let table = html_table(rows, "Pending Uploads – Due Soon", DUE_SOON_COLOR);

    Email {
        to: recipient.email.clone(),
        subject: format!("Pending uploads due soon (D-{})", min_days),
        text_body: format!(
            "Dear {},\n\nThe following uploads are still pending and need your attention:\n\n{}\nLogin to Update: {}\n\nBest regards,\nPreterm Baby Tracker System",
            recipient.username,
            text_table(rows),
            base_url
        ),
        html_body: Some(html_message(
            recipient,
            "The following uploads are still pending and need your attention:",
            &table,
            "Login to Update",
            "#0275d8",
            base_url,
        )),
    }
}

/// Digest of every overdue participant for one PI
pub fn overdue_email(recipient: &User, rows: &[ReminderRow], base_url: &str) -> Email {
    let table = html_table(rows, "Overdue Uploads", OVERDUE_COLOR);

    Email {
        to: recipient.email.clone(),
        subject: "Overdue uploads – Immediate Action Required".to_string(),
        text_body: format!(
            "Dear {},\n\nThe following uploads are overdue:\n\n{}\nFollow Up Now: {}\n\nBest regards,\nPreterm Baby Tracker System",
            recipient.username,
            text_table(rows),
            base_url
        ),
        html_body: Some(html_message(
            recipient,
            "The following uploads are <b style=\"color:#d9534f;\">overdue</b>:",
            &table,
            "Follow Up Now",
            OVERDUE_COLOR,
            base_url,
        )),
    }
}

/// Outcome of one reminder run
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderSummary {
    pub due_soon_participants: usize,
    pub overdue_participants: usize,
    pub emails_sent: usize,
    pub emails_failed: usize,
    pub skipped_without_email: usize,
    pub notifications_recorded: usize,
    pub notifications_failed: usize,
    pub dry_run: bool,
}

/// Run the reminder job as of `today`
///
/// With `dry_run` the emails are composed and logged but neither sent nor
/// recorded. A failed delivery or notification write is logged and counted;
/// the run continues.
pub async fn send_reminders(
    pool: &SqlitePool,
    mailer: &dyn Mailer,
    base_url: &str,
    today: NaiveDate,
    dry_run: bool,
) -> Result<ReminderSummary> {
    let all = participants::list_participants(pool, SiteScope::All).await?;
    let plan = plan_reminders(&all, today);

    let mut summary = ReminderSummary {
        due_soon_participants: plan.due_soon.values().map(Vec::len).sum(),
        overdue_participants: plan.overdue.len(),
        dry_run,
        ..ReminderSummary::default()
    };

    if plan.is_empty() {
        info!("No reminders due for {}", today);
        return Ok(summary);
    }

    let team_roles = [Role::ResearchAssistant, Role::ResearchOfficer, Role::Admin];
    for (site_id, rows) in &plan.due_soon {
        let recipients = users::list_active_with_roles(pool, &team_roles, Some(*site_id)).await?;
        for recipient in &recipients {
            deliver(
                pool,
                mailer,
                recipient,
                rows,
                due_soon_email(recipient, rows, base_url),
                dry_run,
                &mut summary,
            )
            .await;
        }
    }

    if !plan.overdue.is_empty() {
        let recipients = users::list_active_with_roles(pool, &[Role::Admin], None).await?;
        for recipient in &recipients {
            deliver(
                pool,
                mailer,
                recipient,
                &plan.overdue,
                overdue_email(recipient, &plan.overdue, base_url),
                dry_run,
                &mut summary,
            )
            .await;
        }
    }

    info!(
        "Reminders for {}: {} sent, {} failed, {} skipped without email{}",
        today,
        summary.emails_sent,
        summary.emails_failed,
        summary.skipped_without_email,
        if dry_run { " (dry run)" } else { "" }
    );
    Ok(summary)
}

async fn deliver(
    pool: &SqlitePool,
    mailer: &dyn Mailer,
    recipient: &User,
    rows: &[ReminderRow],
    email: Email,
    dry_run: bool,
    summary: &mut ReminderSummary,
) {
    if !recipient.has_email() {
        summary.skipped_without_email += 1;
        return;
    }

    if dry_run {
        info!(to = %email.to, subject = %email.subject, rows = rows.len(), "Dry run: reminder not sent");
        return;
    }

    if let Err(e) = mailer.send(&email).await {
        warn!("Reminder to {} failed: {}", recipient.username, e);
        summary.emails_failed += 1;
        return;
    }
    summary.emails_sent += 1;

    let sent_at = time::now();
    for row in rows {
        if let Some(kind) = NotificationType::for_days_remaining(row.days_remaining) {
            match notifications::record_notification(
                pool,
                row.participant_id,
                kind,
                Some(recipient.id),
                sent_at,
            )
            .await
            {
                Ok(_) => summary.notifications_recorded += 1,
                Err(e) => {
                    warn!(
                        "Could not log {} for {} to {}: {}",
                        kind.code(),
                        row.study_id,
                        recipient.username,
                        e
                    );
                    summary.notifications_failed += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use ptrack_common::Checklist;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
    }

    /// Participant whose due date is `days` from `today()`
    fn participant(id: i64, site_id: i64, days: i64) -> Participant {
        let enrollment_date = today() + Duration::days(days - 7);
        Participant {
            id,
            site_id,
            site_name: format!("Site{}", site_id),
            screening_session_id: None,
            study_id: format!("Site{}_{:03}", site_id, id),
            enrollment_date,
            due_date: enrollment_date + Duration::days(7),
            date_of_birth: None,
            checklist: Checklist::default(),
            monitor_downloaded_at: None,
            monitor_downloaded_by: None,
            ultrasound_downloaded_at: None,
            ultrasound_downloaded_by: None,
            created_at: Utc::now(),
        }
    }

    fn complete(mut p: Participant) -> Participant {
        for item in TrackingItem::ALL {
            p.checklist.set_done(item, true);
        }
        p
    }

    fn user(username: &str) -> User {
        User {
            id: 7,
            username: username.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: format!("{}@example.org", username),
            role: Some(Role::ResearchOfficer),
            site_id: Some(1),
            is_active: true,
            is_superuser: false,
            password_hash: String::new(),
            password_salt: String::new(),
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn test_plan_groups_by_urgency() {
        let participants = vec![
            participant(1, 1, 2),
            participant(2, 1, 0),
            participant(3, 2, 1),
            participant(4, 1, 3),
            participant(5, 2, -1),
            participant(6, 1, -4),
            complete(participant(7, 1, 1)),
        ];

        let plan = plan_reminders(&participants, today());
        let site1: Vec<i64> = plan.due_soon[&1].iter().map(|r| r.participant_id).collect();
        let site2: Vec<i64> = plan.due_soon[&2].iter().map(|r| r.participant_id).collect();
        let overdue: Vec<i64> = plan.overdue.iter().map(|r| r.participant_id).collect();

        assert_eq!(site1, [1, 2]);
        assert_eq!(site2, [3]);
        assert_eq!(overdue, [5, 6]);
    }

    #[test]
    fn test_comment_satisfies_item_for_reminders() {
        let mut p = complete(participant(1, 1, 1));
        p.checklist
            .set_done(TrackingItem::BloodCultureDone, false);
        let plan = plan_reminders(std::slice::from_ref(&p), today());
        assert_eq!(plan.due_soon[&1][0].missing, ["Blood Culture"]);

        p.checklist.set_comment(
            TrackingItem::BloodCultureDone,
            Some("Sample lost in transit".to_string()),
        );
        assert!(plan_reminders(&[p], today()).is_empty());
    }

    #[test]
    fn test_optional_items_never_trigger_reminders() {
        let mut p = complete(participant(1, 1, 0));
        p.checklist
            .set_done(TrackingItem::AdmissionNotes24hrUploaded, false);
        p.checklist
            .set_done(TrackingItem::VitalSignMonitoringDone, false);
        assert!(plan_reminders(&[p], today()).is_empty());
    }

    #[test]
    fn test_due_soon_email_content() {
        let plan = plan_reminders(&[participant(1, 1, 2), participant(2, 1, 1)], today());
        let rows = &plan.due_soon[&1];
        let email = due_soon_email(&user("ro1"), rows, "https://tracker.example.org");

        assert_eq!(email.to, "ro1@example.org");
        assert_eq!(email.subject, "Pending uploads due soon (D-1)");
        let html = email.html_body.unwrap();
        assert!(html.contains("Pending Uploads – Due Soon"));
        assert!(html.contains("Login to Update"));
        assert!(html.contains("https://tracker.example.org"));
        assert!(html.contains("Site1_001"));
        assert!(html.contains("Monitor Downloaded, Ultrasound Downloaded"));
        assert!(!html.contains("Vital Sign Monitoring"));
    }

    #[test]
    fn test_overdue_email_content() {
        let plan = plan_reminders(&[participant(1, 1, -2)], today());
        let email = overdue_email(&user("pi"), &plan.overdue, "https://tracker.example.org");

        assert_eq!(email.subject, "Overdue uploads – Immediate Action Required");
        let html = email.html_body.unwrap();
        assert!(html.contains("Overdue Uploads"));
        assert!(html.contains("Follow Up Now"));
        assert!(html.contains(">Overdue</td>"));
        assert!(email.text_body.contains("days remaining: Overdue"));
    }

    #[test]
    fn test_html_values_are_escaped() {
        let mut p = participant(1, 1, 1);
        p.study_id = "<script>".to_string();
        let plan = plan_reminders(&[p], today());
        let email = due_soon_email(&user("ro1"), &plan.due_soon[&1], "https://x");
        let html = email.html_body.unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}
