//! Form validation
//!
//! Pure checks on submitted data. Checks that need the database (uniqueness,
//! site existence) are done by the caller after these pass.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::auth::MIN_PASSWORD_LEN;
use crate::db::models::LogTag;
use crate::roles::Role;
use crate::{Error, FieldErrors, Result};

pub const STUDY_NUMBER_MESSAGE: &str = "Enter exactly 3 digits";
pub const DUPLICATE_STUDY_ID_MESSAGE: &str =
    "This Study ID is already registered. Please enter a unique Study ID.";

/// Check a 3-digit study number, returning it trimmed
pub fn validate_study_number(value: &str) -> std::result::Result<&str, &'static str> {
    let value = value.trim();
    if value.len() == 3 && value.chars().all(|c| c.is_ascii_digit()) {
        Ok(value)
    } else {
        Err(STUDY_NUMBER_MESSAGE)
    }
}

/// `{site}_{nnn}`, e.g. `Nairobi_007`
pub fn full_study_id(site_name: &str, study_number: &str) -> String {
    format!("{}_{}", site_name, study_number)
}

/// Account request as submitted on the signup page
#[derive(Debug, Clone, Deserialize)]
pub struct SignupForm {
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    pub role: String,
    pub site: Option<i64>,
    pub password1: String,
    pub password2: String,
}

/// Signup data that passed field validation
#[derive(Debug, Clone)]
pub struct ValidSignup {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub site_id: i64,
    pub password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<ValidSignup> {
        let mut errors = FieldErrors::new();

        let username = self.username.trim().to_lowercase();
        if username.is_empty() {
            errors.add("username", "This field is required.");
        } else if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@.+-_".contains(c))
        {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }

        let email = self.email.trim();
        if email.is_empty() {
            errors.add("email", "This field is required.");
        } else if !looks_like_email(email) {
            errors.add("email", "Enter a valid email address.");
        }

        let role = Role::from_code(self.role.trim());
        if role.is_none() {
            errors.add("role", "Invalid role selected.");
        }

        if self.site.is_none() {
            errors.add("site", "Please select a site.");
        }

        if self.password1.chars().count() < MIN_PASSWORD_LEN {
            errors.add(
                "password1",
                format!(
                    "This password is too short. It must contain at least {} characters.",
                    MIN_PASSWORD_LEN
                ),
            );
        }
        if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }

        let (Some(role), Some(site_id)) = (role, self.site) else {
            return Err(Error::Validation(errors));
        };
        errors.into_result()?;

        Ok(ValidSignup {
            username,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: email.to_string(),
            role,
            site_id,
            password: self.password1.clone(),
        })
    }
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Screening counts for one session
pub fn validate_screening_counts(number_screened: i64, number_eligible: i64) -> Result<()> {
    let mut errors = FieldErrors::new();
    if number_screened < 0 {
        errors.add(
            "number_screened",
            "Ensure this value is greater than or equal to 0.",
        );
    }
    if number_eligible < 0 {
        errors.add(
            "number_eligible",
            "Ensure this value is greater than or equal to 0.",
        );
    }
    if number_eligible > number_screened {
        errors.add(
            "number_eligible",
            "Eligible count cannot exceed the number screened.",
        );
    }
    errors.into_result()
}

/// Daily log entry as submitted
#[derive(Debug, Clone, Deserialize)]
pub struct DailyLogForm {
    pub date: Option<NaiveDate>,
    pub title: Option<String>,
    pub tag: Option<String>,
    pub content: String,
}

pub const MAX_LOG_TITLE_LEN: usize = 100;

impl DailyLogForm {
    /// Validate, filling defaults: today's date and the `MISC` tag
    pub fn validate(&self, today: NaiveDate) -> Result<crate::db::daily_logs::LogEntry> {
        let mut errors = FieldErrors::new();

        let content = self.content.trim();
        if content.is_empty() {
            errors.add("content", "This field is required.");
        }

        let title = self
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        if let Some(title) = &title {
            if title.chars().count() > MAX_LOG_TITLE_LEN {
                errors.add(
                    "title",
                    format!(
                        "Ensure this value has at most {} characters.",
                        MAX_LOG_TITLE_LEN
                    ),
                );
            }
        }

        let tag = match self.tag.as_deref() {
            None | Some("") => LogTag::default(),
            Some(code) => match LogTag::from_code(code) {
                Some(tag) => tag,
                None => {
                    errors.add("tag", "Select a valid choice.");
                    LogTag::default()
                }
            },
        };

        errors.into_result()?;
        Ok(crate::db::daily_logs::LogEntry {
            date: self.date.unwrap_or(today),
            title,
            tag,
            content: content.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup() -> SignupForm {
        SignupForm {
            username: "JaneDoe".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: "jane@example.org".to_string(),
            role: "RA".to_string(),
            site: Some(1),
            password1: "longenough".to_string(),
            password2: "longenough".to_string(),
        }
    }

    fn field_errors(err: Error) -> FieldErrors {
        match err {
            Error::Validation(fields) => fields,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_study_number() {
        assert_eq!(validate_study_number("007"), Ok("007"));
        assert_eq!(validate_study_number(" 123 "), Ok("123"));
        assert_eq!(validate_study_number("12"), Err(STUDY_NUMBER_MESSAGE));
        assert_eq!(validate_study_number("1234"), Err(STUDY_NUMBER_MESSAGE));
        assert_eq!(validate_study_number("12a"), Err(STUDY_NUMBER_MESSAGE));
        assert_eq!(validate_study_number("١٢٣"), Err(STUDY_NUMBER_MESSAGE));
        assert_eq!(full_study_id("Kisumu", "042"), "Kisumu_042");
    }

    #[test]
    fn test_signup_valid_lowercases_username() {
        let valid = signup().validate().unwrap();
        assert_eq!(valid.username, "janedoe");
        assert_eq!(valid.role, Role::ResearchAssistant);
        assert_eq!(valid.site_id, 1);
    }

    #[test]
    fn test_signup_collects_every_error() {
        let mut form = signup();
        form.role = "XX".to_string();
        form.site = None;
        form.email = "not-an-email".to_string();
        form.password2 = "different".to_string();

        let errors = field_errors(form.validate().unwrap_err());
        assert_eq!(errors.get("role").unwrap(), ["Invalid role selected."]);
        assert_eq!(errors.get("site").unwrap(), ["Please select a site."]);
        assert!(errors.get("email").is_some());
        assert!(errors.get("password2").is_some());
        assert!(errors.get("username").is_none());
    }

    #[test]
    fn test_signup_short_password() {
        let mut form = signup();
        form.password1 = "short".to_string();
        form.password2 = "short".to_string();
        let errors = field_errors(form.validate().unwrap_err());
        assert!(errors.get("password1").is_some());
    }

    #[test]
    fn test_screening_counts() {
        assert!(validate_screening_counts(10, 4).is_ok());
        assert!(validate_screening_counts(0, 0).is_ok());
        let errors = field_errors(validate_screening_counts(3, 5).unwrap_err());
        assert!(errors.get("number_eligible").is_some());
        let errors = field_errors(validate_screening_counts(-1, 0).unwrap_err());
        assert!(errors.get("number_screened").is_some());
    }

    #[test]
    fn test_daily_log_defaults() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let form = DailyLogForm {
            date: None,
            title: Some("  ".to_string()),
            tag: None,
            content: " Incubator 3 alarm reset ".to_string(),
        };
        let entry = form.validate(today).unwrap();
        assert_eq!(entry.date, today);
        assert_eq!(entry.title, None);
        assert_eq!(entry.tag, LogTag::Miscellaneous);
        assert_eq!(entry.content, "Incubator 3 alarm reset");
    }

    #[test]
    fn test_daily_log_rejects_bad_input() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let form = DailyLogForm {
            date: None,
            title: Some("x".repeat(101)),
            tag: Some("BAD".to_string()),
            content: "".to_string(),
        };
        let errors = field_errors(form.validate(today).unwrap_err());
        assert!(errors.get("content").is_some());
        assert!(errors.get("title").is_some());
        assert!(errors.get("tag").is_some());
    }
}
