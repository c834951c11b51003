//! Due-date arithmetic and urgency classification

use chrono::{Duration, NaiveDate};
use serde::Serialize;

/// Days between enrollment and the data collection deadline
pub const COLLECTION_WINDOW_DAYS: i64 = 7;

/// Deadline for a participant enrolled on `enrollment_date`
pub fn due_date_for(enrollment_date: NaiveDate) -> NaiveDate {
    enrollment_date + Duration::days(COLLECTION_WINDOW_DAYS)
}

/// Signed number of days until `due_date`; negative once it has passed
pub fn days_remaining(due_date: NaiveDate, today: NaiveDate) -> i64 {
    (due_date - today).num_days()
}

/// Traffic-light status shown on dashboards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    Green,
    Yellow,
    Red,
    Overdue,
}

impl StatusColor {
    pub fn from_days(days: i64) -> Self {
        match days {
            d if d >= 4 => StatusColor::Green,
            2..=3 => StatusColor::Yellow,
            0..=1 => StatusColor::Red,
            _ => StatusColor::Overdue,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusColor::Green => "green",
            StatusColor::Yellow => "yellow",
            StatusColor::Red => "red",
            StatusColor::Overdue => "overdue",
        }
    }
}

/// Reminder grouping for an incomplete participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    /// Due within the next two days (inclusive of today)
    DueSoon,
    /// Deadline has passed
    Overdue,
}

impl Urgency {
    pub fn from_days(days: i64) -> Option<Self> {
        match days {
            0..=2 => Some(Urgency::DueSoon),
            d if d < 0 => Some(Urgency::Overdue),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_due_date_is_one_week_after_enrollment() {
        assert_eq!(due_date_for(date(2025, 1, 1)), date(2025, 1, 8));
        // Crosses a month boundary
        assert_eq!(due_date_for(date(2025, 2, 25)), date(2025, 3, 4));
        // Leap year
        assert_eq!(due_date_for(date(2024, 2, 25)), date(2024, 3, 3));
    }

    #[test]
    fn test_days_remaining_is_signed() {
        let due = date(2025, 1, 8);
        assert_eq!(days_remaining(due, date(2025, 1, 1)), 7);
        assert_eq!(days_remaining(due, date(2025, 1, 8)), 0);
        assert_eq!(days_remaining(due, date(2025, 1, 10)), -2);
    }

    #[test]
    fn test_status_color_boundaries() {
        assert_eq!(StatusColor::from_days(7), StatusColor::Green);
        assert_eq!(StatusColor::from_days(4), StatusColor::Green);
        assert_eq!(StatusColor::from_days(3), StatusColor::Yellow);
        assert_eq!(StatusColor::from_days(2), StatusColor::Yellow);
        assert_eq!(StatusColor::from_days(1), StatusColor::Red);
        assert_eq!(StatusColor::from_days(0), StatusColor::Red);
        assert_eq!(StatusColor::from_days(-1), StatusColor::Overdue);
    }

    #[test]
    fn test_urgency_groups() {
        assert_eq!(Urgency::from_days(3), None);
        assert_eq!(Urgency::from_days(2), Some(Urgency::DueSoon));
        assert_eq!(Urgency::from_days(0), Some(Urgency::DueSoon));
        assert_eq!(Urgency::from_days(-1), Some(Urgency::Overdue));
        assert_eq!(Urgency::from_days(-30), Some(Urgency::Overdue));
    }
}
