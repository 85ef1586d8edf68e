use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
    Completed,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SubscriptionStatus::Active),
            "expired" => Some(SubscriptionStatus::Expired),
            "cancelled" => Some(SubscriptionStatus::Cancelled),
            "completed" => Some(SubscriptionStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percentage of purchased sessions already used, rounded and clamped to `0..=100`.
pub fn progress_percent(total_sessions: i64, remaining_sessions: i64) -> u8 {
    if total_sessions <= 0 {
        return 0;
    }

    let used = (total_sessions - remaining_sessions) as f64;
    let percent = (used / total_sessions as f64 * 100.0).round();

    percent.clamp(0.0, 100.0) as u8
}

pub fn is_active(
    status: SubscriptionStatus,
    end_date: NaiveDateTime,
    remaining_sessions: i64,
    now: NaiveDateTime,
) -> bool {
    status == SubscriptionStatus::Active && now <= end_date && remaining_sessions > 0
}

/// Remaining sessions after one completed appointment. Never goes below zero.
pub fn consume_session(remaining_sessions: i64) -> i64 {
    (remaining_sessions - 1).max(0)
}

/// Status a subscription should carry once `remaining_sessions` is known.
pub fn status_after_consumption(
    current: SubscriptionStatus,
    remaining_sessions: i64,
) -> SubscriptionStatus {
    if current == SubscriptionStatus::Active && remaining_sessions == 0 {
        SubscriptionStatus::Completed
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_progress_bounds() {
        assert_eq!(progress_percent(8, 8), 0);
        assert_eq!(progress_percent(8, 0), 100);
        assert_eq!(progress_percent(8, 6), 25);
        assert_eq!(progress_percent(3, 2), 33);
    }

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(progress_percent(0, 0), 0);
        assert_eq!(progress_percent(4, 9), 0);
        assert_eq!(progress_percent(4, -2), 100);
    }

    #[test]
    fn test_consume_session_floors_at_zero() {
        assert_eq!(consume_session(3), 2);
        assert_eq!(consume_session(1), 0);
        assert_eq!(consume_session(0), 0);
    }

    #[test]
    fn test_is_active() {
        let end = at(20);
        assert!(is_active(SubscriptionStatus::Active, end, 2, at(10)));
        assert!(is_active(SubscriptionStatus::Active, end, 2, end));
        assert!(!is_active(SubscriptionStatus::Active, end, 2, at(21)));
        assert!(!is_active(SubscriptionStatus::Active, end, 0, at(10)));
        assert!(!is_active(SubscriptionStatus::Cancelled, end, 2, at(10)));
    }

    #[test]
    fn test_status_after_last_session() {
        assert_eq!(
            status_after_consumption(SubscriptionStatus::Active, 0),
            SubscriptionStatus::Completed
        );
        assert_eq!(
            status_after_consumption(SubscriptionStatus::Active, 1),
            SubscriptionStatus::Active
        );
        assert_eq!(
            status_after_consumption(SubscriptionStatus::Expired, 0),
            SubscriptionStatus::Expired
        );
    }
}
