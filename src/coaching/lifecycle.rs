use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Status of a single coaching appointment.
///
/// `Pending` and `Approved` are the only states an appointment can leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Approved,
        AppointmentStatus::Rejected,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Approved => "approved",
            AppointmentStatus::Rejected => "rejected",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppointmentStatus::Pending | AppointmentStatus::Approved)
    }

    /// Whether an appointment in this state still occupies its time range
    /// when computing bookable slots.
    pub fn occupies_slot(&self) -> bool {
        !matches!(
            self,
            AppointmentStatus::Cancelled | AppointmentStatus::Rejected
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of an appointment is acting on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    Coach,
    Student,
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Participant::Coach => write!(f, "coach"),
            Participant::Student => write!(f, "student"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentAction {
    Approve,
    Reject,
    Complete,
    Cancel,
    MarkNoShow,
}

impl AppointmentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentAction::Approve => "approve",
            AppointmentAction::Reject => "reject",
            AppointmentAction::Complete => "complete",
            AppointmentAction::Cancel => "cancel",
            AppointmentAction::MarkNoShow => "mark as no-show",
        }
    }

    pub fn permitted_for(&self, participant: Participant) -> bool {
        match self {
            AppointmentAction::Cancel => true,
            _ => participant == Participant::Coach,
        }
    }

    /// Whether completing this action consumes a session from the linked subscription.
    pub fn consumes_session(&self) -> bool {
        matches!(self, AppointmentAction::Complete)
    }
}

impl fmt::Display for AppointmentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {attempted} an appointment that is {from}")]
pub struct InvalidTransition {
    pub from: AppointmentStatus,
    pub attempted: &'static str,
}

/// Resolve the state an appointment moves to when `action` is applied in `from`.
pub fn transition(
    from: AppointmentStatus,
    action: AppointmentAction,
) -> Result<AppointmentStatus, InvalidTransition> {
    use AppointmentAction as A;
    use AppointmentStatus as S;

    match (from, action) {
        (S::Pending, A::Approve) => Ok(S::Approved),
        (S::Pending, A::Reject) => Ok(S::Rejected),
        (S::Approved, A::Complete) => Ok(S::Completed),
        (S::Approved, A::Cancel) => Ok(S::Cancelled),
        (S::Approved, A::MarkNoShow) => Ok(S::NoShow),
        _ => Err(InvalidTransition {
            from,
            attempted: action.as_str(),
        }),
    }
}

/// Deleting and editing are only allowed while the appointment is still open.
pub fn ensure_open(from: AppointmentStatus, attempted: &'static str) -> Result<(), InvalidTransition> {
    if from.is_terminal() {
        Err(InvalidTransition { from, attempted })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let approved = transition(AppointmentStatus::Pending, AppointmentAction::Approve).unwrap();
        assert_eq!(approved, AppointmentStatus::Approved);

        let completed = transition(approved, AppointmentAction::Complete).unwrap();
        assert_eq!(completed, AppointmentStatus::Completed);
    }

    #[test]
    fn test_pending_cannot_be_completed_or_cancelled() {
        for action in [
            AppointmentAction::Complete,
            AppointmentAction::Cancel,
            AppointmentAction::MarkNoShow,
        ] {
            assert!(transition(AppointmentStatus::Pending, action).is_err());
        }
    }

    #[test]
    fn test_approved_cannot_be_approved_again() {
        let err = transition(AppointmentStatus::Approved, AppointmentAction::Approve).unwrap_err();
        assert_eq!(err.from, AppointmentStatus::Approved);
        assert_eq!(err.to_string(), "cannot approve an appointment that is approved");
    }

    #[test]
    fn test_no_transition_out_of_terminal_states() {
        let actions = [
            AppointmentAction::Approve,
            AppointmentAction::Reject,
            AppointmentAction::Complete,
            AppointmentAction::Cancel,
            AppointmentAction::MarkNoShow,
        ];

        for status in AppointmentStatus::ALL.iter().filter(|s| s.is_terminal()) {
            for action in actions {
                assert!(
                    transition(*status, action).is_err(),
                    "{} should not allow {}",
                    status,
                    action
                );
            }
            assert!(ensure_open(*status, "delete").is_err());
        }
    }

    #[test]
    fn test_only_cancel_is_open_to_students() {
        assert!(AppointmentAction::Cancel.permitted_for(Participant::Student));
        assert!(!AppointmentAction::Approve.permitted_for(Participant::Student));
        assert!(!AppointmentAction::Complete.permitted_for(Participant::Student));
        assert!(AppointmentAction::MarkNoShow.permitted_for(Participant::Coach));
    }

    #[test]
    fn test_status_strings_round_trip() {
        assert_eq!(AppointmentStatus::parse("no_show"), Some(AppointmentStatus::NoShow));
        assert_eq!(AppointmentStatus::parse("scheduled"), None);
        assert!(!AppointmentStatus::Rejected.occupies_slot());
        assert!(AppointmentStatus::Completed.occupies_slot());
    }
}
