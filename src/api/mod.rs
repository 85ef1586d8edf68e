use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rocket::Route;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;

use crate::validation::{ApiError, ValidationResponse};

pub mod accounts;
pub mod appointments;
pub mod coaches;
pub mod email;
pub mod packages;
pub mod subscriptions;

pub use accounts::*;
pub use appointments::*;
pub use coaches::*;
pub use email::*;
pub use packages::*;
pub use subscriptions::*;

/// Every route served under `/api`.
pub fn routes() -> Vec<Route> {
    routes![
        health,
        api_signup,
        api_login,
        api_logout,
        api_me,
        api_me_unauthorized,
        api_update_profile,
        api_change_password,
        api_get_coaches,
        api_get_coach,
        api_get_coach_stats,
        api_get_coach_availability,
        api_get_coach_slots,
        api_update_coach_profile,
        api_replace_availability,
        api_add_availability,
        api_delete_availability,
        api_submit_coach_application,
        api_get_coach_applications,
        api_approve_coach_application,
        api_reject_coach_application,
        api_get_packages,
        api_get_package,
        api_create_package,
        api_purchase_subscription,
        api_get_subscriptions,
        api_get_subscription,
        api_cancel_subscription,
        api_request_appointment,
        api_create_appointment,
        api_get_appointments,
        api_get_appointment,
        api_update_appointment,
        api_delete_appointment,
        api_approve_appointment,
        api_reject_appointment,
        api_complete_appointment,
        api_cancel_appointment,
        api_no_show_appointment,
        api_send_email,
        api_email_preflight,
        crate::edge::preflight,
    ]
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

pub(crate) fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub(crate) fn bad_request(field: &str, message: &str) -> ApiError {
    Custom(
        Status::BadRequest,
        Json(ValidationResponse::with_error(field, message)),
    )
}

pub(crate) fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| bad_request(field, "Expected a date formatted as YYYY-MM-DD"))
}

pub(crate) fn parse_time(field: &str, raw: &str) -> Result<NaiveTime, ApiError> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| bad_request(field, "Expected a time formatted as HH:MM"))
}

/// Accepts `YYYY-MM-DDTHH:MM[:SS]`, with either `T` or a space as separator.
pub(crate) fn parse_datetime(field: &str, raw: &str) -> Result<NaiveDateTime, ApiError> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];

    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| bad_request(field, "Expected a datetime formatted as YYYY-MM-DDTHH:MM"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();

        assert_eq!(parse_datetime("d", "2025-03-10T09:30").unwrap(), expected);
        assert_eq!(parse_datetime("d", "2025-03-10T09:30:00").unwrap(), expected);
        assert_eq!(parse_datetime("d", "2025-03-10 09:30").unwrap(), expected);

        let Custom(status, Json(body)) = parse_datetime("appointment_date", "yarın").unwrap_err();
        assert_eq!(status, Status::BadRequest);
        assert!(body.errors.contains_key("appointment_date"));
    }

    #[test]
    fn test_parse_time_with_and_without_seconds() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(parse_time("t", "09:00").unwrap(), nine);
        assert_eq!(parse_time("t", "09:00:00").unwrap(), nine);
        assert!(parse_time("t", "25:00").is_err());
    }
}
