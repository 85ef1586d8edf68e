use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::coaching::{
    AppointmentStatus, Participant, SubscriptionStatus, is_active, progress_percent,
};
use crate::error::AppError;

fn decode_string_list(raw: Option<String>) -> Vec<String> {
    raw.and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default()
}

pub fn encode_string_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct CoachingPackage {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub session_count: i64,
    pub duration_days: i64,
    pub price: f64,
    pub is_active: bool,
    pub is_popular: bool,
    pub features: Vec<String>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbCoachingPackage {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub session_count: Option<i64>,
    pub duration_days: Option<i64>,
    pub price: Option<f64>,
    pub is_active: Option<bool>,
    pub is_popular: Option<bool>,
    pub features: Option<String>,
}

impl From<DbCoachingPackage> for CoachingPackage {
    fn from(db: DbCoachingPackage) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            name: db.name.unwrap_or_default(),
            description: db.description,
            session_count: db.session_count.unwrap_or_default(),
            duration_days: db.duration_days.unwrap_or_default(),
            price: db.price.unwrap_or_default(),
            is_active: db.is_active.unwrap_or_default(),
            is_popular: db.is_popular.unwrap_or_default(),
            features: decode_string_list(db.features),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoachingSubscription {
    pub id: i64,
    pub student_id: i64,
    pub coach_id: i64,
    pub package_id: i64,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub total_sessions: i64,
    pub remaining_sessions: i64,
    pub status: SubscriptionStatus,
    pub purchase_price: f64,
}

impl CoachingSubscription {
    pub fn progress(&self) -> u8 {
        progress_percent(self.total_sessions, self.remaining_sessions)
    }

    pub fn is_active(&self, now: NaiveDateTime) -> bool {
        is_active(self.status, self.end_date, self.remaining_sessions, now)
    }
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbCoachingSubscription {
    pub id: Option<i64>,
    pub student_id: Option<i64>,
    pub coach_id: Option<i64>,
    pub package_id: Option<i64>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub total_sessions: Option<i64>,
    pub remaining_sessions: Option<i64>,
    pub status: Option<String>,
    pub purchase_price: Option<f64>,
}

impl TryFrom<DbCoachingSubscription> for CoachingSubscription {
    type Error = AppError;

    fn try_from(db: DbCoachingSubscription) -> Result<Self, Self::Error> {
        let raw_status = db.status.unwrap_or_default();
        let status = SubscriptionStatus::parse(&raw_status).ok_or_else(|| {
            AppError::Internal(format!("Unknown subscription status '{}'", raw_status))
        })?;

        Ok(Self {
            id: db.id.unwrap_or_default(),
            student_id: db.student_id.unwrap_or_default(),
            coach_id: db.coach_id.unwrap_or_default(),
            package_id: db.package_id.unwrap_or_default(),
            start_date: db.start_date.unwrap_or_default(),
            end_date: db.end_date.unwrap_or_default(),
            total_sessions: db.total_sessions.unwrap_or_default(),
            remaining_sessions: db.remaining_sessions.unwrap_or_default(),
            status,
            purchase_price: db.purchase_price.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoachingAppointment {
    pub id: i64,
    pub subscription_id: i64,
    pub coach_id: i64,
    pub student_id: i64,
    pub appointment_date: NaiveDateTime,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    pub google_meet_link: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub cancellation_reason: Option<String>,
    pub coach_notes: Option<String>,
    pub approved_at: Option<NaiveDateTime>,
    pub rejected_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub cancelled_at: Option<NaiveDateTime>,
}

impl CoachingAppointment {
    /// The side `user_id` is on, if any.
    pub fn participant(&self, user_id: i64) -> Option<Participant> {
        if user_id == self.coach_id {
            Some(Participant::Coach)
        } else if user_id == self.student_id {
            Some(Participant::Student)
        } else {
            None
        }
    }
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbCoachingAppointment {
    pub id: Option<i64>,
    pub subscription_id: Option<i64>,
    pub coach_id: Option<i64>,
    pub student_id: Option<i64>,
    pub appointment_date: Option<NaiveDateTime>,
    pub duration_minutes: Option<i64>,
    pub status: Option<String>,
    pub google_meet_link: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub cancellation_reason: Option<String>,
    pub coach_notes: Option<String>,
    pub approved_at: Option<NaiveDateTime>,
    pub rejected_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub cancelled_at: Option<NaiveDateTime>,
}

impl TryFrom<DbCoachingAppointment> for CoachingAppointment {
    type Error = AppError;

    fn try_from(db: DbCoachingAppointment) -> Result<Self, Self::Error> {
        let raw_status = db.status.unwrap_or_default();
        let status = AppointmentStatus::parse(&raw_status).ok_or_else(|| {
            AppError::Internal(format!("Unknown appointment status '{}'", raw_status))
        })?;

        Ok(Self {
            id: db.id.unwrap_or_default(),
            subscription_id: db.subscription_id.unwrap_or_default(),
            coach_id: db.coach_id.unwrap_or_default(),
            student_id: db.student_id.unwrap_or_default(),
            appointment_date: db.appointment_date.unwrap_or_default(),
            duration_minutes: db.duration_minutes.unwrap_or_default(),
            status,
            google_meet_link: db.google_meet_link,
            title: db.title,
            description: db.description,
            cancellation_reason: db.cancellation_reason,
            coach_notes: db.coach_notes,
            approved_at: db.approved_at,
            rejected_at: db.rejected_at,
            completed_at: db.completed_at,
            cancelled_at: db.cancelled_at,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoachAvailability {
    pub id: i64,
    pub coach_id: i64,
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbCoachAvailability {
    pub id: Option<i64>,
    pub coach_id: Option<i64>,
    pub day_of_week: Option<i64>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub is_available: Option<bool>,
}

impl From<DbCoachAvailability> for CoachAvailability {
    fn from(db: DbCoachAvailability) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            coach_id: db.coach_id.unwrap_or_default(),
            day_of_week: db.day_of_week.unwrap_or_default().clamp(0, 6) as u8,
            start_time: db.start_time.unwrap_or(NaiveTime::MIN),
            end_time: db.end_time.unwrap_or(NaiveTime::MIN),
            is_available: db.is_available.unwrap_or_default(),
        }
    }
}

/// A weekly window submitted by a coach, before it gets an id.
#[derive(Debug, Clone, Copy)]
pub struct NewAvailability {
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
}

impl NewAvailability {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.day_of_week > 6 {
            return Err(AppError::Validation(format!(
                "day_of_week must be between 0 and 6, got {}",
                self.day_of_week
            )));
        }
        if self.start_time >= self.end_time {
            return Err(AppError::Validation(
                "start_time must be before end_time".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoachProfile {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub specializations: Vec<String>,
    pub hourly_rate: Option<f64>,
    pub timezone: Option<String>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbCoachProfile {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub coach_bio: Option<String>,
    pub coach_specializations: Option<String>,
    pub coach_hourly_rate: Option<f64>,
    pub coach_timezone: Option<String>,
}

impl From<DbCoachProfile> for CoachProfile {
    fn from(db: DbCoachProfile) -> Self {
        let username = db.username.unwrap_or_default();
        Self {
            id: db.id.unwrap_or_default(),
            display_name: db.display_name.unwrap_or_else(|| username.clone()),
            username,
            bio: db.coach_bio,
            specializations: decode_string_list(db.coach_specializations),
            hourly_rate: db.coach_hourly_rate,
            timezone: db.coach_timezone,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CoachStats {
    pub coach_id: i64,
    pub total_students: i64,
    pub completed_sessions: i64,
    pub upcoming_sessions: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ApplicationStatus::Pending),
            "approved" => Some(ApplicationStatus::Approved),
            "rejected" => Some(ApplicationStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoachApplication {
    pub id: i64,
    pub user_id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub experience_years: i64,
    pub bio: String,
    pub specializations: Vec<String>,
    pub hourly_rate: Option<f64>,
    pub status: ApplicationStatus,
    pub reviewer_notes: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbCoachApplication {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub experience_years: Option<i64>,
    pub bio: Option<String>,
    pub specializations: Option<String>,
    pub hourly_rate: Option<f64>,
    pub status: Option<String>,
    pub reviewer_notes: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl TryFrom<DbCoachApplication> for CoachApplication {
    type Error = AppError;

    fn try_from(db: DbCoachApplication) -> Result<Self, Self::Error> {
        let raw_status = db.status.unwrap_or_default();
        let status = ApplicationStatus::parse(&raw_status).ok_or_else(|| {
            AppError::Internal(format!("Unknown application status '{}'", raw_status))
        })?;

        Ok(Self {
            id: db.id.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            full_name: db.full_name.unwrap_or_default(),
            email: db.email.unwrap_or_default(),
            phone: db.phone,
            experience_years: db.experience_years.unwrap_or_default(),
            bio: db.bio.unwrap_or_default(),
            specializations: decode_string_list(db.specializations),
            hourly_rate: db.hourly_rate,
            status,
            reviewer_notes: db.reviewer_notes,
            created_at: db.created_at.unwrap_or_default(),
        })
    }
}
