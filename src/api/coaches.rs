use std::collections::BTreeMap;

use chrono::Duration;
use rocket::{FromForm, State};
use rocket::http::Status;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, User};
use crate::coaching::{AppointmentSlot, SlotWindow, day_name, group_by_date};
use crate::config::AppConfig;
use crate::db::{
    MAX_DURATION_MINUTES, MIN_DURATION_MINUTES, NewCoachApplication, add_availability_slot,
    get_coach_applications, get_coach_availability, get_coach_profile, get_coach_slots,
    get_coach_stats, get_coaches, remove_availability_slot, replace_coach_availability,
    review_coach_application, submit_coach_application, update_coach_profile,
};
use crate::models::{
    ApplicationStatus, CoachApplication, CoachAvailability, CoachProfile, CoachStats,
    NewAvailability,
};
use crate::validation::{AppErrorExt, ApiError, JsonValidateExt, PermissionCheckExt};

use super::{bad_request, now, parse_date, parse_time};

#[get("/coaches")]
pub async fn api_get_coaches(db: &State<Pool<Sqlite>>) -> Result<Json<Vec<CoachProfile>>, ApiError> {
    let coaches = get_coaches(db).await.validate_custom()?;
    Ok(Json(coaches))
}

#[get("/coaches/<id>")]
pub async fn api_get_coach(id: i64, db: &State<Pool<Sqlite>>) -> Result<Json<CoachProfile>, ApiError> {
    let coach = get_coach_profile(db, id).await.validate_custom()?;
    Ok(Json(coach))
}

#[get("/coaches/<id>/stats")]
pub async fn api_get_coach_stats(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CoachStats>, Status> {
    if user.id != id && !user.has_permission(Permission::ManageAllAppointments) {
        return Err(Status::Forbidden);
    }

    let stats = get_coach_stats(db, id, now()).await?;
    Ok(Json(stats))
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AvailabilityResponse {
    pub id: i64,
    pub day_of_week: u8,
    pub day_name: String,
    pub start_time: String,
    pub end_time: String,
    pub is_available: bool,
}

impl From<CoachAvailability> for AvailabilityResponse {
    fn from(row: CoachAvailability) -> Self {
        Self {
            id: row.id,
            day_of_week: row.day_of_week,
            day_name: day_name(row.day_of_week).to_string(),
            start_time: row.start_time.format("%H:%M").to_string(),
            end_time: row.end_time.format("%H:%M").to_string(),
            is_available: row.is_available,
        }
    }
}

#[get("/coaches/<id>/availability")]
pub async fn api_get_coach_availability(
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<AvailabilityResponse>>, ApiError> {
    let rows = get_coach_availability(db, id).await.validate_custom()?;
    Ok(Json(rows.into_iter().map(AvailabilityResponse::from).collect()))
}

#[derive(FromForm, Debug)]
pub struct SlotQuery {
    start: String,
    end: Option<String>,
    duration: Option<i64>,
    only_available: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SlotResponse {
    pub date: String,
    pub time: String,
    pub day_of_week: u8,
    pub day_name: String,
    pub available: bool,
}

impl From<&AppointmentSlot> for SlotResponse {
    fn from(slot: &AppointmentSlot) -> Self {
        Self {
            date: slot.date.format("%Y-%m-%d").to_string(),
            time: slot.time.format("%H:%M").to_string(),
            day_of_week: slot.day_of_week,
            day_name: day_name(slot.day_of_week).to_string(),
            available: slot.available,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SlotsResponse {
    pub coach_id: i64,
    pub start: String,
    pub end: String,
    pub duration_minutes: i64,
    pub slots: Vec<SlotResponse>,
    pub by_date: BTreeMap<String, Vec<SlotResponse>>,
}

/// Bookable slots over `[start, end)`. `end` defaults to one week after `start`.
#[get("/coaches/<id>/slots?<query..>")]
pub async fn api_get_coach_slots(
    id: i64,
    query: SlotQuery,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<SlotsResponse>, ApiError> {
    let start_date = parse_date("start", &query.start)?;
    let end_date = match &query.end {
        Some(end) => parse_date("end", end)?,
        None => start_date
            .checked_add_signed(Duration::days(7))
            .ok_or_else(|| bad_request("start", "Start date is out of range"))?,
    };
    let slot_minutes = query.duration.unwrap_or(config.default_slot_minutes);

    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&slot_minutes) {
        return Err(bad_request(
            "duration",
            &format!(
                "Slot duration must be between {} and {} minutes",
                MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
            ),
        ));
    }

    let window = SlotWindow {
        start_date,
        end_date,
        slot_minutes,
    };
    if window.days() > config.max_slot_window_days {
        return Err(bad_request(
            "end",
            &format!(
                "Slot window cannot exceed {} days",
                config.max_slot_window_days
            ),
        ));
    }

    get_coach_profile(db, id).await.validate_custom()?;

    let mut slots = get_coach_slots(db, id, &window).await.validate_custom()?;
    if query.only_available.unwrap_or(false) {
        slots.retain(|slot| slot.available);
    }

    let by_date = group_by_date(&slots)
        .into_iter()
        .map(|(date, day)| {
            (
                date.format("%Y-%m-%d").to_string(),
                day.iter().map(SlotResponse::from).collect(),
            )
        })
        .collect();

    Ok(Json(SlotsResponse {
        coach_id: id,
        start: start_date.format("%Y-%m-%d").to_string(),
        end: end_date.format("%Y-%m-%d").to_string(),
        duration_minutes: slot_minutes,
        slots: slots.iter().map(SlotResponse::from).collect(),
        by_date,
    }))
}

#[derive(Deserialize, Validate)]
pub struct CoachProfileRequest {
    #[validate(length(max = 2000, message = "Bio is too long"))]
    bio: Option<String>,
    specializations: Option<Vec<String>>,
    #[validate(range(min = 0.0, message = "Hourly rate cannot be negative"))]
    hourly_rate: Option<f64>,
    timezone: Option<String>,
}

#[put("/coach/profile", data = "<profile>")]
pub async fn api_update_coach_profile(
    profile: Json<CoachProfileRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CoachProfile>, ApiError> {
    user.require_permission(Permission::EditCoachProfile)
        .validate_custom()?;
    let validated = profile.validate_custom()?;

    update_coach_profile(
        db,
        user.id,
        validated.bio.as_deref(),
        validated.specializations.as_deref(),
        validated.hourly_rate,
        validated.timezone.as_deref(),
    )
    .await
    .validate_custom()?;

    let updated = get_coach_profile(db, user.id).await.validate_custom()?;
    Ok(Json(updated))
}

#[derive(Deserialize, Debug, Clone)]
pub struct AvailabilityInput {
    day_of_week: u8,
    start_time: String,
    end_time: String,
    #[serde(default = "default_true")]
    is_available: bool,
}

fn default_true() -> bool {
    true
}

impl AvailabilityInput {
    fn parse(&self) -> Result<NewAvailability, ApiError> {
        Ok(NewAvailability {
            day_of_week: self.day_of_week,
            start_time: parse_time("start_time", &self.start_time)?,
            end_time: parse_time("end_time", &self.end_time)?,
            is_available: self.is_available,
        })
    }
}

#[derive(Deserialize, Debug)]
pub struct AvailabilityRequest {
    slots: Vec<AvailabilityInput>,
}

/// Full save: every previous row of the coach is replaced.
#[put("/coach/availability", data = "<request>")]
pub async fn api_replace_availability(
    request: Json<AvailabilityRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<AvailabilityResponse>>, ApiError> {
    user.require_permission(Permission::ManageAvailability)
        .validate_custom()?;

    let rows = request
        .slots
        .iter()
        .map(AvailabilityInput::parse)
        .collect::<Result<Vec<_>, _>>()?;

    let saved = replace_coach_availability(db, user.id, &rows)
        .await
        .validate_custom()?;

    Ok(Json(saved.into_iter().map(AvailabilityResponse::from).collect()))
}

#[post("/coach/availability", data = "<slot>")]
pub async fn api_add_availability(
    slot: Json<AvailabilityInput>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    user.require_permission(Permission::ManageAvailability)
        .validate_custom()?;

    let row = slot.parse()?;
    add_availability_slot(db, user.id, &row)
        .await
        .validate_custom()?;

    Ok(Status::Created)
}

#[delete("/coach/availability/<id>")]
pub async fn api_delete_availability(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    user.require_permission(Permission::ManageAvailability)
        .validate_custom()?;

    remove_availability_slot(db, user.id, id)
        .await
        .validate_custom()?;

    Ok(Status::NoContent)
}

#[derive(Deserialize, Validate)]
pub struct CoachApplicationRequest {
    #[validate(length(min = 2, message = "Full name is required"))]
    full_name: String,
    #[validate(email(message = "Email address is not valid"))]
    email: String,
    phone: Option<String>,
    #[validate(range(min = 0, max = 60, message = "Experience must be between 0 and 60 years"))]
    experience_years: i64,
    #[validate(length(min = 20, message = "Bio must be at least 20 characters"))]
    bio: String,
    #[serde(default)]
    specializations: Vec<String>,
    hourly_rate: Option<f64>,
    terms_accepted: bool,
}

#[post("/coach/applications", data = "<application>")]
pub async fn api_submit_coach_application(
    application: Json<CoachApplicationRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CoachApplication>, ApiError> {
    user.require_permission(Permission::ApplyAsCoach)
        .validate_custom()?;
    let validated = application.validate_custom()?;

    let submitted = submit_coach_application(
        db,
        user.id,
        &NewCoachApplication {
            full_name: validated.full_name,
            email: validated.email,
            phone: validated.phone,
            experience_years: validated.experience_years,
            bio: validated.bio,
            specializations: validated.specializations,
            hourly_rate: validated.hourly_rate,
            terms_accepted: validated.terms_accepted,
        },
    )
    .await
    .validate_custom()?;

    Ok(Json(submitted))
}

#[get("/admin/coach-applications?<status>")]
pub async fn api_get_coach_applications(
    status: Option<String>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<CoachApplication>>, ApiError> {
    user.require_permission(Permission::ReviewCoachApplications)
        .validate_custom()?;

    let status = match status.as_deref() {
        Some(raw) => Some(
            ApplicationStatus::parse(raw)
                .ok_or_else(|| bad_request("status", "Unknown application status"))?,
        ),
        None => None,
    };

    let applications = get_coach_applications(db, status).await.validate_custom()?;
    Ok(Json(applications))
}

#[derive(Deserialize, Default)]
pub struct ReviewRequest {
    reviewer_notes: Option<String>,
}

async fn review(
    id: i64,
    decision: ApplicationStatus,
    request: Option<Json<ReviewRequest>>,
    user: &User,
    db: &Pool<Sqlite>,
) -> Result<Json<CoachApplication>, ApiError> {
    user.require_permission(Permission::ReviewCoachApplications)
        .validate_custom()?;

    let notes = request.and_then(|r| r.into_inner().reviewer_notes);
    let reviewed = review_coach_application(db, id, decision, notes.as_deref(), now())
        .await
        .validate_custom()?;

    Ok(Json(reviewed))
}

#[post("/admin/coach-applications/<id>/approve", data = "<request>")]
pub async fn api_approve_coach_application(
    id: i64,
    request: Option<Json<ReviewRequest>>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CoachApplication>, ApiError> {
    review(id, ApplicationStatus::Approved, request, &user, db).await
}

#[post("/admin/coach-applications/<id>/reject", data = "<request>")]
pub async fn api_reject_coach_application(
    id: i64,
    request: Option<Json<ReviewRequest>>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CoachApplication>, ApiError> {
    review(id, ApplicationStatus::Rejected, request, &user, db).await
}
