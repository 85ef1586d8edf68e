use rocket::http::Status;
use rocket::serde::{Deserialize, json::Json};
use rocket::{FromForm, State};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};
use validator::Validate;

use crate::auth::{Permission, User};
use crate::coaching::{AppointmentAction, AppointmentStatus, Participant};
use crate::config::AppConfig;
use crate::db::{
    AppointmentChanges, AppointmentFilter, NewAppointment, TransitionDetails, apply_transition,
    create_direct_appointment, delete_appointment, get_appointment, get_coach_appointments,
    get_student_appointments, get_user, request_appointment, update_appointment,
};
use crate::mailer::{OutgoingEmail, SharedMailer};
use crate::models::CoachingAppointment;
use crate::validation::{
    AppErrorExt, ApiError, JsonValidateExt, PermissionCheckExt, ToValidationResponse,
};

use super::{bad_request, now, parse_date, parse_datetime};

#[derive(Deserialize, Validate)]
pub struct AppointmentRequestBody {
    subscription_id: i64,
    appointment_date: String,
    duration_minutes: Option<i64>,
    #[validate(length(max = 200, message = "Title is too long"))]
    title: Option<String>,
    #[validate(length(max = 2000, message = "Description is too long"))]
    description: Option<String>,
    #[validate(url(message = "Meeting link must be a URL"))]
    google_meet_link: Option<String>,
}

impl AppointmentRequestBody {
    fn into_new_appointment(self, default_minutes: i64) -> Result<NewAppointment, ApiError> {
        Ok(NewAppointment {
            subscription_id: self.subscription_id,
            appointment_date: parse_datetime("appointment_date", &self.appointment_date)?,
            duration_minutes: self.duration_minutes.unwrap_or(default_minutes),
            title: self.title,
            description: self.description,
            google_meet_link: self.google_meet_link,
        })
    }
}

/// A student asks for one of a coach's free slots.
#[post("/appointments/request", data = "<request>")]
pub async fn api_request_appointment(
    request: Json<AppointmentRequestBody>,
    user: User,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<(Status, Json<CoachingAppointment>), ApiError> {
    user.require_permission(Permission::RequestAppointments)
        .validate_custom()?;
    let appointment = request
        .validate_custom()?
        .into_new_appointment(config.default_slot_minutes)?;

    let created = request_appointment(db, user.id, &appointment, now())
        .await
        .validate_custom()?;

    info!(appointment_id = created.id, "Appointment requested");
    Ok((Status::Created, Json(created)))
}

/// A coach books a session directly; it skips the pending step.
#[post("/appointments", data = "<request>")]
pub async fn api_create_appointment(
    request: Json<AppointmentRequestBody>,
    user: User,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<(Status, Json<CoachingAppointment>), ApiError> {
    user.require_permission(Permission::ManageAppointments)
        .validate_custom()?;
    let appointment = request
        .validate_custom()?
        .into_new_appointment(config.default_slot_minutes)?;

    let created = create_direct_appointment(db, user.id, &appointment, now())
        .await
        .validate_custom()?;

    Ok((Status::Created, Json(created)))
}

#[derive(FromForm, Debug)]
pub struct AppointmentQuery {
    start: Option<String>,
    end: Option<String>,
    status: Option<String>,
}

impl AppointmentQuery {
    fn to_filter(&self) -> Result<AppointmentFilter, ApiError> {
        let start = self
            .start
            .as_deref()
            .map(|raw| parse_date("start", raw))
            .transpose()?
            .and_then(|date| date.and_hms_opt(0, 0, 0));
        let end = self
            .end
            .as_deref()
            .map(|raw| parse_date("end", raw))
            .transpose()?
            .and_then(|date| date.and_hms_opt(23, 59, 59));

        let statuses = match self.status.as_deref() {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    AppointmentStatus::parse(s)
                        .ok_or_else(|| bad_request("status", &format!("Unknown status '{}'", s)))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(AppointmentFilter {
            start,
            end,
            statuses,
        })
    }
}

/// Appointments of the caller, as coach or as student. `start` and `end` are inclusive dates.
#[get("/appointments?<query..>")]
pub async fn api_get_appointments(
    query: AppointmentQuery,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<CoachingAppointment>>, ApiError> {
    let filter = query.to_filter()?;

    let appointments = if user.has_permission(Permission::ManageAppointments) {
        get_coach_appointments(db, user.id, &filter).await
    } else {
        get_student_appointments(db, user.id, &filter).await
    }
    .validate_custom()?;

    Ok(Json(appointments))
}

/// Which side the caller acts as. Admins act with coach rights on any appointment.
fn acting_participant(user: &User, appointment: &CoachingAppointment) -> Option<Participant> {
    appointment.participant(user.id).or_else(|| {
        user.has_permission(Permission::ManageAllAppointments)
            .then_some(Participant::Coach)
    })
}

async fn load_for(
    db: &Pool<Sqlite>,
    user: &User,
    id: i64,
) -> Result<(CoachingAppointment, Participant), ApiError> {
    let appointment = get_appointment(db, id).await.validate_custom()?;
    match acting_participant(user, &appointment) {
        Some(participant) => Ok((appointment, participant)),
        None => Err(Status::Forbidden.to_validation_response()),
    }
}

#[get("/appointments/<id>")]
pub async fn api_get_appointment(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CoachingAppointment>, ApiError> {
    let (appointment, _) = load_for(db, &user, id).await?;
    Ok(Json(appointment))
}

#[derive(Deserialize, Validate)]
pub struct AppointmentUpdateRequest {
    appointment_date: Option<String>,
    duration_minutes: Option<i64>,
    #[validate(length(max = 200, message = "Title is too long"))]
    title: Option<String>,
    #[validate(length(max = 2000, message = "Description is too long"))]
    description: Option<String>,
    #[validate(url(message = "Meeting link must be a URL"))]
    google_meet_link: Option<String>,
}

#[put("/appointments/<id>", data = "<update>")]
pub async fn api_update_appointment(
    id: i64,
    update: Json<AppointmentUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CoachingAppointment>, ApiError> {
    let (_, participant) = load_for(db, &user, id).await?;
    if participant != Participant::Coach {
        return Err(Status::Forbidden.to_validation_response());
    }

    let validated = update.validate_custom()?;
    let changes = AppointmentChanges {
        appointment_date: validated
            .appointment_date
            .as_deref()
            .map(|raw| parse_datetime("appointment_date", raw))
            .transpose()?,
        duration_minutes: validated.duration_minutes,
        title: validated.title,
        description: validated.description,
        google_meet_link: validated.google_meet_link,
    };

    let updated = update_appointment(db, id, &changes, now())
        .await
        .validate_custom()?;

    Ok(Json(updated))
}

#[delete("/appointments/<id>")]
pub async fn api_delete_appointment(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    let (_, participant) = load_for(db, &user, id).await?;
    if participant != Participant::Coach {
        return Err(Status::Forbidden.to_validation_response());
    }

    delete_appointment(db, id).await.validate_custom()?;
    Ok(Status::NoContent)
}

#[derive(Deserialize, Default, Validate)]
pub struct TransitionRequest {
    #[validate(url(message = "Meeting link must be a URL"))]
    google_meet_link: Option<String>,
    coach_notes: Option<String>,
    #[validate(length(max = 1000, message = "Reason is too long"))]
    reason: Option<String>,
}

async fn act(
    id: i64,
    action: AppointmentAction,
    request: Option<Json<TransitionRequest>>,
    user: &User,
    db: &Pool<Sqlite>,
    mailer: &SharedMailer,
) -> Result<Json<CoachingAppointment>, ApiError> {
    let (_, participant) = load_for(db, user, id).await?;
    if !action.permitted_for(participant) {
        warn!(appointment_id = id, action = %action, participant = %participant, "Transition not permitted");
        return Err(Status::Forbidden.to_validation_response());
    }

    let body = match request {
        Some(request) => request.validate_custom()?,
        None => TransitionRequest::default(),
    };
    let details = TransitionDetails {
        google_meet_link: body.google_meet_link,
        coach_notes: body.coach_notes,
        reason: body.reason,
    };

    let updated = apply_transition(db, id, action, &details, now())
        .await
        .validate_custom()?;

    notify(db, mailer, &updated, action, participant).await;

    Ok(Json(updated))
}

/// Emails the affected party. Failures are logged and never fail the request.
async fn notify(
    db: &Pool<Sqlite>,
    mailer: &SharedMailer,
    appointment: &CoachingAppointment,
    action: AppointmentAction,
    actor: Participant,
) {
    let recipient_id = match (action, actor) {
        (AppointmentAction::Approve | AppointmentAction::Reject, _) => appointment.student_id,
        (AppointmentAction::Cancel, Participant::Coach) => appointment.student_id,
        (AppointmentAction::Cancel, Participant::Student) => appointment.coach_id,
        _ => return,
    };

    let recipient = match get_user(db, recipient_id).await {
        Ok(user) => user,
        Err(err) => {
            err.log_and_record("Loading notification recipient");
            return;
        }
    };
    let Some(address) = recipient.email.clone() else {
        info!(user_id = recipient_id, "No email on file, skipping notification");
        return;
    };

    let email = notification_email(appointment, action, address, &recipient.display_name);
    if let Err(err) = mailer.send(&email).await {
        warn!(appointment_id = appointment.id, error = %err, "Failed to send appointment notification");
    }
}

fn notification_email(
    appointment: &CoachingAppointment,
    action: AppointmentAction,
    to: String,
    name: &str,
) -> OutgoingEmail {
    let when = appointment.appointment_date.format("%d.%m.%Y %H:%M");

    let (subject, detail) = match action {
        AppointmentAction::Approve => (
            "Randevunuz onaylandı",
            match &appointment.google_meet_link {
                Some(link) => format!("Görüşme bağlantısı: <a href=\"{0}\">{0}</a>", link),
                None => String::new(),
            },
        ),
        AppointmentAction::Reject => (
            "Randevu talebiniz reddedildi",
            appointment
                .cancellation_reason
                .as_deref()
                .map(|r| format!("Gerekçe: {}", r))
                .unwrap_or_default(),
        ),
        _ => (
            "Randevunuz iptal edildi",
            appointment
                .cancellation_reason
                .as_deref()
                .map(|r| format!("Gerekçe: {}", r))
                .unwrap_or_default(),
        ),
    };

    OutgoingEmail {
        to,
        subject: subject.to_string(),
        html: Some(format!(
            "<p>Merhaba {},</p><p>{} tarihli randevunuz: {}.<br>{}</p>",
            name, when, subject, detail
        )),
        text: None,
    }
}

#[post("/appointments/<id>/approve", data = "<request>")]
pub async fn api_approve_appointment(
    id: i64,
    request: Option<Json<TransitionRequest>>,
    user: User,
    db: &State<Pool<Sqlite>>,
    mailer: &State<SharedMailer>,
) -> Result<Json<CoachingAppointment>, ApiError> {
    act(id, AppointmentAction::Approve, request, &user, db, mailer).await
}

#[post("/appointments/<id>/reject", data = "<request>")]
pub async fn api_reject_appointment(
    id: i64,
    request: Option<Json<TransitionRequest>>,
    user: User,
    db: &State<Pool<Sqlite>>,
    mailer: &State<SharedMailer>,
) -> Result<Json<CoachingAppointment>, ApiError> {
    act(id, AppointmentAction::Reject, request, &user, db, mailer).await
}

#[post("/appointments/<id>/complete", data = "<request>")]
pub async fn api_complete_appointment(
    id: i64,
    request: Option<Json<TransitionRequest>>,
    user: User,
    db: &State<Pool<Sqlite>>,
    mailer: &State<SharedMailer>,
) -> Result<Json<CoachingAppointment>, ApiError> {
    act(id, AppointmentAction::Complete, request, &user, db, mailer).await
}

#[post("/appointments/<id>/cancel", data = "<request>")]
pub async fn api_cancel_appointment(
    id: i64,
    request: Option<Json<TransitionRequest>>,
    user: User,
    db: &State<Pool<Sqlite>>,
    mailer: &State<SharedMailer>,
) -> Result<Json<CoachingAppointment>, ApiError> {
    act(id, AppointmentAction::Cancel, request, &user, db, mailer).await
}

#[post("/appointments/<id>/no_show")]
pub async fn api_no_show_appointment(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
    mailer: &State<SharedMailer>,
) -> Result<Json<CoachingAppointment>, ApiError> {
    act(id, AppointmentAction::MarkNoShow, None, &user, db, mailer).await
}
