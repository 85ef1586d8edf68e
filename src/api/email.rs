use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, json::Json};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::mailer::{MailError, OutgoingEmail, SharedMailer, message_id};

#[derive(Deserialize, Debug)]
pub struct EmailRequest {
    to: Option<String>,
    subject: Option<String>,
    html: Option<String>,
    text: Option<String>,
}

fn send_failure(details: String) -> Custom<Json<Value>> {
    Custom(
        Status::InternalServerError,
        Json(json!({
            "error": "Failed to send email",
            "details": details,
        })),
    )
}

/// Unauthenticated outbound email relay. Unparseable bodies get the relay's
/// `{error, details}` shape, not the API's validation bodies.
#[post("/email", data = "<body>")]
pub async fn api_send_email(body: String, mailer: &State<SharedMailer>) -> Custom<Json<Value>> {
    let request: EmailRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "Email relay received a malformed body");
            return send_failure(err.to_string());
        }
    };

    let (to, subject) = match (request.to, request.subject) {
        (Some(to), Some(subject)) if !to.trim().is_empty() && !subject.trim().is_empty() => {
            (to, subject)
        }
        _ => {
            return Custom(
                Status::BadRequest,
                Json(json!({ "error": "Missing required fields: to, subject" })),
            );
        }
    };

    let email = OutgoingEmail {
        to,
        subject,
        html: request.html,
        text: request.text,
    };

    match mailer.send(&email).await {
        Ok(()) => {
            info!(to = %email.to, "Relayed email");
            Custom(
                Status::Ok,
                Json(json!({
                    "success": true,
                    "message": "Email sent successfully",
                    "messageId": message_id(&email.to),
                })),
            )
        }
        Err(MailError::NotConfigured) => Custom(
            Status::InternalServerError,
            Json(json!({ "error": "SMTP credentials not configured" })),
        ),
        Err(err) => {
            error!(to = %email.to, error = %err, "Email relay failed");
            send_failure(err.to_string())
        }
    }
}

#[options("/email")]
pub fn api_email_preflight() -> &'static str {
    "ok"
}
