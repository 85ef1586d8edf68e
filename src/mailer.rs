use std::sync::Arc;

use chrono::Utc;
use lettre::message::{Mailbox, MultiPart, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, instrument};

const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 587;
const IMPLICIT_TLS_PORT: u16 = 465;
const DEFAULT_FROM_ADDRESS: &str = "destek@basariyolum.com";

static LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("line break pattern is valid"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP credentials not configured")]
    NotConfigured,

    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(String),
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: Option<String>,
    pub text: Option<String>,
}

impl OutgoingEmail {
    /// Plain-text body, derived from the HTML when no text was given.
    pub fn plain_text(&self) -> Option<String> {
        match (&self.text, &self.html) {
            (Some(text), _) => Some(text.clone()),
            (None, Some(html)) => Some(html_to_text(html)),
            (None, None) => None,
        }
    }
}

pub fn html_to_text(html: &str) -> String {
    let with_breaks = LINE_BREAK.replace_all(html, "\n");
    TAG.replace_all(&with_breaks, "").into_owned()
}

/// Identifier returned to relay callers for a sent message.
pub fn message_id(to: &str) -> String {
    format!("{}_{}", Utc::now().timestamp_millis(), to)
}

#[rocket::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

pub type SharedMailer = Arc<dyn Mailer>;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_address: String,
}

impl SmtpConfig {
    /// `None` unless both `SMTP_USER` and `SMTP_PASS` are set.
    pub fn from_env() -> Option<Self> {
        let user = std::env::var("SMTP_USER").ok().filter(|v| !v.is_empty())?;
        let password = std::env::var("SMTP_PASS").ok().filter(|v| !v.is_empty())?;

        Some(Self {
            host: std::env::var("SMTP_HOST").unwrap_or_else(|_| DEFAULT_SMTP_HOST.to_string()),
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            user,
            password,
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
        })
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let builder = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from: config.from_address.parse()?,
        })
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message, MailError> {
        let builder = Message::builder()
            .from(self.from.clone())
            .to(email.to.parse()?)
            .subject(email.subject.clone());

        let message = match (&email.html, email.plain_text()) {
            (Some(html), text) => builder.multipart(MultiPart::alternative_plain_html(
                text.unwrap_or_default(),
                html.clone(),
            )),
            (None, text) => builder
                .header(ContentType::TEXT_PLAIN)
                .body(text.unwrap_or_default()),
        };

        message.map_err(|e| MailError::Build(e.to_string()))
    }
}

#[rocket::async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip_all, fields(to = %email.to))]
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = self.build_message(email)?;
        self.transport.send(message).await?;
        info!("Email sent");
        Ok(())
    }
}

/// Stand-in used when SMTP is not configured. Every send fails.
pub struct DisabledMailer;

#[rocket::async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, _email: &OutgoingEmail) -> Result<(), MailError> {
        Err(MailError::NotConfigured)
    }
}

/// Builds the mailer from the environment, falling back to [`DisabledMailer`].
pub fn mailer_from_env() -> Result<SharedMailer, MailError> {
    match SmtpConfig::from_env() {
        Some(config) => {
            info!(host = %config.host, port = config.port, "SMTP mailer configured");
            Ok(Arc::new(SmtpMailer::new(&config)?))
        }
        None => {
            tracing::warn!("SMTP_USER/SMTP_PASS not set, outbound email disabled");
            Ok(Arc::new(DisabledMailer))
        }
    }
}
