use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Cookie, Header, SameSite, Status};
use rocket::time::Duration;
use rocket::{Request, Response};

use crate::auth::SESSION_COOKIE;
use crate::config::AppConfig;

pub const RELAY_PATH: &str = "/api/email";

const RELAY_ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";
const RELAY_ALLOW_METHODS: &str = "POST, OPTIONS";
const API_ALLOW_HEADERS: &str = "Content-Type, Authorization";
const API_ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";

/// Adds CORS headers to every response. The email relay is open to any
/// origin; everything else is limited to the configured allow-list.
pub struct Cors {
    config: AppConfig,
}

impl Cors {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Value for `Access-Control-Allow-Origin` given the caller's `Origin`.
    pub fn resolve_origin<'a>(&'a self, origin: Option<&'a str>) -> &'a str {
        match origin {
            Some(origin) if self.config.allows_origin(origin) => origin,
            _ => self.config.primary_origin(),
        }
    }
}

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if request.uri().path().as_str() == RELAY_PATH {
            response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
            response.set_header(Header::new(
                "Access-Control-Allow-Headers",
                RELAY_ALLOW_HEADERS,
            ));
            response.set_header(Header::new(
                "Access-Control-Allow-Methods",
                RELAY_ALLOW_METHODS,
            ));
            return;
        }

        let origin = self.resolve_origin(request.headers().get_one("Origin"));
        response.set_header(Header::new(
            "Access-Control-Allow-Origin",
            origin.to_string(),
        ));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
        response.set_header(Header::new("Access-Control-Allow-Methods", API_ALLOW_METHODS));
        response.set_header(Header::new("Access-Control-Allow-Headers", API_ALLOW_HEADERS));
        response.set_header(Header::new("Vary", "Origin"));
    }
}

/// Answers CORS preflight for any API path.
#[options("/<_..>", rank = 20)]
pub fn preflight() -> Status {
    Status::NoContent
}

pub fn session_cookie(config: &AppConfig, token: String) -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(config.cookie_secure)
        .max_age(Duration::days(config.session_ttl_days));

    if let Some(domain) = &config.cookie_domain {
        cookie = cookie.domain(domain.clone());
    }

    cookie.build()
}

/// Cookie used to remove the session cookie; path and domain must match.
pub fn removal_cookie(config: &AppConfig) -> Cookie<'static> {
    let mut cookie = Cookie::build(SESSION_COOKIE).path("/");

    if let Some(domain) = &config.cookie_domain {
        cookie = cookie.domain(domain.clone());
    }

    cookie.build()
}
