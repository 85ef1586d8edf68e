#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod coaching;
mod config;
mod db;
mod edge;
mod env;
mod error;
mod mailer;
mod models;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use std::time::Duration;

use auth::{forbidden_api, not_found_api, unauthorized_api, unprocessable_api};
use chrono::{NaiveDateTime, Utc};
use config::AppConfig;
use db::{clean_expired_sessions, expire_subscriptions};
use edge::Cors;
use error::AppError;
use mailer::{SharedMailer, mailer_from_env};
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use telemetry::{TelemetryFairing, init_tracing, shutdown_telemetry};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    Figment(rocket::figment::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
    #[error("{0}")]
    Rocket(Box<rocket::Error>),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

impl From<rocket::figment::Error> for Error {
    fn from(value: rocket::figment::Error) -> Self {
        Error::Figment(value)
    }
}

impl From<rocket::Error> for Error {
    fn from(value: rocket::Error) -> Self {
        Error::Rocket(Box::new(value))
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    if let Err(e) = env::load_environment() {
        eprintln!("Failed to load environment files: {}", e);
    }

    init_tracing();

    let config = AppConfig::from_figment(&rocket::Config::figment())?;

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL is not set"))?;
    let pool = SqlitePool::connect(&database_url).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(AppError::from)?;
    info!("Migrations completed successfully");

    spawn_maintenance(pool.clone(), config.maintenance_interval_secs);

    let mailer = mailer_from_env().map_err(|e| anyhow::anyhow!("Mailer setup failed: {}", e))?;

    let result = init_rocket(pool, config, mailer).launch().await;
    shutdown_telemetry();
    result?;

    Ok(())
}

/// Periodically purges expired sessions and expires past-due subscriptions.
fn spawn_maintenance(pool: SqlitePool, interval_secs: u64) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;

        loop {
            run_maintenance(&pool, Utc::now().naive_utc()).await;
            tokio::time::sleep(Duration::from_secs(interval_secs.max(1))).await;
        }
    });
}

/// One maintenance pass. Returns the number of sessions removed and subscriptions expired.
pub async fn run_maintenance(pool: &SqlitePool, now: NaiveDateTime) -> (u64, u64) {
    let sessions = match clean_expired_sessions(pool).await {
        Ok(count) => {
            if count > 0 {
                info!("Cleaned up {} expired sessions", count);
            }
            count
        }
        Err(e) => {
            error!("Failed to clean expired sessions: {}", e);
            0
        }
    };

    let subscriptions = match expire_subscriptions(pool, now).await {
        Ok(count) => {
            if count > 0 {
                info!("Expired {} subscriptions", count);
            }
            count
        }
        Err(e) => {
            error!("Failed to expire subscriptions: {}", e);
            0
        }
    };

    (sessions, subscriptions)
}

pub fn init_rocket(pool: SqlitePool, config: AppConfig, mailer: SharedMailer) -> Rocket<Build> {
    info!("Starting BaşarıYolu coaching service");

    rocket::build()
        .attach(Cors::new(config.clone()))
        .attach(TelemetryFairing)
        .manage(pool)
        .manage(config)
        .manage(mailer)
        .mount("/api", api::routes())
        .register(
            "/api",
            catchers![
                unauthorized_api,
                forbidden_api,
                not_found_api,
                unprocessable_api
            ],
        )
}
