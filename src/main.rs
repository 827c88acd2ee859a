#[macro_use]
extern crate rocket;

mod analysis;
mod api;
mod audit;
mod client;
mod database;
mod entities;
mod env;
mod error;
mod extract;
mod llm;
mod matching;
mod models;
mod prompts;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use client::ClientSelector;
use env::{load_environment, AppConfig};
use error::AppError;
use llm::{Completions, OpenAiClient};
use rocket::{Build, Rocket};
use telemetry::{init_tracing, shutdown_telemetry, TelemetryFairing};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    Rocket(#[from] rocket::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    load_environment().map_err(|e| anyhow::anyhow!("Failed to load environment: {}", e))?;
    init_tracing();

    let config = AppConfig::from_env()?;
    let selector = ClientSelector::connect(&config).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(selector.migration_pool())
        .await
        .map_err(AppError::from)?;
    info!("Migrations completed successfully");

    let completions: Completions = Box::new(OpenAiClient::from_config(&config)?);

    let result = init_rocket(selector, completions, config).launch().await;
    shutdown_telemetry();
    result?;

    Ok(())
}

pub fn init_rocket(
    selector: ClientSelector,
    completions: Completions,
    config: AppConfig,
) -> Rocket<Build> {
    info!(
        model = completions.model(),
        environment = ?config.environment,
        "Starting courtside"
    );

    rocket::build()
        .manage(selector)
        .manage(completions)
        .manage(config)
        .mount("/api", api::routes())
        .register(
            "/",
            catchers![
                validation::bad_request,
                validation::not_found,
                validation::unprocessable,
                validation::internal_error,
            ],
        )
        .attach(TelemetryFairing)
}
