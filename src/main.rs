#![deny(clippy::all)]

mod client;
mod error;
mod platform;
mod screen;
mod session;
mod store;

use crate::error::AppError;
use crate::platform::PlatformClient;
use crate::session::{InterviewSession, LandingPage};
use std::sync::Arc;
use tracing::info;

/// Application configuration
#[derive(serde::Deserialize)]
struct Config {
    platform: PlatformConfig,
    navigation: NavigationConfig,
    interview: InterviewConfig,
    store: store::StoreConfig,
}

#[derive(serde::Deserialize)]
struct PlatformConfig {
    endpoint: String,
}

#[derive(serde::Deserialize)]
struct NavigationConfig {
    landing_url: String,
}

#[derive(serde::Deserialize)]
struct InterviewConfig {
    session_type: String,
}

/// Load configuration from embedded config.toml
fn load_config() -> Result<Config, AppError> {
    const CONFIG_TOML: &str = include_str!("../config.toml");
    toml::from_str(CONFIG_TOML).map_err(|e| AppError::Config(e.to_string()))
}

/// Read a required environment variable
fn required_env(name: &'static str) -> Result<String, AppError> {
    std::env::var(name).map_err(|_| AppError::MissingEnv(name))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for structured logging
    tracing_subscriber::fmt::init();

    // A .env file is optional; deployments set the variables directly
    dotenvy::dotenv().ok();

    let config = load_config()?;

    let workflow_id = required_env("PREPCALL_WORKFLOW_ID")?;
    let client_token = required_env("PREPCALL_CLIENT_TOKEN")?;

    let user_name = std::env::var("PREPCALL_USER_NAME").unwrap_or_else(|_| "guest".to_string());
    let user_id = std::env::var("PREPCALL_USER_ID").unwrap_or_else(|_| "guest".to_string());

    store::initialize(config.store)?;

    let client = Arc::new(PlatformClient::new(config.platform.endpoint, client_token));
    let navigator = Arc::new(LandingPage::new(config.navigation.landing_url));
    let session = Arc::new(InterviewSession::new(client, navigator));

    info!("Using workflow {}", workflow_id);

    screen::run(
        session.clone(),
        workflow_id,
        screen::Participant {
            user_name,
            user_id,
            session_type: config.interview.session_type,
        },
    )
    .await;

    session.shutdown();
    Ok(())
}
