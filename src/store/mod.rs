//! Backing store bootstrap
//!
//! Process-wide, initialize-once handle to the hosted identity and document
//! database services. Collaborators outside the session core use the
//! returned handles; the session shim itself never touches them.

mod auth;
mod db;

pub use auth::AuthClient;
pub use db::DocumentStore;

use anyhow::Context;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

/// Identity service REST endpoint
const IDENTITY_ENDPOINT: &str = "https://identitytoolkit.googleapis.com";

/// Document database REST endpoint
const DOCUMENTS_ENDPOINT: &str = "https://firestore.googleapis.com";

/// Global application handle, set once at startup
static STORE_APP: OnceCell<StoreApp> = OnceCell::new();

/// Backing store configuration, from the embedded config file.
///
/// The API key is a client-side identifier, not a secret.
#[derive(Clone, Debug, Deserialize)]
pub struct StoreConfig {
    pub api_key: String,
    pub project_id: String,
}

/// The process-wide application handle
#[derive(Debug)]
struct StoreApp {
    config: StoreConfig,
    http: reqwest::Client,
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Backing store is not initialized")]
    NotInitialized,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Store error ({status}): {message}")]
    Provider { status: u16, message: String },
}

/// Initialize the application handle. Exactly one call wins; later calls
/// log a warning and are no-ops.
pub fn initialize(config: StoreConfig) -> anyhow::Result<()> {
    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to create HTTP client for the backing store")?;

    let project_id = config.project_id.clone();
    if STORE_APP.set(StoreApp { config, http }).is_err() {
        warn!("Backing store already initialized");
    } else {
        info!("Backing store initialized for project {}", project_id);
    }
    Ok(())
}

fn app() -> Result<&'static StoreApp, StoreError> {
    STORE_APP.get().ok_or(StoreError::NotInitialized)
}

/// The authentication service handle.
#[allow(dead_code)]
pub fn auth() -> Result<AuthClient, StoreError> {
    Ok(AuthClient::new(app()?))
}

/// The document database handle.
#[allow(dead_code)]
pub fn db() -> Result<DocumentStore, StoreError> {
    Ok(DocumentStore::new(app()?))
}

/// Provider error payload shape
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: Option<ProviderErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    message: Option<String>,
}

/// Map a non-success response to a typed store error
pub(crate) async fn provider_error(response: reqwest::Response) -> StoreError {
    let status = response.status().as_u16();
    let message = response
        .json::<ProviderErrorBody>()
        .await
        .ok()
        .and_then(|body| body.error)
        .and_then(|detail| detail.message)
        .unwrap_or_else(|| "unknown error".to_string());
    StoreError::Provider { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The handle is process-global, so the whole lifecycle lives in one
    // test: access before init fails, init wins once, re-init is a no-op.
    #[test]
    fn test_initialize_once_lifecycle() {
        assert!(matches!(auth(), Err(StoreError::NotInitialized)));
        assert!(matches!(db(), Err(StoreError::NotInitialized)));

        let config = StoreConfig {
            api_key: "key_one".to_string(),
            project_id: "project-one".to_string(),
        };
        initialize(config).unwrap();
        assert!(auth().is_ok());
        assert!(db().is_ok());

        // Second initialization must not panic or replace the handle.
        let other = StoreConfig {
            api_key: "key_two".to_string(),
            project_id: "project-two".to_string(),
        };
        initialize(other).unwrap();
        assert_eq!(app().unwrap().config.project_id, "project-one");
    }
}
