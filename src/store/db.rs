//! Document database handle

use super::{StoreApp, StoreError, DOCUMENTS_ENDPOINT};
use std::time::Duration;

/// Request timeout for document calls
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Handle to the hosted document database
pub struct DocumentStore {
    http: reqwest::Client,
    project_id: String,
}

impl DocumentStore {
    pub(super) fn new(app: &StoreApp) -> Self {
        Self {
            http: app.http.clone(),
            project_id: app.config.project_id.clone(),
        }
    }

    /// Fetch a single document by collection and id.
    #[allow(dead_code)]
    pub async fn fetch_document(
        &self,
        collection: &str,
        document_id: &str,
        id_token: Option<&str>,
    ) -> Result<serde_json::Value, StoreError> {
        let url = document_url(&self.project_id, collection, document_id);
        let mut request = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));
        if let Some(token) = id_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(super::provider_error(response).await);
        }
        Ok(response.json().await?)
    }

    /// Create or update a single document. Fields use the provider's typed
    /// value encoding and are passed through opaquely.
    #[allow(dead_code)]
    pub async fn write_document(
        &self,
        collection: &str,
        document_id: &str,
        fields: &serde_json::Value,
        id_token: Option<&str>,
    ) -> Result<(), StoreError> {
        let url = document_url(&self.project_id, collection, document_id);
        let mut request = self
            .http
            .patch(&url)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(&serde_json::json!({ "fields": fields }));
        if let Some(token) = id_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(super::provider_error(response).await);
        }
        Ok(())
    }
}

/// Build the REST URL for one document
fn document_url(project_id: &str, collection: &str, document_id: &str) -> String {
    format!(
        "{}/v1/projects/{}/databases/(default)/documents/{}/{}",
        DOCUMENTS_ENDPOINT, project_id, collection, document_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_url() {
        let url = document_url("prepcall-dev", "interviews", "iv_42");
        assert_eq!(
            url,
            "https://firestore.googleapis.com/v1/projects/prepcall-dev/databases/(default)/documents/interviews/iv_42"
        );
    }
}
