//! Authentication service handle

use super::{StoreApp, StoreError, IDENTITY_ENDPOINT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request timeout for identity calls
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Handle to the hosted identity service
pub struct AuthClient {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(rename = "returnSecureToken")]
    return_secure_token: bool,
}

/// An authenticated identity session
#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct AuthSession {
    #[serde(rename = "idToken")]
    pub id_token: String,
    #[serde(rename = "localId")]
    pub local_id: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
    #[serde(rename = "expiresIn")]
    pub expires_in: String,
}

impl AuthClient {
    pub(super) fn new(app: &StoreApp) -> Self {
        Self {
            http: app.http.clone(),
            api_key: app.config.api_key.clone(),
        }
    }

    /// Sign a user in with email and password.
    #[allow(dead_code)]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, StoreError> {
        let url = sign_in_url(&self.api_key);
        let response = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(&SignInRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(super::provider_error(response).await);
        }
        Ok(response.json::<AuthSession>().await?)
    }
}

/// Build the sign-in URL for the identity endpoint
fn sign_in_url(api_key: &str) -> String {
    format!(
        "{}/v1/accounts:signInWithPassword?key={}",
        IDENTITY_ENDPOINT, api_key
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_url() {
        let url = sign_in_url("key_123");
        assert!(url.starts_with("https://"));
        assert!(url.contains("accounts:signInWithPassword"));
        assert!(url.ends_with("key=key_123"));
    }

    #[test]
    fn test_sign_in_request_serialization() {
        let json = serde_json::to_string(&SignInRequest {
            email: "a@b.c",
            password: "pw",
            return_secure_token: true,
        })
        .unwrap();
        assert!(json.contains(r#""returnSecureToken":true"#));
        assert!(json.contains(r#""email":"a@b.c""#));
    }

    #[test]
    fn test_auth_session_deserialization() {
        let json = r#"{
            "idToken": "tok",
            "localId": "uid_1",
            "refreshToken": "ref",
            "expiresIn": "3600",
            "email": "a@b.c"
        }"#;
        let session: AuthSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.id_token, "tok");
        assert_eq!(session.local_id, "uid_1");
    }
}
