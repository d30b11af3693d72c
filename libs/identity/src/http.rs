//! Identity provider reached over its REST API
//!
//! Speaks the Identity Toolkit account endpoints (`accounts:signUp`,
//! `accounts:lookup`). Provider error codes are translated into the core
//! taxonomy in [`map_provider_error`].

use async_trait::async_trait;
use common::{CoreError, CoreResult, with_deadline};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::IdentityProvider;

/// Identity provider configuration
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Base URL of the provider REST API
    pub base_url: String,
    /// Project API key passed as the `key` query parameter
    pub api_key: String,
    /// Optional bearer token for admin lookups
    pub admin_token: Option<String>,
    /// Upper bound for a single provider call, in seconds
    pub timeout_secs: u64,
}

impl IdentityConfig {
    /// Create a new IdentityConfig from environment variables
    ///
    /// # Environment Variables
    /// - `IDENTITY_API_KEY`: Provider API key (required)
    /// - `IDENTITY_BASE_URL`: Provider base URL (default: "https://identitytoolkit.googleapis.com")
    /// - `IDENTITY_ADMIN_TOKEN`: Bearer token used for account lookups (optional;
    ///   without it the provider rejects `identity_exists`, and the token
    ///   expires, so it must be refreshed by the deployment)
    /// - `IDENTITY_TIMEOUT_SECS`: Per-call timeout in seconds (default: 10)
    pub fn from_env() -> Result<Self, String> {
        let api_key = std::env::var("IDENTITY_API_KEY")
            .map_err(|_| "IDENTITY_API_KEY environment variable not set".to_string())?;

        let base_url = std::env::var("IDENTITY_BASE_URL")
            .unwrap_or_else(|_| "https://identitytoolkit.googleapis.com".to_string());

        let admin_token = std::env::var("IDENTITY_ADMIN_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());

        let timeout_secs = std::env::var("IDENTITY_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        Ok(IdentityConfig {
            base_url,
            api_key,
            admin_token,
            timeout_secs,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    local_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    local_id: [&'a str; 1],
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    error: ProviderError,
}

#[derive(Deserialize)]
struct ProviderError {
    message: String,
}

/// Extract the provider error code from an error response body
///
/// Codes arrive as `"WEAK_PASSWORD : Password should be at least 6 characters"`;
/// only the part before the colon is the code.
fn provider_error_code(body: &str) -> Option<String> {
    let parsed: ProviderErrorBody = serde_json::from_str(body).ok()?;
    let code = parsed.error.message.split(':').next()?.trim().to_string();
    if code.is_empty() { None } else { Some(code) }
}

/// Translate a failed provider response into the core taxonomy
pub fn map_provider_error(status: StatusCode, body: &str) -> CoreError {
    let code = provider_error_code(body);

    match code.as_deref() {
        Some("EMAIL_EXISTS") => CoreError::DuplicateIdentity("User already exists".to_string()),
        Some("INVALID_EMAIL") | Some("MISSING_EMAIL") => {
            CoreError::validation("Invalid email address")
        }
        Some("WEAK_PASSWORD") | Some("MISSING_PASSWORD") | Some("INVALID_PASSWORD") => {
            CoreError::validation("Password rejected by identity provider")
        }
        Some(other) => CoreError::upstream(format!(
            "Identity provider returned {} ({})",
            status.as_u16(),
            other
        )),
        None => CoreError::upstream(format!(
            "Identity provider returned {}",
            status.as_u16()
        )),
    }
}

/// Identity provider client over HTTP
#[derive(Clone)]
pub struct HttpIdentityProvider {
    client: Client,
    config: IdentityConfig,
}

impl HttpIdentityProvider {
    /// Build the provider client once at start-up
    pub fn new(config: IdentityConfig) -> CoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::internal(format!("Failed to build HTTP client: {}", e)))?;

        info!("Identity provider client initialized for {}", config.base_url);
        Ok(Self { client, config })
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1/accounts:{}?key={}",
            self.config.base_url.trim_end_matches('/'),
            method,
            self.config.api_key
        )
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn sign_up(&self, email: &str, password: &str) -> CoreResult<String> {
        let response = self
            .client
            .post(self.endpoint("signUp"))
            .json(&SignUpRequest {
                email,
                password,
                return_secure_token: false,
            })
            .send()
            .await
            .map_err(|e| CoreError::upstream(format!("Identity provider unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = map_provider_error(status, &body);
            warn!("Identity provider rejected sign-up for {}: {}", email, err);
            return Err(err);
        }

        let body: SignUpResponse = response.json().await.map_err(|e| {
            CoreError::upstream(format!("Malformed identity provider response: {}", e))
        })?;

        Ok(body.local_id)
    }

    async fn lookup(&self, identity_id: &str) -> CoreResult<bool> {
        let mut request = self
            .client
            .post(self.endpoint("lookup"))
            .json(&LookupRequest {
                local_id: [identity_id],
            });

        if let Some(token) = &self.config.admin_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CoreError::upstream(format!("Identity provider unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if provider_error_code(&body).as_deref() == Some("USER_NOT_FOUND") {
                return Ok(false);
            }
            return Err(map_provider_error(status, &body));
        }

        let body: LookupResponse = response.json().await.map_err(|e| {
            CoreError::upstream(format!("Malformed identity provider response: {}", e))
        })?;

        Ok(!body.users.is_empty())
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn create_account(&self, email: &str, password: &str) -> CoreResult<String> {
        info!("Creating identity for {}", email);

        let identity_id =
            with_deadline(self.deadline(), "Identity sign-up", self.sign_up(email, password))
                .await?;

        info!("Identity created: {}", identity_id);
        Ok(identity_id)
    }

    async fn identity_exists(&self, identity_id: &str) -> CoreResult<bool> {
        with_deadline(self.deadline(), "Identity lookup", self.lookup(identity_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ErrorKind;
    use serial_test::serial;

    fn error_body(message: &str) -> String {
        serde_json::json!({
            "error": { "code": 400, "message": message }
        })
        .to_string()
    }

    #[test]
    fn test_email_exists_is_duplicate() {
        let err = map_provider_error(StatusCode::BAD_REQUEST, &error_body("EMAIL_EXISTS"));
        assert_eq!(err.kind(), ErrorKind::DuplicateIdentity);
    }

    #[test]
    fn test_weak_password_is_validation() {
        let err = map_provider_error(
            StatusCode::BAD_REQUEST,
            &error_body("WEAK_PASSWORD : Password should be at least 6 characters"),
        );
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);

        let err = map_provider_error(StatusCode::BAD_REQUEST, &error_body("INVALID_EMAIL"));
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    #[test]
    fn test_unknown_codes_are_upstream() {
        let err = map_provider_error(
            StatusCode::BAD_REQUEST,
            &error_body("TOO_MANY_ATTEMPTS_TRY_LATER"),
        );
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert!(err.to_string().contains("TOO_MANY_ATTEMPTS_TRY_LATER"));

        let err = map_provider_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_endpoint_format() {
        let provider = HttpIdentityProvider::new(IdentityConfig {
            base_url: "http://localhost:9099/".to_string(),
            api_key: "test-key".to_string(),
            admin_token: None,
            timeout_secs: 1,
        })
        .unwrap();

        assert_eq!(
            provider.endpoint("signUp"),
            "http://localhost:9099/v1/accounts:signUp?key=test-key"
        );
    }

    #[test]
    #[serial]
    fn test_identity_config_from_env() {
        unsafe {
            std::env::remove_var("IDENTITY_API_KEY");
        }
        assert!(IdentityConfig::from_env().is_err());

        unsafe {
            std::env::set_var("IDENTITY_API_KEY", "abc");
            std::env::set_var("IDENTITY_TIMEOUT_SECS", "3");
            std::env::set_var("IDENTITY_ADMIN_TOKEN", "");
        }

        let config = IdentityConfig::from_env().unwrap();
        assert_eq!(config.api_key, "abc");
        assert_eq!(config.base_url, "https://identitytoolkit.googleapis.com");
        assert_eq!(config.timeout_secs, 3);
        assert!(config.admin_token.is_none());

        unsafe {
            std::env::remove_var("IDENTITY_API_KEY");
            std::env::remove_var("IDENTITY_TIMEOUT_SECS");
            std::env::remove_var("IDENTITY_ADMIN_TOKEN");
        }
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_upstream() {
        // Nothing listens on port 9 locally
        let provider = HttpIdentityProvider::new(IdentityConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: "test-key".to_string(),
            admin_token: None,
            timeout_secs: 2,
        })
        .unwrap();

        let err = provider
            .create_account("sam@example.com", "secret123")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    }
}
