//! Service configuration

use common::ConsistencyConfig;
use std::env;
use std::time::Duration;

/// HTTP service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// Largest accepted request body, in bytes
    pub max_upload_bytes: usize,
    /// Upper bound for a single document store call, in seconds
    pub upstream_timeout_secs: u64,
    /// Cleanup policy per operation
    pub consistency: ConsistencyConfig,
    /// Check post owners against the identity provider
    pub verify_post_owners: bool,
    /// Browser origins allowed to call the API; `*` allows any
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    /// Create a new AppConfig from environment variables
    ///
    /// # Environment Variables
    /// - `BIND_ADDRESS`: Listen address (default: "0.0.0.0:5000")
    /// - `MAX_UPLOAD_BYTES`: Request body limit (default: 10 MiB)
    /// - `UPSTREAM_TIMEOUT_SECS`: Document store call timeout (default: 10)
    /// - `PHOTO_REPLACE_CLEANUP`, `PHOTO_REMOVE_CLEANUP`, `POST_DELETE_CLEANUP`:
    ///   `strict` or `best-effort` (default: best-effort)
    /// - `VERIFY_POST_OWNERS`: Look up post owners before creating a post;
    ///   needs `IDENTITY_ADMIN_TOKEN` (default: false)
    /// - `CORS_ALLOWED_ORIGINS`: Comma-separated origins (default: "*")
    pub fn from_env() -> Result<Self, String> {
        let bind_address =
            env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:5000".to_string());

        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| (10 * 1024 * 1024).to_string())
            .parse()
            .map_err(|_| "MAX_UPLOAD_BYTES must be a number of bytes".to_string())?;

        let upstream_timeout_secs = env::var("UPSTREAM_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let consistency = ConsistencyConfig::from_env()?;

        let verify_post_owners = env::var("VERIFY_POST_OWNERS")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .map_err(|_| "VERIFY_POST_OWNERS must be true or false".to_string())?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(AppConfig {
            bind_address,
            max_upload_bytes,
            upstream_timeout_secs,
            consistency,
            verify_post_owners,
            cors_allowed_origins,
        })
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}
