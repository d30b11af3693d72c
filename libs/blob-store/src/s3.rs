//! S3-backed blob store

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client, error::DisplayErrorContext, primitives::ByteStream, types::ObjectCannedAcl,
};
use common::{CoreError, CoreResult, with_deadline};
use std::env;
use std::time::Duration;
use tracing::{info, warn};

use crate::{BlobKind, BlobStore, object_name, object_name_from_url, public_url};

/// S3 blob store configuration
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Bucket holding every image
    pub bucket: String,
    /// Base URL objects are publicly served from
    pub public_base_url: String,
    /// Mark uploaded objects `public-read`
    ///
    /// Buckets with object ownership enforced reject ACLs; they are made
    /// public through a bucket policy instead.
    pub public_acl: bool,
    /// Custom endpoint for S3-compatible stores
    pub endpoint_url: Option<String>,
    /// Upper bound for a single store call, in seconds
    pub timeout_secs: u64,
}

impl S3Config {
    /// Create a new S3Config from environment variables
    ///
    /// # Environment Variables
    /// - `BLOB_BUCKET`: Bucket name (default: "lost-found-media")
    /// - `BLOB_PUBLIC_BASE_URL`: Public base URL (default: "https://{bucket}.s3.amazonaws.com")
    /// - `BLOB_PUBLIC_ACL`: Set `public-read` on uploads (default: true)
    /// - `BLOB_ENDPOINT_URL`: Custom S3 endpoint, enables path-style addressing (optional)
    /// - `BLOB_TIMEOUT_SECS`: Per-call timeout in seconds (default: 30)
    pub fn from_env() -> Self {
        let bucket = env::var("BLOB_BUCKET").unwrap_or_else(|_| "lost-found-media".to_string());

        let public_base_url = env::var("BLOB_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("https://{}.s3.amazonaws.com", bucket));

        let public_acl = env::var("BLOB_PUBLIC_ACL")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let endpoint_url = env::var("BLOB_ENDPOINT_URL")
            .ok()
            .filter(|url| !url.is_empty());

        let timeout_secs = env::var("BLOB_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        S3Config {
            bucket,
            public_base_url,
            public_acl,
            endpoint_url,
            timeout_secs,
        }
    }
}

/// Blob store on an S3 bucket
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    config: S3Config,
}

impl S3BlobStore {
    pub fn new(client: Client, config: S3Config) -> Self {
        Self { client, config }
    }

    /// Build the S3 client from the ambient AWS configuration
    pub async fn connect(config: S3Config) -> Self {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;

        let client = match &config.endpoint_url {
            Some(endpoint) => {
                let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                    .endpoint_url(endpoint)
                    .force_path_style(true)
                    .build();
                Client::from_conf(s3_config)
            }
            None => Client::new(&sdk_config),
        };

        info!("S3 blob store initialized for bucket: {}", config.bucket);
        Self::new(client, config)
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Check that the bucket is reachable
    pub async fn health_check(&self) -> CoreResult<()> {
        with_deadline(self.deadline(), "Blob store health check", async {
            self.client
                .head_bucket()
                .bucket(&self.config.bucket)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| {
                    CoreError::upstream(format!(
                        "Bucket {} unreachable: {}",
                        self.config.bucket,
                        DisplayErrorContext(&e)
                    ))
                })
        })
        .await
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn upload(
        &self,
        kind: BlobKind,
        bytes: Vec<u8>,
        content_type: &str,
        name_hint: &str,
    ) -> CoreResult<String> {
        let name = object_name(kind, name_hint);
        info!("Uploading blob to S3: {} ({} bytes)", name, bytes.len());

        let mut request = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&name)
            .body(ByteStream::from(bytes))
            .content_type(content_type);

        if self.config.public_acl {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }

        with_deadline(self.deadline(), "Blob upload", async {
            request.send().await.map(|_| ()).map_err(|e| {
                error_for("upload", &name, DisplayErrorContext(&e).to_string())
            })
        })
        .await?;

        Ok(public_url(&self.config.public_base_url, &name))
    }

    async fn delete(&self, url: &str) -> CoreResult<()> {
        let name = object_name_from_url(&self.config.public_base_url, url).ok_or_else(|| {
            CoreError::validation(format!("URL is not managed by this blob store: {}", url))
        })?;

        info!("Deleting blob from S3: {}", name);

        with_deadline(self.deadline(), "Blob delete", async {
            match self
                .client
                .delete_object()
                .bucket(&self.config.bucket)
                .key(&name)
                .send()
                .await
            {
                Ok(_) => Ok(()),
                // S3 answers 204 for missing keys; compatible stores may answer 404
                Err(e) if e.raw_response().map(|r| r.status().as_u16()) == Some(404) => {
                    info!("Blob already absent: {}", name);
                    Ok(())
                }
                Err(e) => Err(error_for("delete", &name, DisplayErrorContext(&e).to_string())),
            }
        })
        .await
    }
}

fn error_for(action: &str, name: &str, detail: String) -> CoreError {
    warn!("S3 {} failed for {}: {}", action, name, detail);
    CoreError::upstream(format!("Blob store {} failed for {}", action, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_s3_config_defaults() {
        unsafe {
            env::remove_var("BLOB_BUCKET");
            env::remove_var("BLOB_PUBLIC_BASE_URL");
            env::remove_var("BLOB_PUBLIC_ACL");
            env::remove_var("BLOB_ENDPOINT_URL");
            env::remove_var("BLOB_TIMEOUT_SECS");
        }

        let config = S3Config::from_env();
        assert_eq!(config.bucket, "lost-found-media");
        assert_eq!(
            config.public_base_url,
            "https://lost-found-media.s3.amazonaws.com"
        );
        assert!(config.public_acl);
        assert!(config.endpoint_url.is_none());
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    #[serial]
    fn test_s3_config_custom_values() {
        unsafe {
            env::set_var("BLOB_BUCKET", "hostel-board");
            env::set_var("BLOB_PUBLIC_BASE_URL", "http://localhost:9000/hostel-board");
            env::set_var("BLOB_PUBLIC_ACL", "false");
            env::set_var("BLOB_ENDPOINT_URL", "http://localhost:9000");
        }

        let config = S3Config::from_env();
        assert_eq!(config.bucket, "hostel-board");
        assert_eq!(config.public_base_url, "http://localhost:9000/hostel-board");
        assert!(!config.public_acl);
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:9000"));

        unsafe {
            env::remove_var("BLOB_BUCKET");
            env::remove_var("BLOB_PUBLIC_BASE_URL");
            env::remove_var("BLOB_PUBLIC_ACL");
            env::remove_var("BLOB_ENDPOINT_URL");
        }
    }

    #[tokio::test]
    async fn test_foreign_url_delete_is_rejected_before_any_call() {
        let config = S3Config {
            bucket: "hostel-board".to_string(),
            public_base_url: "https://hostel-board.s3.amazonaws.com".to_string(),
            public_acl: true,
            endpoint_url: None,
            timeout_secs: 1,
        };
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .build();
        let store = S3BlobStore::new(Client::from_conf(s3_config), config);

        let err = store
            .delete("https://example.com/not-ours.jpg")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), common::ErrorKind::ValidationFailed);
    }
}
