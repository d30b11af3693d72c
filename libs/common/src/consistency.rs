//! Ordering and cleanup rules shared by the record managers
//!
//! Every call that leaves the process goes through [`with_deadline`], and
//! every asset cleanup step is governed by a named [`CleanupPolicy`].

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::error::{CoreError, CoreResult};

/// How an operation treats a failed asset cleanup step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupPolicy {
    /// Cleanup failure aborts the operation and the record is left as it was
    Strict,
    /// Cleanup failure is logged and the record mutation still happens
    #[default]
    BestEffort,
}

impl CleanupPolicy {
    pub fn is_strict(&self) -> bool {
        matches!(self, CleanupPolicy::Strict)
    }
}

impl FromStr for CleanupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(CleanupPolicy::Strict),
            "best-effort" | "best_effort" | "besteffort" => Ok(CleanupPolicy::BestEffort),
            other => Err(format!("Unknown cleanup policy: {}", other)),
        }
    }
}

impl fmt::Display for CleanupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupPolicy::Strict => f.write_str("strict"),
            CleanupPolicy::BestEffort => f.write_str("best-effort"),
        }
    }
}

/// Cleanup policy for each operation that releases assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConsistencyConfig {
    /// Deleting the previous photo after a replacement
    pub photo_replace: CleanupPolicy,
    /// Deleting the photo on explicit removal
    pub photo_remove: CleanupPolicy,
    /// Deleting the images of a post being deleted
    pub post_delete: CleanupPolicy,
}

impl ConsistencyConfig {
    /// Create a new ConsistencyConfig from environment variables
    ///
    /// # Environment Variables
    /// - `PHOTO_REPLACE_CLEANUP`: `strict` or `best-effort` (default: best-effort)
    /// - `PHOTO_REMOVE_CLEANUP`: `strict` or `best-effort` (default: best-effort)
    /// - `POST_DELETE_CLEANUP`: `strict` or `best-effort` (default: best-effort)
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            photo_replace: policy_from_env("PHOTO_REPLACE_CLEANUP")?,
            photo_remove: policy_from_env("PHOTO_REMOVE_CLEANUP")?,
            post_delete: policy_from_env("POST_DELETE_CLEANUP")?,
        })
    }

    /// Same policy for every operation
    pub fn uniform(policy: CleanupPolicy) -> Self {
        Self {
            photo_replace: policy,
            photo_remove: policy,
            post_delete: policy,
        }
    }
}

fn policy_from_env(var: &str) -> Result<CleanupPolicy, String> {
    match std::env::var(var) {
        Ok(value) => value
            .parse()
            .map_err(|e: String| format!("{}: {}", var, e)),
        Err(_) => Ok(CleanupPolicy::default()),
    }
}

/// Run an upstream call with a bounded wait
///
/// An elapsed deadline is reported as `UpstreamUnavailable`, so no store or
/// provider call can hang a request.
pub async fn with_deadline<T, F>(limit: Duration, what: &str, fut: F) -> CoreResult<T>
where
    F: Future<Output = CoreResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{} timed out after {:?}", what, limit);
            Err(CoreError::upstream(format!(
                "{} timed out after {}s",
                what,
                limit.as_secs_f32()
            )))
        }
    }
}
