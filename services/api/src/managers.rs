//! Record managers
//!
//! Each mutating operation touches at least two of the identity provider,
//! the blob store and the document store. The managers fix the order of
//! those calls and the compensating deletes that run when a later step
//! fails. Which blob cleanup failures block an operation is decided by the
//! [`ConsistencyConfig`](common::ConsistencyConfig) they are built with.

use blob_store::BlobStore;
use futures::future::join_all;
use tracing::warn;

pub mod post;
pub mod profile;

pub use post::PostManager;
pub use profile::ProfileManager;

/// Delete a blob that is no longer referenced; failures are only logged
pub(crate) async fn release_blob(blobs: &dyn BlobStore, url: &str, context: &str) {
    if let Err(e) = blobs.delete(url).await {
        warn!("Orphaned blob {} ({}): {}", url, context, e);
    }
}

/// Release several blobs concurrently; failures are only logged
pub(crate) async fn release_blobs(blobs: &dyn BlobStore, urls: &[String], context: &str) {
    let (_, failed) = delete_blobs(blobs, urls).await;
    for (url, e) in failed {
        warn!("Orphaned blob {} ({}): {}", url, context, e);
    }
}

/// Delete blobs concurrently, returning the URLs that are gone and the ones that failed
pub(crate) async fn delete_blobs(
    blobs: &dyn BlobStore,
    urls: &[String],
) -> (Vec<String>, Vec<(String, common::CoreError)>) {
    let results = join_all(urls.iter().map(|url| blobs.delete(url))).await;

    let mut deleted = Vec::new();
    let mut failed = Vec::new();
    for (url, result) in urls.iter().zip(results) {
        match result {
            Ok(()) => deleted.push(url.clone()),
            Err(e) => failed.push((url.clone(), e)),
        }
    }
    (deleted, failed)
}
