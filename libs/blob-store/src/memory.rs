//! In-process blob store for tests and local runs

use async_trait::async_trait;
use common::{CoreError, CoreResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::{BlobKind, BlobStore, object_name, object_name_from_url, public_url};

const MEMORY_BASE_URL: &str = "memory://blobs";

#[derive(Debug, Clone)]
struct StoredBlob {
    bytes: Vec<u8>,
    content_type: String,
}

/// Blob store that keeps objects in a map
///
/// Failures can be injected per call type, or for uploads whose name hint
/// contains a given marker.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, StoredBlob>>,
    fail_uploads: AtomicBool,
    fail_deletes: AtomicBool,
    failing_hints: Mutex<Vec<String>>,
    failing_deletes: Mutex<Vec<String>>,
    uploads: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Fail uploads whose name hint contains `marker`
    pub fn fail_uploads_named(&self, marker: &str) {
        if let Ok(mut hints) = self.failing_hints.lock() {
            hints.push(marker.to_string());
        }
    }

    /// Fail deletes of objects whose name contains `marker`
    pub fn fail_deletes_named(&self, marker: &str) {
        if let Ok(mut markers) = self.failing_deletes.lock() {
            markers.push(marker.to_string());
        }
    }

    /// Drop every injected failure
    pub fn clear_failures(&self) {
        self.set_fail_uploads(false);
        self.set_fail_deletes(false);
        for markers in [&self.failing_hints, &self.failing_deletes] {
            if let Ok(mut markers) = markers.lock() {
                markers.clear();
            }
        }
    }

    /// Whether the object behind `url` is stored
    pub fn contains(&self, url: &str) -> bool {
        match object_name_from_url(MEMORY_BASE_URL, url) {
            Some(name) => self
                .objects
                .lock()
                .map(|objects| objects.contains_key(&name))
                .unwrap_or(false),
            None => false,
        }
    }

    /// Content type the object behind `url` was stored with
    pub fn content_type(&self, url: &str) -> Option<String> {
        let name = object_name_from_url(MEMORY_BASE_URL, url)?;
        let objects = self.objects.lock().ok()?;
        objects.get(&name).map(|blob| blob.content_type.clone())
    }

    /// Size of the object behind `url`
    pub fn size(&self, url: &str) -> Option<usize> {
        let name = object_name_from_url(MEMORY_BASE_URL, url)?;
        let objects = self.objects.lock().ok()?;
        objects.get(&name).map(|blob| blob.bytes.len())
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Successful uploads so far
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Delete calls so far, including failed ones
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn objects(&self) -> CoreResult<MutexGuard<'_, HashMap<String, StoredBlob>>> {
        self.objects
            .lock()
            .map_err(|_| CoreError::internal("Blob table poisoned"))
    }

    fn upload_fails(&self, name_hint: &str) -> bool {
        self.fail_uploads.load(Ordering::SeqCst) || matches_marker(&self.failing_hints, name_hint)
    }

    fn delete_fails(&self, name: &str) -> bool {
        self.fail_deletes.load(Ordering::SeqCst) || matches_marker(&self.failing_deletes, name)
    }
}

fn matches_marker(markers: &Mutex<Vec<String>>, name: &str) -> bool {
    markers
        .lock()
        .map(|markers| markers.iter().any(|marker| name.contains(marker.as_str())))
        .unwrap_or(false)
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        kind: BlobKind,
        bytes: Vec<u8>,
        content_type: &str,
        name_hint: &str,
    ) -> CoreResult<String> {
        // Give concurrent uploads a chance to interleave
        tokio::task::yield_now().await;

        if self.upload_fails(name_hint) {
            return Err(CoreError::upstream(format!(
                "Blob store upload failed for {}",
                name_hint
            )));
        }

        let name = object_name(kind, name_hint);
        self.objects()?.insert(
            name.clone(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        self.uploads.fetch_add(1, Ordering::SeqCst);

        Ok(public_url(MEMORY_BASE_URL, &name))
    }

    async fn delete(&self, url: &str) -> CoreResult<()> {
        tokio::task::yield_now().await;
        self.deletes.fetch_add(1, Ordering::SeqCst);

        let name = object_name_from_url(MEMORY_BASE_URL, url).ok_or_else(|| {
            CoreError::validation(format!("URL is not managed by this blob store: {}", url))
        })?;

        if self.delete_fails(&name) {
            return Err(CoreError::upstream(format!(
                "Blob store delete failed for {}",
                name
            )));
        }

        self.objects()?.remove(&name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ErrorKind;

    #[tokio::test]
    async fn test_upload_then_delete_is_idempotent() {
        let store = MemoryBlobStore::new();

        let url = store
            .upload(BlobKind::PostImage, vec![1, 2, 3], "image/png", "key.png")
            .await
            .unwrap();
        assert!(store.contains(&url));
        assert_eq!(store.content_type(&url).as_deref(), Some("image/png"));
        assert_eq!(store.size(&url), Some(3));

        store.delete(&url).await.unwrap();
        assert!(!store.contains(&url));

        // Already gone
        store.delete(&url).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryBlobStore::new();
        store.fail_uploads_named("broken");

        let err = store
            .upload(BlobKind::PostImage, vec![0], "image/jpeg", "broken.jpg")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);

        let url = store
            .upload(BlobKind::PostImage, vec![0], "image/jpeg", "fine.jpg")
            .await
            .unwrap();

        store.set_fail_deletes(true);
        let err = store.delete(&url).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert!(store.contains(&url));

        let err = store.delete("https://elsewhere/x.jpg").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);

        store.clear_failures();
        store.fail_deletes_named("fine");
        assert!(store.delete(&url).await.is_err());
        store.clear_failures();
        store.delete(&url).await.unwrap();
        assert!(store.is_empty());
    }
}
