//! Profile record manager

use blob_store::{BlobKind, BlobStore};
use common::{CleanupPolicy, ConsistencyConfig, CoreError, CoreResult};
use identity::IdentityProvider;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::release_blob;
use crate::models::{ImageUpload, NewUser, Registration, User};
use crate::repositories::UserRepository;
use crate::validation::{validate_registration, validate_required};

/// Owns user records and their profile photos
#[derive(Clone)]
pub struct ProfileManager {
    identity: Arc<dyn IdentityProvider>,
    blobs: Arc<dyn BlobStore>,
    users: Arc<dyn UserRepository>,
    consistency: ConsistencyConfig,
}

impl ProfileManager {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        blobs: Arc<dyn BlobStore>,
        users: Arc<dyn UserRepository>,
        consistency: ConsistencyConfig,
    ) -> Self {
        Self {
            identity,
            blobs,
            users,
            consistency,
        }
    }

    /// Create the identity, store the optional photo, then write the user record
    ///
    /// A failure after the identity exists leaves that identity without a
    /// record; it is logged since identities cannot be deleted from here.
    pub async fn register(
        &self,
        registration: Registration,
        photo: Option<ImageUpload>,
    ) -> CoreResult<User> {
        validate_registration(&registration)?;
        let email = registration.email.trim().to_string();

        let identity_id = self
            .identity
            .create_account(&email, &registration.password)
            .await?;
        info!("Registered identity {} for {}", identity_id, email);

        let profile_photo_url = match photo {
            Some(photo) => match self.upload_photo(photo).await {
                Ok(url) => Some(url),
                Err(e) => {
                    error!("Identity {} has no user record: photo upload failed: {}", identity_id, e);
                    return Err(e);
                }
            },
            None => None,
        };

        let new_user = NewUser {
            identity_id: identity_id.clone(),
            email,
            name: registration.name.trim().to_string(),
            contact_number: registration.contact_number.trim().to_string(),
            hostel_name: registration.hostel_name.trim().to_string(),
            profile_photo_url,
        };

        match self.users.insert(&new_user).await {
            Ok(user) => Ok(user),
            Err(e) => {
                error!("Identity {} has no user record: store write failed: {}", identity_id, e);
                if let Some(url) = &new_user.profile_photo_url {
                    release_blob(self.blobs.as_ref(), url, "registration rollback").await;
                }
                Err(e)
            }
        }
    }

    pub async fn get_by_identity(&self, identity_id: &str) -> CoreResult<User> {
        validate_required("identityId", identity_id)?;
        self.users
            .find_by_identity(identity_id)
            .await?
            .ok_or_else(|| CoreError::not_found("User not found"))
    }

    /// Swap the profile photo and return the new URL
    ///
    /// The photo currently stored on the record is what gets deleted;
    /// `previous_url` is only compared against it.
    pub async fn replace_photo(
        &self,
        identity_id: &str,
        photo: ImageUpload,
        previous_url: Option<&str>,
    ) -> CoreResult<String> {
        if photo.bytes.is_empty() {
            return Err(CoreError::validation("Profile photo is required"));
        }

        let user = self.get_by_identity(identity_id).await?;
        let old_url = cleanup_target(&user, previous_url);
        let new_url = self.upload_photo(photo).await?;

        match self.consistency.photo_replace {
            CleanupPolicy::BestEffort => {
                self.point_record_at(identity_id, Some(&new_url)).await?;
                if let Some(old_url) = old_url.filter(|old| *old != new_url) {
                    release_blob(self.blobs.as_ref(), &old_url, "replaced profile photo").await;
                }
            }
            CleanupPolicy::Strict => {
                if let Some(old_url) = &old_url {
                    if let Err(e) = self.blobs.delete(old_url).await {
                        warn!("Keeping old photo of {}: delete failed: {}", identity_id, e);
                        release_blob(self.blobs.as_ref(), &new_url, "photo replacement rollback")
                            .await;
                        return Err(CoreError::upstream(format!(
                            "Previous profile photo could not be deleted: {}",
                            e
                        )));
                    }
                }
                self.point_record_at(identity_id, Some(&new_url)).await?;
            }
        }

        info!("Profile photo of {} is now {}", identity_id, new_url);
        Ok(new_url)
    }

    /// Delete the profile photo and clear it on the record
    pub async fn remove_photo(&self, identity_id: &str, current_url: &str) -> CoreResult<()> {
        validate_required("currentUrl", current_url)?;

        let user = self.get_by_identity(identity_id).await?;
        if let Some(url) = cleanup_target(&user, Some(current_url)) {
            if let Err(e) = self.blobs.delete(&url).await {
                if self.consistency.photo_remove.is_strict() {
                    warn!("Profile photo of {} kept: delete failed: {}", identity_id, e);
                    return Err(e);
                }
                warn!("Orphaned blob {} (removed profile photo): {}", url, e);
            }
        }

        self.users
            .set_profile_photo(identity_id, None)
            .await?
            .ok_or_else(|| CoreError::not_found("User not found"))?;

        info!("Profile photo of {} removed", identity_id);
        Ok(())
    }

    pub async fn update_hostel(&self, identity_id: &str, hostel_name: &str) -> CoreResult<User> {
        validate_required("identityId", identity_id)?;
        validate_required("hostelName", hostel_name)?;

        self.users
            .set_hostel(identity_id, hostel_name.trim())
            .await?
            .ok_or_else(|| CoreError::not_found("User not found"))
    }

    pub async fn append_survey(&self, identity_id: &str, response: &str) -> CoreResult<()> {
        validate_required("identityId", identity_id)?;
        validate_required("response", response)?;

        if !self
            .users
            .append_survey_response(identity_id, response.trim())
            .await?
        {
            return Err(CoreError::not_found("User not found"));
        }
        Ok(())
    }

    async fn upload_photo(&self, photo: ImageUpload) -> CoreResult<String> {
        let ImageUpload {
            bytes,
            content_type,
            file_name,
        } = photo;
        self.blobs
            .upload(BlobKind::ProfilePhoto, bytes, &content_type, &file_name)
            .await
    }

    /// Write the new photo URL; on failure the fresh blob is released
    async fn point_record_at(&self, identity_id: &str, url: Option<&str>) -> CoreResult<()> {
        let result = self
            .users
            .set_profile_photo(identity_id, url)
            .await
            .and_then(|user| user.map(|_| ()).ok_or_else(|| CoreError::not_found("User not found")));

        if let (Err(e), Some(url)) = (&result, url) {
            warn!("Photo record update for {} failed: {}", identity_id, e);
            release_blob(self.blobs.as_ref(), url, "photo replacement rollback").await;
        }
        result
    }
}

/// The stored photo URL, warning when the caller's view of it differs
fn cleanup_target(user: &User, hint: Option<&str>) -> Option<String> {
    let hint = hint.map(str::trim).filter(|hint| !hint.is_empty());
    match (&user.profile_photo_url, hint) {
        (Some(stored), Some(hint)) if stored != hint => {
            warn!(
                "Photo URL {} sent for {} does not match stored {}",
                hint, user.identity_id, stored
            );
            Some(stored.clone())
        }
        (None, Some(hint)) => {
            warn!(
                "Photo URL {} sent for {} but no photo is stored",
                hint, user.identity_id
            );
            None
        }
        (stored, _) => stored.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryUserRepository;
    use blob_store::MemoryBlobStore;
    use common::ErrorKind;
    use identity::MemoryIdentityProvider;

    struct Harness {
        identity: Arc<MemoryIdentityProvider>,
        blobs: Arc<MemoryBlobStore>,
        users: Arc<MemoryUserRepository>,
        manager: ProfileManager,
    }

    fn harness(policy: CleanupPolicy) -> Harness {
        let identity = Arc::new(MemoryIdentityProvider::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let users = Arc::new(MemoryUserRepository::new());
        let manager = ProfileManager::new(
            identity.clone(),
            blobs.clone(),
            users.clone(),
            ConsistencyConfig::uniform(policy),
        );
        Harness {
            identity,
            blobs,
            users,
            manager,
        }
    }

    fn registration(email: &str) -> Registration {
        Registration {
            email: email.to_string(),
            password: "secret123".to_string(),
            name: "Sam".to_string(),
            contact_number: "+15550001".to_string(),
            hostel_name: "North".to_string(),
        }
    }

    fn photo(name: &str) -> ImageUpload {
        ImageUpload::new(vec![0xFF, 0xD8, 0xFF], "image/jpeg", name)
    }

    #[tokio::test]
    async fn test_register_without_photo() {
        let h = harness(CleanupPolicy::BestEffort);

        let user = h
            .manager
            .register(registration("sam@example.com"), None)
            .await
            .unwrap();

        assert!(user.profile_photo_url.is_none());
        assert!(user.survey_responses.is_empty());
        let stored = h.manager.get_by_identity(&user.identity_id).await.unwrap();
        assert_eq!(stored, user);
    }

    #[tokio::test]
    async fn test_register_with_photo_stores_blob_url() {
        let h = harness(CleanupPolicy::BestEffort);

        let user = h
            .manager
            .register(registration("sam@example.com"), Some(photo("me.jpg")))
            .await
            .unwrap();

        let url = user.profile_photo_url.unwrap();
        assert!(h.blobs.contains(&url));
        assert!(url.contains("profile-photos/"));
    }

    #[tokio::test]
    async fn test_duplicate_registration_writes_nothing() {
        let h = harness(CleanupPolicy::BestEffort);
        h.manager
            .register(registration("sam@example.com"), None)
            .await
            .unwrap();

        let err = h
            .manager
            .register(registration("sam@example.com"), Some(photo("me.jpg")))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DuplicateIdentity);
        assert_eq!(h.users.len(), 1);
        assert_eq!(h.blobs.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_registration_makes_no_external_call() {
        let h = harness(CleanupPolicy::BestEffort);

        let err = h
            .manager
            .register(registration("not-an-email"), Some(photo("me.jpg")))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert_eq!(h.identity.created_count(), 0);
        assert_eq!(h.blobs.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_releases_uploaded_photo() {
        let h = harness(CleanupPolicy::BestEffort);
        h.users.set_fail_writes(true);

        let err = h
            .manager
            .register(registration("sam@example.com"), Some(photo("me.jpg")))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert_eq!(h.blobs.upload_count(), 1);
        assert!(h.blobs.is_empty());
    }

    #[tokio::test]
    async fn test_replace_photo_survives_failed_old_delete() {
        let h = harness(CleanupPolicy::BestEffort);
        let user = h
            .manager
            .register(registration("sam@example.com"), Some(photo("old.jpg")))
            .await
            .unwrap();
        let old_url = user.profile_photo_url.unwrap();

        h.blobs.set_fail_deletes(true);
        let new_url = h
            .manager
            .replace_photo(&user.identity_id, photo("new.jpg"), Some(&old_url))
            .await
            .unwrap();

        let stored = h.manager.get_by_identity(&user.identity_id).await.unwrap();
        assert_eq!(stored.profile_photo_url.as_deref(), Some(new_url.as_str()));
        assert!(h.blobs.contains(&old_url));
    }

    #[tokio::test]
    async fn test_replace_photo_deletes_stored_photo_not_hint() {
        let h = harness(CleanupPolicy::BestEffort);
        let victim = h
            .manager
            .register(registration("victim@example.com"), Some(photo("v.jpg")))
            .await
            .unwrap();
        let victim_url = victim.profile_photo_url.unwrap();
        let user = h
            .manager
            .register(registration("sam@example.com"), Some(photo("old.jpg")))
            .await
            .unwrap();
        let old_url = user.profile_photo_url.unwrap();

        h.manager
            .replace_photo(&user.identity_id, photo("new.jpg"), Some(&victim_url))
            .await
            .unwrap();

        assert!(h.blobs.contains(&victim_url));
        assert!(!h.blobs.contains(&old_url));
    }

    #[tokio::test]
    async fn test_strict_replace_keeps_record_when_old_delete_fails() {
        let h = harness(CleanupPolicy::Strict);
        let user = h
            .manager
            .register(registration("sam@example.com"), Some(photo("old.jpg")))
            .await
            .unwrap();
        let old_url = user.profile_photo_url.unwrap();

        h.blobs.set_fail_deletes(true);
        let err = h
            .manager
            .replace_photo(&user.identity_id, photo("new.jpg"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);

        let stored = h.manager.get_by_identity(&user.identity_id).await.unwrap();
        assert_eq!(stored.profile_photo_url.as_deref(), Some(old_url.as_str()));

        h.blobs.set_fail_deletes(false);
        let new_url = h
            .manager
            .replace_photo(&user.identity_id, photo("new.jpg"), None)
            .await
            .unwrap();
        assert!(!h.blobs.contains(&old_url));
        assert!(h.blobs.contains(&new_url));
    }

    #[tokio::test]
    async fn test_replace_photo_for_unknown_user_uploads_nothing() {
        let h = harness(CleanupPolicy::BestEffort);

        let err = h
            .manager
            .replace_photo("ghost", photo("new.jpg"), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(h.blobs.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_photo_best_effort_always_clears() {
        let h = harness(CleanupPolicy::BestEffort);
        let user = h
            .manager
            .register(registration("sam@example.com"), Some(photo("me.jpg")))
            .await
            .unwrap();
        let url = user.profile_photo_url.unwrap();

        h.blobs.set_fail_deletes(true);
        h.manager.remove_photo(&user.identity_id, &url).await.unwrap();
        let stored = h.manager.get_by_identity(&user.identity_id).await.unwrap();
        assert!(stored.profile_photo_url.is_none());

        assert_eq!(h.blobs.delete_count(), 1);

        // Nothing stored any more; succeeds without touching the blob store
        h.manager.remove_photo(&user.identity_id, &url).await.unwrap();
        assert_eq!(h.blobs.delete_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_photo_strict_aborts_on_delete_failure() {
        let h = harness(CleanupPolicy::Strict);
        let user = h
            .manager
            .register(registration("sam@example.com"), Some(photo("me.jpg")))
            .await
            .unwrap();
        let url = user.profile_photo_url.unwrap();

        h.blobs.set_fail_deletes(true);
        let err = h
            .manager
            .remove_photo(&user.identity_id, &url)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);

        let stored = h.manager.get_by_identity(&user.identity_id).await.unwrap();
        assert_eq!(stored.profile_photo_url.as_deref(), Some(url.as_str()));
    }

    #[tokio::test]
    async fn test_remove_photo_validation_and_missing_user() {
        let h = harness(CleanupPolicy::BestEffort);

        let err = h.manager.remove_photo("u1", " ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);

        let err = h
            .manager
            .remove_photo("ghost", "memory://blobs/x.jpg")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_hostel_and_survey() {
        let h = harness(CleanupPolicy::BestEffort);
        let user = h
            .manager
            .register(registration("sam@example.com"), None)
            .await
            .unwrap();

        let updated = h
            .manager
            .update_hostel(&user.identity_id, "South")
            .await
            .unwrap();
        assert_eq!(updated.hostel_name, "South");

        h.manager
            .append_survey(&user.identity_id, "More lights")
            .await
            .unwrap();
        h.manager
            .append_survey(&user.identity_id, "Bigger board")
            .await
            .unwrap();
        let stored = h.manager.get_by_identity(&user.identity_id).await.unwrap();
        assert_eq!(stored.survey_responses, vec!["More lights", "Bigger board"]);

        let err = h.manager.update_hostel(&user.identity_id, "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        let err = h.manager.append_survey("ghost", "hi").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
