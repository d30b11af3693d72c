//! Post record manager

use blob_store::{BlobKind, BlobStore};
use common::{CleanupPolicy, ConsistencyConfig, CoreError, CoreResult};
use futures::future::join_all;
use identity::IdentityProvider;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{delete_blobs, release_blobs};
use crate::models::{
    Caller, Comment, ImageUpload, NewComment, NewPost, Post, PostPatch, PostType,
};
use crate::repositories::{CommentChange, PostRepository};
use crate::validation::{validate_comment, validate_patch, validate_required};

/// Fields of a post as submitted by its owner
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub owner_id: String,
    pub location: String,
    pub post_type: PostType,
    pub description: Option<String>,
}

/// Owns posts, their images and their comments
#[derive(Clone)]
pub struct PostManager {
    identity: Arc<dyn IdentityProvider>,
    blobs: Arc<dyn BlobStore>,
    posts: Arc<dyn PostRepository>,
    consistency: ConsistencyConfig,
    verify_owners: bool,
}

impl PostManager {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        blobs: Arc<dyn BlobStore>,
        posts: Arc<dyn PostRepository>,
        consistency: ConsistencyConfig,
    ) -> Self {
        Self {
            identity,
            blobs,
            posts,
            consistency,
            verify_owners: false,
        }
    }

    /// Reject posts whose owner the identity provider does not know
    ///
    /// Off by default; the lookup needs an admin credential on the provider.
    pub fn verify_owners(mut self, verify: bool) -> Self {
        self.verify_owners = verify;
        self
    }

    /// Upload every image, then write the post
    ///
    /// No post is written unless all images are stored. Images stored by a
    /// failed attempt are deleted again.
    pub async fn create(&self, draft: PostDraft, images: Vec<ImageUpload>) -> CoreResult<Post> {
        validate_required("ownerId", &draft.owner_id)?;
        validate_required("location", &draft.location)?;
        let owner_id = draft.owner_id.trim().to_string();

        if self.verify_owners && !self.identity.identity_exists(&owner_id).await? {
            return Err(CoreError::validation(format!("Unknown post owner {}", owner_id)));
        }

        let image_urls = self.upload_images(images).await?;

        let new_post = NewPost {
            owner_id,
            location: draft.location.trim().to_string(),
            post_type: draft.post_type,
            description: draft
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            image_urls,
        };

        match self.posts.insert(&new_post).await {
            Ok(post) => {
                info!(
                    "Created {} post {} with {} images",
                    post.post_type,
                    post.id,
                    post.image_urls.len()
                );
                Ok(post)
            }
            Err(e) => {
                error!("Post for {} not stored: {}", new_post.owner_id, e);
                release_blobs(self.blobs.as_ref(), &new_post.image_urls, "post creation rollback")
                    .await;
                Err(e)
            }
        }
    }

    pub async fn list_all(&self) -> CoreResult<Vec<Post>> {
        self.posts.list_all().await
    }

    pub async fn list_by_owner(&self, owner_id: &str) -> CoreResult<Vec<Post>> {
        validate_required("ownerId", owner_id)?;
        self.posts.list_by_owner(owner_id).await
    }

    pub async fn get(&self, post_id: Uuid) -> CoreResult<Post> {
        self.posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Post not found"))
    }

    /// Overwrite description, location or type; only the owner may
    pub async fn update_fields(
        &self,
        post_id: Uuid,
        caller: &Caller,
        patch: PostPatch,
    ) -> CoreResult<Post> {
        let patch = patch.trimmed();
        validate_patch(&patch)?;
        let post_type = patch.post_type()?;

        let post = self.get(post_id).await?;
        caller.ensure_is(&post.owner_id, "post")?;

        self.posts
            .update_fields(post_id, &patch, post_type)
            .await?
            .ok_or_else(|| CoreError::not_found("Post not found"))
    }

    /// Delete the post's images, then the post itself
    pub async fn delete(&self, post_id: Uuid, caller: &Caller) -> CoreResult<()> {
        let post = self.get(post_id).await?;
        caller.ensure_is(&post.owner_id, "post")?;

        let (deleted, failed) = delete_blobs(self.blobs.as_ref(), &post.image_urls).await;
        if !failed.is_empty() {
            for (url, e) in &failed {
                warn!("Image {} of post {} not deleted: {}", url, post_id, e);
            }

            if self.consistency.post_delete == CleanupPolicy::Strict {
                if !deleted.is_empty() {
                    self.posts.remove_image_urls(post_id, &deleted).await?;
                }
                return Err(CoreError::upstream(format!(
                    "{} of {} images of post {} could not be deleted",
                    failed.len(),
                    post.image_urls.len(),
                    post_id
                )));
            }
        }

        if !self.posts.delete(post_id).await? {
            return Err(CoreError::not_found("Post not found"));
        }

        info!("Deleted post {} ({} images removed)", post_id, deleted.len());
        Ok(())
    }

    /// Append a comment with a fresh id; returns the updated post
    pub async fn add_comment(&self, post_id: Uuid, comment: NewComment) -> CoreResult<Post> {
        validate_comment(&comment)?;
        let comment = NewComment {
            author_id: comment.author_id.trim().to_string(),
            author_name: comment.author_name.trim().to_string(),
            text: comment.text.trim().to_string(),
        };

        let post = self
            .posts
            .push_comment(post_id, &comment)
            .await?
            .ok_or_else(|| CoreError::not_found("Post not found"))?;

        info!("Comment by {} added to post {}", comment.author_id, post_id);
        Ok(post)
    }

    /// Replace the text of a comment; only its author may
    pub async fn update_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        caller: &Caller,
        text: &str,
    ) -> CoreResult<Comment> {
        validate_required("text", text)?;
        self.check_comment_author(post_id, comment_id, caller).await?;

        let comment = comment_result(
            self.posts
                .update_comment_text(post_id, comment_id, text.trim())
                .await?,
        )?;

        info!("Comment {} on post {} updated", comment_id, post_id);
        Ok(comment)
    }

    /// Remove a comment; only its author may
    pub async fn delete_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        caller: &Caller,
    ) -> CoreResult<()> {
        self.check_comment_author(post_id, comment_id, caller).await?;
        comment_result(self.posts.pull_comment(post_id, comment_id).await?)?;

        info!("Comment {} removed from post {}", comment_id, post_id);
        Ok(())
    }

    async fn check_comment_author(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        caller: &Caller,
    ) -> CoreResult<()> {
        let post = self.get(post_id).await?;
        let comment = post
            .comment(comment_id)
            .ok_or_else(|| CoreError::not_found("Comment not found"))?;
        caller.ensure_is(&comment.author_id, "comment")
    }

    /// Upload images concurrently; all or nothing
    async fn upload_images(&self, images: Vec<ImageUpload>) -> CoreResult<Vec<String>> {
        let uploads = images.into_iter().map(|image| {
            let blobs = self.blobs.clone();
            async move {
                let ImageUpload {
                    bytes,
                    content_type,
                    file_name,
                } = image;
                blobs
                    .upload(BlobKind::PostImage, bytes, &content_type, &file_name)
                    .await
            }
        });

        let mut urls = Vec::new();
        let mut first_error = None;
        for result in join_all(uploads).await {
            match result {
                Ok(url) => urls.push(url),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            None => Ok(urls),
            Some(e) => {
                warn!("Post image upload failed, releasing {} stored images: {}", urls.len(), e);
                release_blobs(self.blobs.as_ref(), &urls, "failed post upload").await;
                Err(CoreError::upstream(format!("Image upload failed: {}", e)))
            }
        }
    }
}

fn comment_result<T>(change: CommentChange<T>) -> CoreResult<T> {
    match change {
        CommentChange::Applied(value) => Ok(value),
        CommentChange::PostMissing => Err(CoreError::not_found("Post not found")),
        CommentChange::CommentMissing => Err(CoreError::not_found("Comment not found")),
    }
}
