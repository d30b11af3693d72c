//! Document store access
//!
//! Managers only see these traits. Every collection mutation (comments,
//! survey responses, image URL pruning) is a single store-side operation,
//! so concurrent writers never lose each other's updates.

use async_trait::async_trait;
use common::CoreResult;
use uuid::Uuid;

use crate::models::{Comment, NewComment, NewPost, NewUser, Post, PostPatch, PostType, User};

pub mod memory;
pub mod post;
pub mod user;

pub use memory::{MemoryPostRepository, MemoryUserRepository};
pub use post::PgPostRepository;
pub use user::PgUserRepository;

/// Result of a by-id mutation inside a post's comment collection
#[derive(Debug, Clone, PartialEq)]
pub enum CommentChange<T> {
    Applied(T),
    PostMissing,
    CommentMissing,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; an existing identity id or email is `DuplicateIdentity`
    async fn insert(&self, user: &NewUser) -> CoreResult<User>;

    async fn find_by_identity(&self, identity_id: &str) -> CoreResult<Option<User>>;

    /// Set or clear the photo URL; `None` when the user does not exist
    async fn set_profile_photo(
        &self,
        identity_id: &str,
        url: Option<&str>,
    ) -> CoreResult<Option<User>>;

    async fn set_hostel(&self, identity_id: &str, hostel_name: &str) -> CoreResult<Option<User>>;

    /// Append to the survey responses; `false` when the user does not exist
    async fn append_survey_response(&self, identity_id: &str, response: &str) -> CoreResult<bool>;
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn insert(&self, post: &NewPost) -> CoreResult<Post>;

    async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<Post>>;

    /// Every post, newest first
    async fn list_all(&self) -> CoreResult<Vec<Post>>;

    /// Posts of one owner, newest first
    async fn list_by_owner(&self, owner_id: &str) -> CoreResult<Vec<Post>>;

    /// Overwrite the fields set in the patch; images and comments untouched
    ///
    /// An empty description clears it.
    async fn update_fields(
        &self,
        id: Uuid,
        patch: &PostPatch,
        post_type: Option<PostType>,
    ) -> CoreResult<Option<Post>>;

    /// Drop the given URLs from `imageUrls`, keeping the order of the rest
    async fn remove_image_urls(&self, id: Uuid, urls: &[String]) -> CoreResult<bool>;

    async fn delete(&self, id: Uuid) -> CoreResult<bool>;

    /// Append a comment with a fresh id and timestamp; `None` when the post is gone
    async fn push_comment(&self, post_id: Uuid, comment: &NewComment) -> CoreResult<Option<Post>>;

    async fn update_comment_text(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        text: &str,
    ) -> CoreResult<CommentChange<Comment>>;

    async fn pull_comment(&self, post_id: Uuid, comment_id: Uuid)
    -> CoreResult<CommentChange<()>>;
}
