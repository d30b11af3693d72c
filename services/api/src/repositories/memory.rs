//! In-process repositories for tests and local runs
//!
//! Each operation runs under one lock, which gives the same atomicity the
//! Postgres statements have.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use common::{CoreError, CoreResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{CommentChange, PostRepository, UserRepository};
use crate::models::{Comment, NewComment, NewPost, NewUser, Post, PostPatch, PostType, User};

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> CoreResult<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| CoreError::internal(format!("{} table poisoned", what)))
}

/// Users keyed by identity id
#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    users: Mutex<HashMap<String, User>>,
    fail_writes: AtomicBool,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail as if the store were down
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.users.lock().map(|users| users.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_writable(&self) -> CoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoreError::upstream("Document store unavailable"));
        }
        Ok(())
    }

    fn modify<F>(&self, identity_id: &str, change: F) -> CoreResult<Option<User>>
    where
        F: FnOnce(&mut User),
    {
        self.check_writable()?;
        let mut users = lock(&self.users, "User")?;
        Ok(users.get_mut(identity_id).map(|user| {
            change(user);
            user.updated_at = Utc::now();
            user.clone()
        }))
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn insert(&self, user: &NewUser) -> CoreResult<User> {
        self.check_writable()?;
        let mut users = lock(&self.users, "User")?;

        let email_taken = users
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email));
        if users.contains_key(&user.identity_id) || email_taken {
            return Err(CoreError::DuplicateIdentity("User already exists".to_string()));
        }

        let now = Utc::now();
        let stored = User {
            identity_id: user.identity_id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            contact_number: user.contact_number.clone(),
            hostel_name: user.hostel_name.clone(),
            profile_photo_url: user.profile_photo_url.clone(),
            survey_responses: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        users.insert(stored.identity_id.clone(), stored.clone());
        Ok(stored)
    }

    async fn find_by_identity(&self, identity_id: &str) -> CoreResult<Option<User>> {
        Ok(lock(&self.users, "User")?.get(identity_id).cloned())
    }

    async fn set_profile_photo(
        &self,
        identity_id: &str,
        url: Option<&str>,
    ) -> CoreResult<Option<User>> {
        self.modify(identity_id, |user| {
            user.profile_photo_url = url.map(str::to_string)
        })
    }

    async fn set_hostel(&self, identity_id: &str, hostel_name: &str) -> CoreResult<Option<User>> {
        self.modify(identity_id, |user| user.hostel_name = hostel_name.to_string())
    }

    async fn append_survey_response(&self, identity_id: &str, response: &str) -> CoreResult<bool> {
        let user = self.modify(identity_id, |user| {
            user.survey_responses.push(response.to_string())
        })?;
        Ok(user.is_some())
    }
}

/// Posts in insertion order
#[derive(Debug, Default)]
pub struct MemoryPostRepository {
    posts: Mutex<Vec<Post>>,
    fail_inserts: AtomicBool,
}

impl MemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.posts.lock().map(|posts| posts.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn newest_first(mut posts: Vec<Post>) -> Vec<Post> {
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts
    }
}

#[async_trait]
impl PostRepository for MemoryPostRepository {
    async fn insert(&self, post: &NewPost) -> CoreResult<Post> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(CoreError::upstream("Document store unavailable"));
        }

        let mut posts = lock(&self.posts, "Post")?;
        // Strictly increasing creation times keep the ordering deterministic
        let mut created_at = Utc::now();
        if let Some(last) = posts.iter().map(|p| p.created_at).max() {
            if created_at <= last {
                created_at = last + ChronoDuration::microseconds(1);
            }
        }

        let stored = Post {
            id: Uuid::new_v4(),
            owner_id: post.owner_id.clone(),
            location: post.location.clone(),
            post_type: post.post_type,
            description: post.description.clone(),
            image_urls: post.image_urls.clone(),
            comments: Vec::new(),
            created_at,
        };
        posts.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<Post>> {
        Ok(lock(&self.posts, "Post")?
            .iter()
            .find(|post| post.id == id)
            .cloned())
    }

    async fn list_all(&self) -> CoreResult<Vec<Post>> {
        let posts = lock(&self.posts, "Post")?.clone();
        Ok(Self::newest_first(posts))
    }

    async fn list_by_owner(&self, owner_id: &str) -> CoreResult<Vec<Post>> {
        let posts = lock(&self.posts, "Post")?
            .iter()
            .filter(|post| post.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(Self::newest_first(posts))
    }

    async fn update_fields(
        &self,
        id: Uuid,
        patch: &PostPatch,
        post_type: Option<PostType>,
    ) -> CoreResult<Option<Post>> {
        let mut posts = lock(&self.posts, "Post")?;
        Ok(posts.iter_mut().find(|post| post.id == id).map(|post| {
            if let Some(description) = &patch.description {
                post.description = Some(description.clone()).filter(|d| !d.is_empty());
            }
            if let Some(location) = &patch.location {
                post.location = location.clone();
            }
            if let Some(post_type) = post_type {
                post.post_type = post_type;
            }
            post.clone()
        }))
    }

    async fn remove_image_urls(&self, id: Uuid, urls: &[String]) -> CoreResult<bool> {
        let mut posts = lock(&self.posts, "Post")?;
        match posts.iter_mut().find(|post| post.id == id) {
            Some(post) => {
                post.image_urls.retain(|url| !urls.contains(url));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> CoreResult<bool> {
        let mut posts = lock(&self.posts, "Post")?;
        let before = posts.len();
        posts.retain(|post| post.id != id);
        Ok(posts.len() < before)
    }

    async fn push_comment(&self, post_id: Uuid, comment: &NewComment) -> CoreResult<Option<Post>> {
        // Let concurrent callers interleave before taking the lock
        tokio::task::yield_now().await;

        let mut posts = lock(&self.posts, "Post")?;
        Ok(posts.iter_mut().find(|post| post.id == post_id).map(|post| {
            post.comments.push(Comment {
                id: Uuid::new_v4(),
                author_id: comment.author_id.clone(),
                author_name: comment.author_name.clone(),
                text: comment.text.clone(),
                created_at: Utc::now(),
            });
            post.clone()
        }))
    }

    async fn update_comment_text(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        text: &str,
    ) -> CoreResult<CommentChange<Comment>> {
        let mut posts = lock(&self.posts, "Post")?;
        let Some(post) = posts.iter_mut().find(|post| post.id == post_id) else {
            return Ok(CommentChange::PostMissing);
        };

        match post.comments.iter_mut().find(|c| c.id == comment_id) {
            Some(comment) => {
                comment.text = text.to_string();
                Ok(CommentChange::Applied(comment.clone()))
            }
            None => Ok(CommentChange::CommentMissing),
        }
    }

    async fn pull_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> CoreResult<CommentChange<()>> {
        let mut posts = lock(&self.posts, "Post")?;
        let Some(post) = posts.iter_mut().find(|post| post.id == post_id) else {
            return Ok(CommentChange::PostMissing);
        };

        let before = post.comments.len();
        post.comments.retain(|c| c.id != comment_id);
        if post.comments.len() < before {
            Ok(CommentChange::Applied(()))
        } else {
            Ok(CommentChange::CommentMissing)
        }
    }
}
