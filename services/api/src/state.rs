//! Application state shared across handlers

use std::sync::Arc;

use crate::managers::{PostManager, ProfileManager};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub profiles: Arc<ProfileManager>,
    pub posts: Arc<PostManager>,
}

impl AppState {
    pub fn new(profiles: ProfileManager, posts: PostManager) -> Self {
        Self {
            profiles: Arc::new(profiles),
            posts: Arc::new(posts),
        }
    }
}
