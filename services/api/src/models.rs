//! Records, request payloads and response payloads

use common::{CoreError, CoreResult};

pub mod post;
pub mod user;

pub use post::{
    Comment, CommentRequest, CommentTextRequest, NewComment, NewPost, Post, PostPatch, PostType,
};
pub use user::{
    HostelRequest, NewUser, Registration, RegistrationResponse, RemovePhotoRequest,
    SurveyRequest, User,
};

/// An uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: String,
}

impl ImageUpload {
    pub fn new(
        bytes: impl Into<Vec<u8>>,
        content_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
            file_name: file_name.into(),
        }
    }
}

/// Identity of the caller, as forwarded by the edge gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub identity_id: String,
}

impl Caller {
    pub fn new(identity_id: impl Into<String>) -> Self {
        Self {
            identity_id: identity_id.into(),
        }
    }

    /// Reject the call unless the caller is `owner_id`
    pub fn ensure_is(&self, owner_id: &str, what: &str) -> CoreResult<()> {
        if self.identity_id == owner_id {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "Caller may not modify this {}",
                what
            )))
        }
    }
}
