//! Blob store adapter
//!
//! Stores images under collision-resistant names and hands back public
//! URLs. Deleting takes the URL back; the object name is recovered from it.
//! Deleting an object that is already gone is not an error.

use async_trait::async_trait;
use common::CoreResult;
use uuid::Uuid;

pub mod memory;
pub mod s3;

pub use memory::MemoryBlobStore;
pub use s3::{S3BlobStore, S3Config};

/// Longest sanitized name hint kept in an object name
const MAX_HINT_LEN: usize = 64;

/// What an uploaded blob belongs to; decides the object name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    ProfilePhoto,
    PostImage,
}

impl BlobKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            BlobKind::ProfilePhoto => "profile-photos",
            BlobKind::PostImage => "posts",
        }
    }
}

/// Port to the binary asset store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` and return a publicly readable URL
    ///
    /// The URL is only returned once the object is fully stored.
    async fn upload(
        &self,
        kind: BlobKind,
        bytes: Vec<u8>,
        content_type: &str,
        name_hint: &str,
    ) -> CoreResult<String>;

    /// Delete the object behind `url`; a missing object counts as deleted
    async fn delete(&self, url: &str) -> CoreResult<()>;
}

/// Build a globally unique object name from a random id and a name hint
pub fn object_name(kind: BlobKind, name_hint: &str) -> String {
    let mut hint: String = name_hint
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();

    if hint.len() > MAX_HINT_LEN {
        // Keep the tail so the extension survives
        hint = hint[hint.len() - MAX_HINT_LEN..].to_string();
    }
    if hint.trim_matches(['-', '.']).is_empty() {
        hint = "upload".to_string();
    }

    format!("{}/{}-{}", kind.prefix(), Uuid::new_v4(), hint)
}

/// Public URL of an object under `base_url`
pub fn public_url(base_url: &str, name: &str) -> String {
    let encoded: Vec<String> = name
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();

    format!("{}/{}", base_url.trim_end_matches('/'), encoded.join("/"))
}

/// Recover the object name from a URL produced by [`public_url`]
///
/// Returns `None` for URLs outside `base_url`.
pub fn object_name_from_url(base_url: &str, url: &str) -> Option<String> {
    let base = base_url.trim_end_matches('/');
    let rest = url.strip_prefix(base)?.strip_prefix('/')?;
    let path = rest.split(['?', '#']).next().unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    urlencoding::decode(path).ok().map(|name| name.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_names_are_unique_and_prefixed() {
        let a = object_name(BlobKind::PostImage, "umbrella.jpg");
        let b = object_name(BlobKind::PostImage, "umbrella.jpg");

        assert_ne!(a, b);
        assert!(a.starts_with("posts/"));
        assert!(a.ends_with("-umbrella.jpg"));
        assert!(object_name(BlobKind::ProfilePhoto, "me.png").starts_with("profile-photos/"));
    }

    #[test]
    fn test_object_name_sanitizes_hint() {
        let name = object_name(BlobKind::ProfilePhoto, "../../etc/my photo (1).png");
        assert!(name.ends_with("-my-photo--1-.png"));
        assert!(!name.contains(".."));
        assert!(!name.contains(' '));

        let name = object_name(BlobKind::PostImage, "");
        assert!(name.ends_with("-upload"));

        let long = format!("{}.jpg", "a".repeat(200));
        let name = object_name(BlobKind::PostImage, &long);
        assert!(name.ends_with(".jpg"));
        assert!(name.len() < 120);
    }

    #[test]
    fn test_url_round_trip() {
        let base = "https://cdn.example.com/bucket/";
        let name = "posts/0b6f-black umbrella.jpg";

        let url = public_url(base, name);
        assert_eq!(
            url,
            "https://cdn.example.com/bucket/posts/0b6f-black%20umbrella.jpg"
        );
        assert_eq!(object_name_from_url(base, &url).as_deref(), Some(name));
    }

    #[test]
    fn test_foreign_urls_are_rejected() {
        let base = "https://cdn.example.com/bucket";

        assert_eq!(
            object_name_from_url(base, "https://elsewhere.com/bucket/posts/a.jpg"),
            None
        );
        assert_eq!(object_name_from_url(base, "https://cdn.example.com/bucket/"), None);
        assert_eq!(
            object_name_from_url(base, "https://cdn.example.com/bucket-other/a.jpg"),
            None
        );
        assert_eq!(
            object_name_from_url(base, "https://cdn.example.com/bucket/posts/a.jpg?alt=media")
                .as_deref(),
            Some("posts/a.jpg")
        );
    }
}
