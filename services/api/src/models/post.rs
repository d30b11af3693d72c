//! Posts and their embedded comments

use chrono::{DateTime, Utc};
use common::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Whether the item was lost or found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Lost,
    Found,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Lost => "lost",
            PostType::Found => "found",
        }
    }
}

impl FromStr for PostType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lost" => Ok(PostType::Lost),
            "found" => Ok(PostType::Found),
            other => Err(CoreError::validation(format!(
                "Invalid post type '{}': expected 'lost' or 'found'",
                other
            ))),
        }
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub author_id: String,
    pub author_name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub owner_id: String,
    pub location: String,
    pub post_type: PostType,
    pub description: Option<String>,
    pub image_urls: Vec<String>,
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn comment(&self, comment_id: Uuid) -> Option<&Comment> {
        self.comments.iter().find(|comment| comment.id == comment_id)
    }
}

/// Fields of a post about to be written
#[derive(Debug, Clone)]
pub struct NewPost {
    pub owner_id: String,
    pub location: String,
    pub post_type: PostType,
    pub description: Option<String>,
    pub image_urls: Vec<String>,
}

/// Comment about to be appended; id and timestamp are assigned by the store
#[derive(Debug, Clone)]
pub struct NewComment {
    pub author_id: String,
    pub author_name: String,
    pub text: String,
}

/// Partial update of a post's own fields
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    /// A blank description clears the stored one
    pub description: Option<String>,
    pub location: Option<String>,
    /// Kept raw so an unknown type is reported as a validation failure
    pub post_type: Option<String>,
}

impl PostPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.location.is_none() && self.post_type.is_none()
    }

    /// Copy with surrounding whitespace trimmed from the text fields
    pub fn trimmed(self) -> Self {
        Self {
            description: self.description.map(|d| d.trim().to_string()),
            location: self.location.map(|l| l.trim().to_string()),
            post_type: self.post_type,
        }
    }

    /// Parsed `postType`, if the patch sets one
    pub fn post_type(&self) -> CoreResult<Option<PostType>> {
        self.post_type.as_deref().map(str::parse).transpose()
    }
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(alias = "userId", rename = "authorId", default)]
    pub author_id: String,
    #[serde(alias = "userName", rename = "authorName", default)]
    pub author_name: String,
    #[serde(alias = "comment", default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentTextRequest {
    #[serde(alias = "comment", default)]
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_type_parsing() {
        assert_eq!("lost".parse::<PostType>().unwrap(), PostType::Lost);
        assert_eq!(" Found ".parse::<PostType>().unwrap(), PostType::Found);
        assert!("stolen".parse::<PostType>().is_err());
        assert_eq!(PostType::Found.to_string(), "found");
    }

    #[test]
    fn test_patch_keeps_raw_post_type_until_checked() {
        let patch: PostPatch =
            serde_json::from_str(r#"{"location": "Gym", "postType": "stolen"}"#).unwrap();
        assert!(!patch.is_empty());
        assert!(patch.post_type().is_err());

        let patch: PostPatch = serde_json::from_str(r#"{"postType": "FOUND"}"#).unwrap();
        assert_eq!(patch.post_type().unwrap(), Some(PostType::Found));

        let patch: PostPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn test_comment_request_aliases() {
        let request: CommentRequest = serde_json::from_str(
            r#"{"userId": "u1", "userName": "Sam", "comment": "found it!"}"#,
        )
        .unwrap();
        assert_eq!(request.author_id, "u1");
        assert_eq!(request.author_name, "Sam");
        assert_eq!(request.text, "found it!");
    }

    #[test]
    fn test_post_wire_format() {
        let post = Post {
            id: Uuid::new_v4(),
            owner_id: "u1".to_string(),
            location: "Library".to_string(),
            post_type: PostType::Lost,
            description: None,
            image_urls: vec![],
            comments: vec![],
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(value["postType"], "lost");
        assert_eq!(value["ownerId"], "u1");
        assert!(value["imageUrls"].as_array().unwrap().is_empty());
    }
}
