//! Input validation, run before any external call

use common::{CoreError, CoreResult};
use regex::Regex;
use std::sync::OnceLock;

use crate::models::{NewComment, PostPatch, Registration};

/// Validate email
pub fn validate_email(email: &str) -> CoreResult<()> {
    if email.is_empty() {
        return Err(CoreError::validation("Email is required"));
    }

    if email.len() > 254 {
        return Err(CoreError::validation(
            "Email must be at most 254 characters long",
        ));
    }

    static EMAIL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = EMAIL_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok())
        .as_ref()
        .ok_or_else(|| CoreError::internal("Email pattern failed to compile"))?;

    if !regex.is_match(email) {
        return Err(CoreError::validation("Invalid email format"));
    }

    Ok(())
}

/// Validate password length; strength rules belong to the identity provider
pub fn validate_password(password: &str) -> CoreResult<()> {
    if password.is_empty() {
        return Err(CoreError::validation("Password is required"));
    }

    if password.len() < 6 {
        return Err(CoreError::validation(
            "Password must be at least 6 characters long",
        ));
    }

    if password.len() > 128 {
        return Err(CoreError::validation(
            "Password must be at most 128 characters long",
        ));
    }

    Ok(())
}

/// Reject blank values of a required field
pub fn validate_required(field: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::validation(format!("{} is required", field)));
    }
    Ok(())
}

pub fn validate_registration(registration: &Registration) -> CoreResult<()> {
    validate_email(registration.email.trim())?;
    validate_password(&registration.password)?;
    validate_required("name", &registration.name)?;
    validate_required("contactNumber", &registration.contact_number)?;
    validate_required("hostelName", &registration.hostel_name)?;
    Ok(())
}

pub fn validate_comment(comment: &NewComment) -> CoreResult<()> {
    validate_required("authorId", &comment.author_id)?;
    validate_required("authorName", &comment.author_name)?;
    validate_required("text", &comment.text)
}

/// A patch must set at least one field; only the description may be blank
pub fn validate_patch(patch: &PostPatch) -> CoreResult<()> {
    if patch.is_empty() {
        return Err(CoreError::validation("Nothing to update"));
    }
    if let Some(location) = &patch.location {
        validate_required("location", location)?;
    }
    patch.post_type()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ErrorKind;

    fn registration() -> Registration {
        Registration {
            email: "sam@example.com".to_string(),
            password: "secret123".to_string(),
            name: "Sam".to_string(),
            contact_number: "+15550001".to_string(),
            hostel_name: "North".to_string(),
        }
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("sam@example.com").is_ok());
        assert!(validate_email("first.last+tag@uni.ac.in").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secret").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_registration() {
        assert!(validate_registration(&registration()).is_ok());

        let mut missing_hostel = registration();
        missing_hostel.hostel_name = "  ".to_string();
        let err = validate_registration(&missing_hostel).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert!(err.to_string().contains("hostelName"));
    }

    #[test]
    fn test_validate_patch() {
        assert!(validate_patch(&PostPatch::default()).is_err());

        let patch = PostPatch {
            location: Some("".to_string()),
            ..Default::default()
        };
        assert!(validate_patch(&patch).is_err());

        let patch = PostPatch {
            description: Some("Blue handle".to_string()),
            ..Default::default()
        };
        assert!(validate_patch(&patch).is_ok());

        // Clearing the description is an update of its own
        let patch = PostPatch {
            description: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(validate_patch(&patch).is_ok());
    }
}
