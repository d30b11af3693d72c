//! User records and profile payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile record, keyed by the identity id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub identity_id: String,
    pub email: String,
    pub name: String,
    pub contact_number: String,
    pub hostel_name: String,
    pub profile_photo_url: Option<String>,
    pub survey_responses: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a user record about to be written
#[derive(Debug, Clone)]
pub struct NewUser {
    pub identity_id: String,
    pub email: String,
    pub name: String,
    pub contact_number: String,
    pub hostel_name: String,
    pub profile_photo_url: Option<String>,
}

/// Registration form, sent as the `userData` multipart field
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(alias = "whatsappNumber", alias = "phone")]
    pub contact_number: String,
    #[serde(alias = "hostel")]
    pub hostel_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub message: String,
    pub identity_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RemovePhotoRequest {
    #[serde(alias = "currentProfilePhotoUrl", rename = "currentUrl", default)]
    pub current_url: String,
}

#[derive(Debug, Deserialize)]
pub struct HostelRequest {
    #[serde(alias = "hostel", rename = "hostelName", default)]
    pub hostel_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SurveyRequest {
    #[serde(alias = "uid", rename = "identityId", default)]
    pub identity_id: String,
    #[serde(alias = "surveyResponse", default)]
    pub response: String,
}
