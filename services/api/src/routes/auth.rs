//! Registration and profile routes

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::debug;

use super::read_upload;
use crate::{
    AppState,
    extract::{ApiJson, ApiPath},
    error::{ApiError, ApiResult},
    models::{
        HostelRequest, Registration, RegistrationResponse, RemovePhotoRequest, SurveyRequest,
    },
};

/// Register a user: multipart `userData` JSON plus an optional `profilePhoto`
pub async fn register(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut registration = None;
    let mut photo = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "userData" => {
                let raw = field.text().await?;
                let parsed: Registration = serde_json::from_str(&raw)
                    .map_err(|e| ApiError::BadRequest(format!("Invalid userData: {}", e)))?;
                registration = Some(parsed);
            }
            "profilePhoto" | "photo" => photo = read_upload(field).await?,
            other => debug!("Ignoring multipart field {}", other),
        }
    }

    let registration =
        registration.ok_or_else(|| ApiError::BadRequest("userData is required".to_string()))?;
    let user = state.profiles.register(registration, photo).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            message: "User registered successfully".to_string(),
            identity_id: user.identity_id,
        }),
    ))
}

pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<impl IntoResponse> {
    let user = state.profiles.get_by_identity(&id).await?;
    Ok(Json(user))
}

/// Replace the profile photo: multipart `profilePhoto` plus the URL the client last saw
pub async fn replace_photo(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut photo = None;
    let mut previous_url = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "profilePhoto" | "photo" => photo = read_upload(field).await?,
            "currentProfilePhotoUrl" | "previousUrl" => previous_url = Some(field.text().await?),
            other => debug!("Ignoring multipart field {}", other),
        }
    }

    let photo =
        photo.ok_or_else(|| ApiError::BadRequest("profilePhoto is required".to_string()))?;
    let new_url = state
        .profiles
        .replace_photo(&id, photo, previous_url.as_deref())
        .await?;

    Ok(Json(json!({
        "message": "Profile picture updated successfully",
        "newProfilePhotoUrl": new_url,
    })))
}

pub async fn remove_photo(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(payload): ApiJson<RemovePhotoRequest>,
) -> ApiResult<impl IntoResponse> {
    state
        .profiles
        .remove_photo(&id, &payload.current_url)
        .await?;

    Ok(Json(json!({
        "message": "Profile picture removed successfully"
    })))
}

pub async fn update_hostel(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(payload): ApiJson<HostelRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .profiles
        .update_hostel(&id, &payload.hostel_name)
        .await?;

    Ok(Json(json!({
        "message": "Hostel information updated successfully",
        "user": user,
    })))
}

pub async fn submit_survey(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SurveyRequest>,
) -> ApiResult<impl IntoResponse> {
    state
        .profiles
        .append_survey(&payload.identity_id, &payload.response)
        .await?;

    Ok(Json(json!({
        "message": "Survey response submitted successfully!"
    })))
}
