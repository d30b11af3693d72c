//! Post and comment routes

use axum::{
    Extension, Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use super::read_upload;
use crate::{
    AppState,
    extract::{ApiJson, ApiPath},
    error::ApiResult,
    managers::post::PostDraft,
    models::{Caller, CommentRequest, CommentTextRequest, NewComment, PostPatch, PostType},
};

/// Create a post from multipart fields plus any number of `images`
pub async fn create_post(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut owner_id = String::new();
    let mut location = String::new();
    let mut post_type = String::new();
    let mut description = None;
    let mut images = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "ownerId" | "uid" => owner_id = field.text().await?,
            "location" => location = field.text().await?,
            "postType" => post_type = field.text().await?,
            "description" => description = Some(field.text().await?),
            "images" | "images[]" => {
                if let Some(image) = read_upload(field).await? {
                    images.push(image);
                }
            }
            other => debug!("Ignoring multipart field {}", other),
        }
    }

    let draft = PostDraft {
        owner_id,
        location,
        post_type: post_type.parse::<PostType>()?,
        description,
    };
    let post = state.posts.create(draft, images).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Post created successfully",
            "post": post,
        })),
    ))
}

pub async fn list_posts(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let posts = state.posts.list_all().await?;
    Ok(Json(posts))
}

pub async fn list_user_posts(
    State(state): State<AppState>,
    ApiPath(owner_id): ApiPath<String>,
) -> ApiResult<impl IntoResponse> {
    let posts = state.posts.list_by_owner(&owner_id).await?;
    Ok(Json(posts))
}

pub async fn update_post(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<PostPatch>,
) -> ApiResult<impl IntoResponse> {
    let post = state.posts.update_fields(post_id, &caller, patch).await?;
    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.posts.delete(post_id, &caller).await?;

    Ok(Json(json!({
        "message": "Post and corresponding images deleted successfully!"
    })))
}

pub async fn add_comment(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let comment = NewComment {
        author_id: payload.author_id,
        author_name: payload.author_name,
        text: payload.text,
    };
    let post = state.posts.add_comment(post_id, comment).await?;

    Ok(Json(json!({
        "message": "Comment added successfully",
        "post": post,
    })))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiPath((post_id, comment_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(payload): ApiJson<CommentTextRequest>,
) -> ApiResult<impl IntoResponse> {
    let comment = state
        .posts
        .update_comment(post_id, comment_id, &caller, &payload.text)
        .await?;

    Ok(Json(json!({
        "message": "Comment updated successfully",
        "comment": comment,
    })))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiPath((post_id, comment_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    state
        .posts
        .delete_comment(post_id, comment_id, &caller)
        .await?;

    Ok(Json(json!({
        "message": "Comment deleted successfully"
    })))
}
