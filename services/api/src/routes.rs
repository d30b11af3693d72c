//! API service routes

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, multipart::Field},
    http::HeaderValue,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{
    config::AppConfig, error::ApiResult, middleware::require_caller, models::ImageUpload,
    state::AppState,
};

pub mod auth;
pub mod posts;

/// Create the router for the API service
pub fn create_router(state: AppState, config: &AppConfig) -> Router {
    let caller_routes = Router::new()
        .route(
            "/post/:id",
            put(posts::update_post).delete(posts::delete_post),
        )
        .route(
            "/post/:id/comment/:comment_id",
            put(posts::update_comment).delete(posts::delete_comment),
        )
        .route_layer(middleware::from_fn(require_caller));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(auth::register))
        .route("/auth/user/:id", get(auth::get_user))
        .route(
            "/auth/user/:id/photo",
            put(auth::replace_photo).delete(auth::remove_photo),
        )
        .route(
            "/auth/user/:id/profile-picture",
            put(auth::replace_photo).delete(auth::remove_photo),
        )
        .route("/auth/user/:id/hostel", put(auth::update_hostel))
        .route("/auth/survey", post(auth::submit_survey))
        .route("/post", get(posts::list_posts).post(posts::create_post))
        .route("/post/user/:id", get(posts::list_user_posts))
        .route("/post/:id/comment", post(posts::add_comment))
        .merge(caller_routes)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors_layer(&config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the browser UI, which is served from its own origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin {:?}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "lost-found-api"
    }))
}

/// Read a file part; empty parts count as absent
pub(crate) async fn read_upload(field: Field<'_>) -> ApiResult<Option<ImageUpload>> {
    let file_name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let bytes = field.bytes().await?;
    if bytes.is_empty() {
        return Ok(None);
    }

    Ok(Some(ImageUpload::new(bytes.to_vec(), content_type, file_name)))
}
