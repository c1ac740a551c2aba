//! HTTP surface.

mod activity;
mod auth;
mod catalog;
mod community;
mod extract;
mod recommendation;

use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Envelope for every successful response. Failures use the error body instead.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::with_message(data, "Success")
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.into(),
        }
    }
}

async fn health_check() -> Json<ApiResponse<HashMap<String, String>>> {
    let mut status = HashMap::new();
    status.insert("status".to_string(), "healthy".to_string());
    status.insert("service".to_string(), "scholaris".to_string());
    status.insert("version".to_string(), env!("CARGO_PKG_VERSION").to_string());

    Json(ApiResponse::success(status))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/profile", get(auth::profile))
        .route(
            "/activity",
            get(activity::list_activity).post(activity::record_activity),
        )
        .route(
            "/activity/:id",
            get(activity::get_activity)
                .put(activity::update_activity)
                .delete(activity::archive_activity),
        )
        .route("/activity/matrix", post(activity::refresh_matrix))
        .route("/activity/similarity", post(activity::refresh_similarity))
        .route("/activity/refresh", post(activity::refresh_all))
        .route(
            "/recommendations",
            get(recommendation::get_recommendation).post(recommendation::recommend),
        )
        .route(
            "/recommendations/resources",
            get(recommendation::list_recommended_resources),
        )
        .route(
            "/groups",
            get(catalog::list_groups).post(catalog::create_group),
        )
        .route(
            "/groups/:id",
            get(catalog::get_group)
                .put(catalog::update_group)
                .delete(catalog::archive_group),
        )
        .route(
            "/projects",
            get(catalog::list_projects).post(catalog::create_project),
        )
        .route(
            "/projects/:id",
            get(catalog::get_project)
                .put(catalog::update_project)
                .delete(catalog::archive_project),
        )
        .route("/projects/:id/resources", get(catalog::list_resources))
        .route("/projects/:id/comments", get(community::list_comments))
        .route("/resources", post(catalog::create_resource))
        .route(
            "/resources/:id",
            get(catalog::get_resource)
                .put(catalog::update_resource)
                .delete(catalog::archive_resource),
        )
        .route(
            "/resources/:id/versions",
            get(catalog::list_resource_versions),
        )
        .route("/comments", post(community::create_comment))
        .route(
            "/comments/:id",
            get(community::get_comment)
                .put(community::update_comment)
                .delete(community::archive_comment),
        )
        .route("/home", get(community::home))
        .route("/search", get(catalog::search))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
