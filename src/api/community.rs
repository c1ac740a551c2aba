use axum::{extract::State, response::Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::extract::{AppJson, AppPath, AppQuery};
use super::ApiResponse;
use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::*;
use crate::services::home::HomeOverview;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    #[serde(alias = "resource_project_path")]
    path: Option<String>,
}

pub async fn home(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(query): AppQuery<HomeQuery>,
) -> AppResult<Json<ApiResponse<HomeOverview>>> {
    let overview = state
        .home
        .overview(user.user_id, query.path.as_deref(), Utc::now())
        .await?;
    Ok(Json(ApiResponse::success(overview)))
}

pub async fn list_comments(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(project_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<Comment>>>> {
    let comments = state.comments.list_comments(user.user_id, project_id).await?;
    Ok(Json(ApiResponse::success(comments)))
}

pub async fn create_comment(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(request): AppJson<CreateCommentRequest>,
) -> AppResult<Json<ApiResponse<Comment>>> {
    let comment = state.comments.create_comment(&user.actor(), &request).await?;
    Ok(Json(ApiResponse::with_message(
        comment,
        "Comment registered successfully",
    )))
}

pub async fn get_comment(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Comment>>> {
    let comment = state.comments.get_comment(user.user_id, id).await?;
    Ok(Json(ApiResponse::success(comment)))
}

pub async fn update_comment(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateCommentRequest>,
) -> AppResult<Json<ApiResponse<Comment>>> {
    let comment = state.comments.update_comment(&user.actor(), id, &request).await?;
    Ok(Json(ApiResponse::with_message(
        comment,
        "Comment updated successfully",
    )))
}

pub async fn archive_comment(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Comment>>> {
    let comment = state.comments.archive_comment(&user.actor(), id).await?;
    Ok(Json(ApiResponse::with_message(
        comment,
        "Comment deleted successfully",
    )))
}
