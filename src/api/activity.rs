use axum::{extract::State, response::Json};
use serde::Deserialize;
use uuid::Uuid;

use super::extract::{AppJson, AppPath, AppQuery};
use super::ApiResponse;
use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::*;
use crate::services::recommendation::RefreshSummary;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    status: Option<RecordStatus>,
}

pub async fn list_activity(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(query): AppQuery<ActivityQuery>,
) -> AppResult<Json<ApiResponse<Vec<ActivityEvent>>>> {
    let filter = ActivityFilter {
        user_id: Some(user.user_id),
        status: query.status,
    };
    let events = state.ledger.list_events(&filter).await?;
    Ok(Json(ApiResponse::success(events)))
}

pub async fn record_activity(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(request): AppJson<RecordActivityRequest>,
) -> AppResult<Json<ApiResponse<ActivityEvent>>> {
    let event = state.ledger.record_event(user.user_id, &request).await?;
    Ok(Json(ApiResponse::with_message(
        event,
        "Activity registered successfully",
    )))
}

pub async fn get_activity(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<ActivityEvent>>> {
    let event = state.ledger.get_event(user.user_id, id).await?;
    Ok(Json(ApiResponse::success(event)))
}

pub async fn update_activity(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(patch): AppJson<ActivityPatch>,
) -> AppResult<Json<ApiResponse<ActivityEvent>>> {
    let event = state.ledger.update_event(user.user_id, id, &patch).await?;
    Ok(Json(ApiResponse::with_message(
        event,
        "Activity updated successfully",
    )))
}

pub async fn archive_activity(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<ActivityEvent>>> {
    let event = state.ledger.archive_event(user.user_id, id).await?;
    Ok(Json(ApiResponse::with_message(
        event,
        "Activity deleted successfully",
    )))
}

pub async fn refresh_matrix(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<RefreshSummary>>> {
    user.require_admin()?;
    let summary = state.recommendations.refresh_matrix().await?;
    Ok(Json(ApiResponse::success(summary)))
}

pub async fn refresh_similarity(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<RefreshSummary>>> {
    user.require_admin()?;
    let summary = state.recommendations.refresh_similarity().await?;
    Ok(Json(ApiResponse::success(summary)))
}

pub async fn refresh_all(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<RefreshSummary>>> {
    user.require_admin()?;
    let summary = state.recommendations.refresh_all().await?;
    Ok(Json(ApiResponse::success(summary)))
}
