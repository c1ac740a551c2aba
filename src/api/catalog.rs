use axum::{extract::State, response::Json};
use serde::Deserialize;
use uuid::Uuid;

use super::extract::{AppJson, AppPath, AppQuery};
use super::ApiResponse;
use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::*;
use crate::services::catalog::SearchResults;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ResourceQuery {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    query: String,
}

pub async fn list_groups(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<Group>>>> {
    let groups = state.catalog.list_groups(user.user_id).await?;
    Ok(Json(ApiResponse::success(groups)))
}

pub async fn create_group(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(request): AppJson<CreateGroupRequest>,
) -> AppResult<Json<ApiResponse<Group>>> {
    let group = state.catalog.create_group(&user.actor(), &request).await?;
    Ok(Json(ApiResponse::with_message(group, "Group created successfully")))
}

pub async fn get_group(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Group>>> {
    let group = state.catalog.get_group(user.user_id, id).await?;
    Ok(Json(ApiResponse::success(group)))
}

pub async fn update_group(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateGroupRequest>,
) -> AppResult<Json<ApiResponse<Group>>> {
    let group = state.catalog.update_group(&user.actor(), id, &request).await?;
    Ok(Json(ApiResponse::with_message(group, "Group updated successfully")))
}

pub async fn archive_group(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Group>>> {
    let group = state.catalog.archive_group(&user.actor(), id).await?;
    Ok(Json(ApiResponse::with_message(group, "Group deleted successfully")))
}

pub async fn list_projects(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<Project>>>> {
    let projects = state.catalog.list_projects(user.user_id).await?;
    Ok(Json(ApiResponse::success(projects)))
}

pub async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(request): AppJson<CreateProjectRequest>,
) -> AppResult<Json<ApiResponse<Project>>> {
    let project = state.catalog.create_project(&user.actor(), &request).await?;
    Ok(Json(ApiResponse::with_message(
        project,
        "Project created successfully",
    )))
}

pub async fn get_project(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Project>>> {
    let project = state.catalog.get_project(user.user_id, id).await?;
    Ok(Json(ApiResponse::success(project)))
}

pub async fn update_project(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateProjectRequest>,
) -> AppResult<Json<ApiResponse<Project>>> {
    let project = state.catalog.update_project(&user.actor(), id, &request).await?;
    Ok(Json(ApiResponse::with_message(
        project,
        "Project updated successfully",
    )))
}

pub async fn archive_project(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Project>>> {
    let project = state.catalog.archive_project(&user.actor(), id).await?;
    Ok(Json(ApiResponse::with_message(
        project,
        "Project deleted successfully",
    )))
}

pub async fn list_resources(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(project_id): AppPath<Uuid>,
    AppQuery(query): AppQuery<ResourceQuery>,
) -> AppResult<Json<ApiResponse<Vec<Resource>>>> {
    let resources = state
        .catalog
        .list_resources(user.user_id, project_id, query.path.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(resources)))
}

pub async fn create_resource(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(request): AppJson<CreateResourceRequest>,
) -> AppResult<Json<ApiResponse<Resource>>> {
    let resource = state.catalog.create_resource(user.user_id, &request).await?;
    Ok(Json(ApiResponse::with_message(
        resource,
        "Resource created successfully",
    )))
}

pub async fn get_resource(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Resource>>> {
    let resource = state.catalog.get_resource(user.user_id, id).await?;
    Ok(Json(ApiResponse::success(resource)))
}

pub async fn update_resource(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateResourceRequest>,
) -> AppResult<Json<ApiResponse<Resource>>> {
    let resource = state.catalog.update_resource(&user.actor(), id, &request).await?;
    Ok(Json(ApiResponse::with_message(
        resource,
        "Resource updated successfully",
    )))
}

pub async fn list_resource_versions(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<ResourceVersion>>>> {
    let versions = state.catalog.list_resource_versions(user.user_id, id).await?;
    Ok(Json(ApiResponse::success(versions)))
}

pub async fn archive_resource(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Resource>>> {
    let resource = state.catalog.archive_resource(&user.actor(), id).await?;
    Ok(Json(ApiResponse::with_message(
        resource,
        "Resource deleted successfully",
    )))
}

pub async fn search(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(query): AppQuery<SearchQuery>,
) -> AppResult<Json<ApiResponse<SearchResults>>> {
    let results = state.catalog.search(user.user_id, &query.query).await?;
    Ok(Json(ApiResponse::success(results)))
}
