use axum::{extract::State, response::Json};

use super::ApiResponse;
use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::Recommendation;
use crate::services::reader::RecommendedResourceView;
use crate::AppState;

pub async fn recommend(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Recommendation>>> {
    let recommendation = state.recommendations.recommend_for(user.user_id).await?;
    Ok(Json(ApiResponse::with_message(
        recommendation,
        "Recommendation registered successfully",
    )))
}

pub async fn get_recommendation(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Recommendation>>> {
    let recommendation = state.recommendations.get_for(user.user_id).await?;
    Ok(Json(ApiResponse::success(recommendation)))
}

pub async fn list_recommended_resources(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<RecommendedResourceView>>>> {
    let resources = state.reader.list_recommended_resources(user.user_id).await?;
    Ok(Json(ApiResponse::success(resources)))
}
