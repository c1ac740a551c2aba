use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Serialize;

use super::extract::AppJson;
use super::ApiResponse;
use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::{LoginRequest, RegisterRequest, UserSummary};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserSummary,
}

pub async fn register(
    State(state): State<AppState>,
    AppJson(request): AppJson<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let user = state.accounts.register(&request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(user, "User registered successfully")),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let session = state.accounts.login(&request).await?;
    let cookie = state.jwt.session_cookie(&session.token);

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::success(LoginResponse {
            token: session.token,
            user: session.user,
        })),
    ))
}

pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, state.jwt.clear_cookie())],
        Json(ApiResponse::with_message((), "Logged out")),
    )
}

pub async fn profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<UserSummary>>> {
    let profile = state.accounts.profile(user.user_id).await?;
    Ok(Json(ApiResponse::success(profile)))
}
