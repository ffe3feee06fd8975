use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            LoginRequest, LoginResponse, MessageResponse, RefreshRequest, RegisterRequest,
            UpdateUserRequest, UserResponse,
        },
        extractors::AuthUser,
    },
    error::AppResult,
    extract::{ApiJson, ApiPath, ApiQuery},
    pagination::Pagination,
    state::AppState,
};

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/refresh", post(refresh))
        .route("/users/logout", post(logout))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let out = state.auth.register(payload).await?;
    Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    Ok(Json(state.auth.login(payload).await?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> AppResult<Json<LoginResponse>> {
    Ok(Json(state.auth.refresh(payload).await?))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<MessageResponse>> {
    Ok(Json(state.auth.logout(user_id).await?))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    ApiQuery(page): ApiQuery<Pagination>,
) -> AppResult<Json<Vec<UserResponse>>> {
    Ok(Json(state.auth.list_profiles(page).await?))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<UserResponse>> {
    Ok(Json(state.auth.get_profile(id).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    Ok(Json(state.auth.update_profile(caller, id, payload).await?))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    Ok(Json(state.auth.delete_account(caller, id).await?))
}
