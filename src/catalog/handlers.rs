use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    catalog::dto::{CreateServiceRequest, ServiceResponse, UpdateServiceRequest},
    error::AppResult,
    extract::{ApiJson, ApiPath, ApiQuery},
    pagination::Pagination,
    state::AppState,
};

pub fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/services", get(list_services).post(create_service))
        .route(
            "/services/:id",
            get(get_service).put(update_service).delete(delete_service),
        )
}

#[instrument(skip(state))]
pub async fn list_services(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> AppResult<Json<Vec<ServiceResponse>>> {
    Ok(Json(state.catalog.list(page).await?))
}

#[instrument(skip(state))]
pub async fn get_service(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ServiceResponse>> {
    Ok(Json(state.catalog.get(id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_service(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    ApiJson(payload): ApiJson<CreateServiceRequest>,
) -> AppResult<(StatusCode, Json<ServiceResponse>)> {
    let service = state.catalog.create(payload).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

#[instrument(skip(state, payload))]
pub async fn update_service(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateServiceRequest>,
) -> AppResult<Json<ServiceResponse>> {
    Ok(Json(state.catalog.update(id, payload).await?))
}

#[instrument(skip(state))]
pub async fn delete_service(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    state.catalog.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
