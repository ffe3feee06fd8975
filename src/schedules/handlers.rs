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
    error::AppResult,
    extract::{ApiJson, ApiPath, ApiQuery},
    pagination::Pagination,
    schedules::dto::{CreateScheduleRequest, ScheduleResponse, UpdateScheduleRequest},
    state::AppState,
};

pub fn schedule_routes() -> Router<AppState> {
    Router::new()
        .route("/schedules", get(list_schedules).post(create_schedule))
        .route(
            "/schedules/:id",
            get(get_schedule).put(update_schedule).delete(delete_schedule),
        )
        .route("/services/:id/schedules", get(list_service_schedules))
}

#[instrument(skip(state))]
pub async fn list_schedules(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> AppResult<Json<Vec<ScheduleResponse>>> {
    Ok(Json(state.schedules.list(page).await?))
}

#[instrument(skip(state))]
pub async fn get_schedule(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ScheduleResponse>> {
    Ok(Json(state.schedules.get(id).await?))
}

#[instrument(skip(state))]
pub async fn list_service_schedules(
    State(state): State<AppState>,
    ApiPath(service_id): ApiPath<Uuid>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> AppResult<Json<Vec<ScheduleResponse>>> {
    Ok(Json(
        state.schedules.list_for_service(service_id, page).await?,
    ))
}

#[instrument(skip(state, payload))]
pub async fn create_schedule(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    ApiJson(payload): ApiJson<CreateScheduleRequest>,
) -> AppResult<(StatusCode, Json<ScheduleResponse>)> {
    let schedule = state.schedules.create(payload).await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

#[instrument(skip(state, payload))]
pub async fn update_schedule(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateScheduleRequest>,
) -> AppResult<Json<ScheduleResponse>> {
    Ok(Json(state.schedules.update(id, payload).await?))
}

#[instrument(skip(state))]
pub async fn delete_schedule(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    state.schedules.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
