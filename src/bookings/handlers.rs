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
    bookings::dto::{BookingResponse, CreateBookingRequest, UpdateBookingRequest},
    error::AppResult,
    extract::{ApiJson, ApiPath, ApiQuery},
    pagination::Pagination,
    state::AppState,
};

pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", get(list_bookings).post(create_booking))
        .route(
            "/bookings/:id",
            get(get_booking).put(update_booking).delete(delete_booking),
        )
        .route("/me/bookings", get(my_bookings))
}

#[instrument(skip(state))]
pub async fn list_bookings(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> AppResult<Json<Vec<BookingResponse>>> {
    Ok(Json(state.bookings.list(page).await?))
}

#[instrument(skip(state))]
pub async fn get_booking(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    Ok(Json(state.bookings.get(id).await?))
}

#[instrument(skip(state))]
pub async fn my_bookings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiQuery(page): ApiQuery<Pagination>,
) -> AppResult<Json<Vec<BookingResponse>>> {
    Ok(Json(state.bookings.list_for_user(user_id, page).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_booking(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<CreateBookingRequest>,
) -> AppResult<(StatusCode, Json<BookingResponse>)> {
    let booking = state.bookings.create(user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

#[instrument(skip(state, payload))]
pub async fn update_booking(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateBookingRequest>,
) -> AppResult<Json<BookingResponse>> {
    Ok(Json(state.bookings.update(user_id, id, payload).await?))
}

#[instrument(skip(state))]
pub async fn delete_booking(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    state.bookings.delete(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
