use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod status;

pub use repo::{BookingRepository, PgBookingRepository};
pub use services::BookingService;
pub use status::BookingStatus;

pub fn router() -> Router<AppState> {
    handlers::booking_routes()
}
