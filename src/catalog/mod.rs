use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use repo::{PgServiceRepository, ServiceRepository};
pub use services::ServiceCatalog;

pub fn router() -> Router<AppState> {
    handlers::service_routes()
}
