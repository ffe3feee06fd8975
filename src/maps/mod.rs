use crate::state::AppState;
use axum::Router;

pub mod client;
pub mod handlers;

pub use client::{Geocoder, GoogleMapsClient, LatLng, Place};

pub fn router() -> Router<AppState> {
    handlers::maps_routes()
}
