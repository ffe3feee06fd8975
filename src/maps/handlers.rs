use axum::{extract::State, routing::get, Json, Router};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    error::{AppError, AppResult},
    extract::ApiQuery,
    maps::client::Place,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: Option<String>,
}

pub fn maps_routes() -> Router<AppState> {
    Router::new().route("/maps/search", get(search_places))
}

#[instrument(skip(state))]
pub async fn search_places(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> AppResult<Json<Vec<Place>>> {
    let query = params.query.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(AppError::validation("query parameter is required"));
    }
    let places = state.geocoder.search_places(query).await?;
    Ok(Json(places))
}
