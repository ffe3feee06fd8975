use std::sync::Arc;

use chronospace::{
    app,
    config::AppConfig,
    db,
    maps::{Geocoder, GoogleMapsClient},
    state::{AppState, Repositories},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "chronospace=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!(env = %config.env_type, "configuration loaded");

    let pool = db::connect(&config).await?;
    db::migrate(&pool).await;

    let geocoder: Arc<dyn Geocoder> = Arc::new(GoogleMapsClient::new(&config.geocoding)?);
    let state = AppState::from_parts(config.clone(), Repositories::postgres(pool.clone()), geocoder)?;

    let app = app::build_app(state);
    app::serve(app, &config).await?;

    pool.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}
