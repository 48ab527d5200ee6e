//! geolens-li service entry point

use anyhow::Context;
use geolens_common::events::EventBus;
use geolens_li::api::{build_router, AppState};
use geolens_li::config::ServiceConfig;
use geolens_li::engine::LocationInferenceEngine;
use geolens_li::geo_log::GeoMappingLog;
use geolens_li::services::{
    HttpPlaceProvider, HttpTokenProvider, HttpVisionProvider, PlaceSearchClient, TokenService,
    VisionServiceClient,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServiceConfig::resolve().context("Failed to resolve configuration")?;

    let event_bus = EventBus::new(256);

    let token_provider =
        Arc::new(HttpTokenProvider::new(&config).context("Failed to build token provider")?);
    // Demo credentials pin the token service offline: fallback-only operation
    let token_service = TokenService::new(token_provider, config.demo_mode);

    let vision_provider =
        Arc::new(HttpVisionProvider::new(&config).context("Failed to build vision provider")?);
    let vision = VisionServiceClient::new(vision_provider, token_service, event_bus.clone());

    let place_provider =
        Arc::new(HttpPlaceProvider::new(&config).context("Failed to build place provider")?);
    let places = PlaceSearchClient::new(place_provider, event_bus.clone());

    // Shared with the router so committed mappings feed later inferences
    let geo_log = Arc::new(GeoMappingLog::new());
    let engine = Arc::new(LocationInferenceEngine::new(
        vision,
        places,
        geo_log.clone(),
        event_bus.clone(),
    ));

    let state = Arc::new(AppState {
        engine,
        geo_log,
        event_bus,
        started_at: Instant::now(),
    });

    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, demo_mode = config.demo_mode, "geolens-li listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .await
        .context("HTTP server terminated")?;

    Ok(())
}
