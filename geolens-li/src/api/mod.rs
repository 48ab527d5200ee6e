//! HTTP API surface
//!
//! Three routes: `POST /analyze` runs the inference pipeline over a base64
//! image payload, `POST /mappings` explicitly commits a confirmed mapping
//! into the geo-mapping log, `GET /health` reports liveness. The engine
//! itself never fails; the only client-visible error is malformed input.

use crate::engine::LocationInferenceEngine;
use crate::error::ApiError;
use crate::geo_log::{GeoMappingLog, NewMapping};
use crate::types::{LocationInferenceResult, RegionMatch};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use geolens_common::events::{EventBus, PipelineEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Shared state for all request handlers
pub struct AppState {
    pub engine: Arc<LocationInferenceEngine>,
    pub geo_log: Arc<GeoMappingLog>,
    pub event_bus: EventBus,
    pub started_at: Instant,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/mappings", post(commit_mapping))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    /// Base64 image payload, with or without a `data:image/*;base64,` prefix
    pub image_data: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: LocationInferenceResult,
    pub description: String,
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let image = decode_image_payload(&request.image_data)?;

    let cancel = CancellationToken::new();
    let result = state.engine.analyze(&image, &cancel).await;
    let description = describe_result(&result);

    Ok(Json(AnalyzeResponse {
        success: true,
        result,
        description,
    }))
}

/// Strip any data-URL prefix and decode the base64 payload.
///
/// An empty payload is accepted: the engine degrades it to the unresolved
/// sentinel rather than rejecting the request.
fn decode_image_payload(image_data: &str) -> Result<Vec<u8>, ApiError> {
    let encoded = image_data
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(',').map(|(_, body)| body))
        .unwrap_or(image_data);

    BASE64
        .decode(encoded.trim())
        .map_err(|e| ApiError::InvalidRequest(format!("image_data is not valid base64: {}", e)))
}

/// Human-readable one-line description of an inference result
pub fn describe_result(result: &LocationInferenceResult) -> String {
    if result.region_match == RegionMatch::Unknown {
        return "无法确定地点".to_string();
    }

    let grade = if result.location.confidence > 0.9 {
        "高度匹配"
    } else if result.location.confidence > 0.7 {
        "中度匹配"
    } else {
        "初步匹配"
    };

    let mut description = format!("{}：{}", grade, result.location.name);
    if let Some(landmark) = result.landmarks.first() {
        if landmark.name != result.location.name {
            description.push_str(&format!("，附近有{}", landmark.name));
        }
    }
    match result.region_match {
        RegionMatch::Confirmed => description.push_str(&format!("，位于{}", result.region)),
        RegionMatch::Rejected => description.push_str("（非荆州地区）"),
        RegionMatch::Unknown => {}
    }
    description
}

#[derive(Debug, Serialize)]
struct CommitResponse {
    id: u64,
}

async fn commit_mapping(
    State(state): State<Arc<AppState>>,
    Json(mapping): Json<NewMapping>,
) -> Result<Json<CommitResponse>, ApiError> {
    if mapping.landmark_name.trim().is_empty() {
        return Err(ApiError::InvalidRequest(
            "landmark_name must not be empty".to_string(),
        ));
    }

    let entry = state.geo_log.commit(mapping);
    state.event_bus.emit(PipelineEvent::MappingCommitted {
        mapping_id: entry.id,
        timestamp: chrono::Utc::now(),
    });
    info!(id = entry.id, "Mapping committed via API");

    Ok(Json(CommitResponse { id: entry.id }))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
