//! End-to-end router tests against an offline (fallback-only) pipeline

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use geolens_common::events::EventBus;
use geolens_li::api::{build_router, AppState};
use geolens_li::engine::LocationInferenceEngine;
use geolens_li::geo_log::GeoMappingLog;
use geolens_li::services::place_search::{PlaceProvider, RawPoi};
use geolens_li::services::token::{TokenProvider, TokenService};
use geolens_li::services::vision::VisionProvider;
use geolens_li::services::{PlaceSearchClient, VisionServiceClient};
use geolens_li::types::{
    AccessToken, Coordinate, RecognizedLandmark, SceneClassification, ServiceError,
};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceExt;

struct OfflineToken;

#[async_trait::async_trait]
impl TokenProvider for OfflineToken {
    async fn acquire(&self) -> Result<AccessToken, ServiceError> {
        Err(ServiceError::Network("offline".to_string()))
    }
}

struct UnreachableVision;

#[async_trait::async_trait]
impl VisionProvider for UnreachableVision {
    async fn detect_text(&self, _: &str, _: &str) -> Result<Vec<String>, ServiceError> {
        Err(ServiceError::Network("unreachable".to_string()))
    }
    async fn recognize_landmarks(
        &self,
        _: &str,
        _: &str,
    ) -> Result<Vec<RecognizedLandmark>, ServiceError> {
        Err(ServiceError::Network("unreachable".to_string()))
    }
    async fn classify_scene(
        &self,
        _: &str,
        _: &str,
    ) -> Result<Option<SceneClassification>, ServiceError> {
        Err(ServiceError::Network("unreachable".to_string()))
    }
}

struct EmptyPlaces;

#[async_trait::async_trait]
impl PlaceProvider for EmptyPlaces {
    async fn search_text(
        &self,
        _: &[String],
        _: Option<&str>,
    ) -> Result<Vec<RawPoi>, ServiceError> {
        Ok(Vec::new())
    }
    async fn search_around(
        &self,
        _: Coordinate,
        _: u32,
    ) -> Result<Vec<RawPoi>, ServiceError> {
        Ok(Vec::new())
    }
}

fn offline_router() -> Router {
    let event_bus = EventBus::new(64);
    let token_service = TokenService::new(Arc::new(OfflineToken), true);
    let vision = VisionServiceClient::new(
        Arc::new(UnreachableVision),
        token_service,
        event_bus.clone(),
    );
    let places = PlaceSearchClient::new(Arc::new(EmptyPlaces), event_bus.clone());
    let geo_log = Arc::new(GeoMappingLog::new());
    let engine = Arc::new(LocationInferenceEngine::new(
        vision,
        places,
        geo_log.clone(),
        event_bus.clone(),
    ));
    build_router(Arc::new(AppState {
        engine,
        geo_log,
        event_bus,
        started_at: Instant::now(),
    }))
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_reports_ok() {
    let router = offline_router();
    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_analyze_rejects_invalid_base64() {
    let router = offline_router();
    let response = router
        .oneshot(post_json(
            "/analyze",
            serde_json::json!({ "image_data": "not base64 !!!" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn test_analyze_fallback_bucket_zero() {
    let router = offline_router();
    // Bytes [1, 1, 1] (base64 "AQEB") select fallback bucket 0
    let response = router
        .oneshot(post_json(
            "/analyze",
            serde_json::json!({ "image_data": "AQEB" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["location"]["name"], "荆州古城墙");
    assert_eq!(body["region_match"], "confirmed");
    assert_eq!(body["region"], "荆州市荆州区");
    let confidence = body["location"]["confidence"].as_f64().unwrap();
    assert!((0.60..0.65).contains(&confidence));
}

#[tokio::test]
async fn test_analyze_data_url_prefix_accepted() {
    let router = offline_router();
    let response = router
        .oneshot(post_json(
            "/analyze",
            serde_json::json!({ "image_data": "data:image/png;base64,AQEB" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["location"]["name"], "荆州古城墙");
}

#[tokio::test]
async fn test_analyze_empty_payload_yields_unknown() {
    let router = offline_router();
    let response = router
        .oneshot(post_json(
            "/analyze",
            serde_json::json!({ "image_data": "" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["location"]["name"], "未知位置");
    assert_eq!(body["location"]["address"], "无法确定");
    assert_eq!(body["region_match"], "unknown");
    let confidence = body["location"]["confidence"].as_f64().unwrap();
    assert!((confidence - 0.1).abs() < 1e-6);
    assert_eq!(body["description"], "无法确定地点");
}

#[tokio::test]
async fn test_analyze_is_deterministic_across_requests() {
    let router = offline_router();
    let request = || {
        post_json(
            "/analyze",
            serde_json::json!({ "image_data": "aGVsbG8td29ybGQ=" }),
        )
    };

    let first = json_body(router.clone().oneshot(request()).await.unwrap()).await;
    let second = json_body(router.oneshot(request()).await.unwrap()).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_commit_mapping_assigns_monotonic_ids() {
    let router = offline_router();
    let mapping = serde_json::json!({
        "scene_label": "建筑",
        "landmark_name": "荆州古城墙",
        "coordinate": { "lat": 30.335, "lng": 112.235 },
        "region": "荆州市荆州区",
        "confidence": 0.8
    });

    let first = router
        .clone()
        .oneshot(post_json("/mappings", mapping.clone()))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(json_body(first).await["id"], 1);

    let second = router.oneshot(post_json("/mappings", mapping)).await.unwrap();
    assert_eq!(json_body(second).await["id"], 2);
}

#[tokio::test]
async fn test_commit_mapping_rejects_empty_landmark() {
    let router = offline_router();
    let response = router
        .oneshot(post_json(
            "/mappings",
            serde_json::json!({
                "scene_label": "建筑",
                "landmark_name": "  ",
                "coordinate": { "lat": 30.0, "lng": 112.0 },
                "region": "荆州市",
                "confidence": 0.5
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
