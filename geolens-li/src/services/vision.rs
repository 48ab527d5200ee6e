//! Vision provider client
//!
//! Wraps the three vision endpoints (OCR text detection, landmark
//! recognition, scene recognition) with immediate-fallback semantics: on any
//! `ServiceError` the operation substitutes the deterministic fallback
//! derived from the image byte prefix instead of propagating the error.

use crate::config::ServiceConfig;
use crate::services::fallback;
use crate::services::token::TokenService;
use crate::types::{Coordinate, RecognizedLandmark, SceneClassification, ServiceError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use geolens_common::events::{EventBus, PipelineEvent};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Vision endpoint provider seam.
///
/// Implementations take the already-encoded base64 image payload; the client
/// owns token handling and fallback substitution.
#[async_trait::async_trait]
pub trait VisionProvider: Send + Sync {
    async fn detect_text(&self, token: &str, image_b64: &str)
        -> Result<Vec<String>, ServiceError>;

    async fn recognize_landmarks(
        &self,
        token: &str,
        image_b64: &str,
    ) -> Result<Vec<RecognizedLandmark>, ServiceError>;

    async fn classify_scene(
        &self,
        token: &str,
        image_b64: &str,
    ) -> Result<Option<SceneClassification>, ServiceError>;
}

// ============================================================================
// HTTP provider
// ============================================================================

#[derive(Debug, Deserialize)]
struct OcrResponse {
    words_result: Option<Vec<OcrWord>>,
}

#[derive(Debug, Deserialize)]
struct OcrWord {
    words: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SceneResponse {
    result: Option<Vec<SceneItem>>,
}

#[derive(Debug, Deserialize)]
struct SceneItem {
    scene_name: Option<String>,
    score: Option<f32>,
}

/// HTTP vision provider (Baidu-style form POST endpoints)
pub struct HttpVisionProvider {
    http_client: reqwest::Client,
    ocr_url: String,
    landmark_url: String,
    scene_url: String,
}

impl HttpVisionProvider {
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            ocr_url: config.endpoints.ocr_url.clone(),
            landmark_url: config.endpoints.landmark_url.clone(),
            scene_url: config.endpoints.scene_url.clone(),
        })
    }

    async fn post_form(
        &self,
        url: &str,
        token: &str,
        image_b64: &str,
    ) -> Result<serde_json::Value, ServiceError> {
        let response = self
            .http_client
            .post(url)
            .query(&[("access_token", token)])
            .form(&[("image", image_b64), ("baike_num", "1")])
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let status = response.status();
        if status == 401 || status == 403 {
            return Err(ServiceError::Auth(format!("vision endpoint status {}", status)));
        }
        if !status.is_success() {
            return Err(ServiceError::Network(format!(
                "vision endpoint status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::MalformedResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl VisionProvider for HttpVisionProvider {
    async fn detect_text(
        &self,
        token: &str,
        image_b64: &str,
    ) -> Result<Vec<String>, ServiceError> {
        let value = self.post_form(&self.ocr_url, token, image_b64).await?;
        let payload: OcrResponse = serde_json::from_value(value)
            .map_err(|e| ServiceError::MalformedResponse(e.to_string()))?;

        Ok(payload
            .words_result
            .unwrap_or_default()
            .into_iter()
            .filter_map(|w| w.words)
            .collect())
    }

    async fn recognize_landmarks(
        &self,
        token: &str,
        image_b64: &str,
    ) -> Result<Vec<RecognizedLandmark>, ServiceError> {
        let value = self.post_form(&self.landmark_url, token, image_b64).await?;
        Ok(parse_landmark_payload(&value))
    }

    async fn classify_scene(
        &self,
        token: &str,
        image_b64: &str,
    ) -> Result<Option<SceneClassification>, ServiceError> {
        let value = self.post_form(&self.scene_url, token, image_b64).await?;
        let payload: SceneResponse = serde_json::from_value(value)
            .map_err(|e| ServiceError::MalformedResponse(e.to_string()))?;

        Ok(payload
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|item| {
                item.scene_name
                    .map(|label| SceneClassification::new(label, item.score.unwrap_or(0.3)))
            }))
    }
}

/// Parse the landmark payload, tolerating both array-shaped and
/// single-object `result` fields (the provider uses both).
pub fn parse_landmark_payload(value: &serde_json::Value) -> Vec<RecognizedLandmark> {
    let result = &value["result"];
    let items: Vec<&serde_json::Value> = if let Some(array) = result.as_array() {
        array.iter().collect()
    } else if result.is_object() {
        vec![result]
    } else {
        Vec::new()
    };

    items
        .into_iter()
        .filter_map(|item| {
            let name = item["landmark"]
                .as_str()
                .or_else(|| item["keyword"].as_str())?;
            let confidence = item["probability"]
                .as_f64()
                .or_else(|| item["score"].as_f64())
                .unwrap_or(0.5) as f32;

            // `location` is an address string in some payloads and a lat/lng
            // object in others
            let coordinate = match (&item["location"]["lat"], &item["location"]["lng"]) {
                (serde_json::Value::Number(lat), serde_json::Value::Number(lng)) => {
                    Some(Coordinate {
                        lat: lat.as_f64()?,
                        lng: lng.as_f64()?,
                    })
                }
                _ => None,
            };
            let description = item["location"]
                .as_str()
                .map(|s| format!("位于{}", s))
                .or_else(|| item["baike_info"]["description"].as_str().map(String::from));

            Some(RecognizedLandmark::new(name, confidence, coordinate, description))
        })
        .collect()
}

// ============================================================================
// Fallback-wrapped client
// ============================================================================

/// Vision service client with immediate-fallback semantics.
///
/// Every operation acquires a token first; an Offline token skips the network
/// call entirely. Any provider error is absorbed here and substituted with
/// the deterministic byte-prefix fallback.
#[derive(Clone)]
pub struct VisionServiceClient {
    provider: Arc<dyn VisionProvider>,
    token_service: TokenService,
    event_bus: EventBus,
}

impl VisionServiceClient {
    pub fn new(
        provider: Arc<dyn VisionProvider>,
        token_service: TokenService,
        event_bus: EventBus,
    ) -> Self {
        Self {
            provider,
            token_service,
            event_bus,
        }
    }

    /// Extract text from the image (OCR). Never fails.
    pub async fn detect_text(&self, image: &[u8], request_id: Uuid) -> Vec<String> {
        let image_b64 = BASE64.encode(image);
        match self.token_service.acquire().await {
            crate::types::AccessToken::Bearer(token) => {
                match self.provider.detect_text(&token, &image_b64).await {
                    Ok(texts) => {
                        debug!(count = texts.len(), "OCR text detection succeeded");
                        texts
                    }
                    Err(e) => {
                        self.absorb("ocr", request_id, &e);
                        fallback::fallback_text(image)
                    }
                }
            }
            crate::types::AccessToken::Offline => {
                self.engage_fallback("ocr", request_id);
                fallback::fallback_text(image)
            }
        }
    }

    /// Recognize landmark structures in the image. Never fails.
    pub async fn recognize_landmarks(
        &self,
        image: &[u8],
        request_id: Uuid,
    ) -> Vec<RecognizedLandmark> {
        let image_b64 = BASE64.encode(image);
        match self.token_service.acquire().await {
            crate::types::AccessToken::Bearer(token) => {
                match self.provider.recognize_landmarks(&token, &image_b64).await {
                    Ok(landmarks) => {
                        debug!(count = landmarks.len(), "Landmark recognition succeeded");
                        landmarks
                    }
                    Err(e) => {
                        self.absorb("landmark", request_id, &e);
                        fallback::fallback_landmarks(image)
                    }
                }
            }
            crate::types::AccessToken::Offline => {
                self.engage_fallback("landmark", request_id);
                fallback::fallback_landmarks(image)
            }
        }
    }

    /// Classify the primary scene of the image. Never fails.
    pub async fn classify_scene(
        &self,
        image: &[u8],
        request_id: Uuid,
    ) -> Option<SceneClassification> {
        let image_b64 = BASE64.encode(image);
        match self.token_service.acquire().await {
            crate::types::AccessToken::Bearer(token) => {
                match self.provider.classify_scene(&token, &image_b64).await {
                    Ok(scene) => scene,
                    Err(e) => {
                        self.absorb("scene", request_id, &e);
                        fallback::fallback_scene(image)
                    }
                }
            }
            crate::types::AccessToken::Offline => {
                self.engage_fallback("scene", request_id);
                fallback::fallback_scene(image)
            }
        }
    }

    fn absorb(&self, provider: &str, request_id: Uuid, error: &ServiceError) {
        warn!(provider = provider, error = %error, "Provider call failed, engaging fallback");
        self.event_bus.emit(PipelineEvent::ProviderError {
            request_id,
            provider: provider.to_string(),
            reason: error.to_string(),
            timestamp: chrono::Utc::now(),
        });
        self.engage_fallback(provider, request_id);
    }

    fn engage_fallback(&self, provider: &str, request_id: Uuid) {
        self.event_bus.emit(PipelineEvent::ProviderFallback {
            request_id,
            provider: provider.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }
}
