//! Place-of-interest search client
//!
//! Keyword and radius search against an Amap-style REST endpoint. The client
//! normalizes every POI coordinate through [`RawCoordinate`] and drops records
//! that fail to normalize; errors are absorbed into an empty result set so the
//! inference engine can keep going on the remaining evidence.

use crate::config::ServiceConfig;
use crate::types::{Coordinate, Poi, RawCoordinate, ServiceError};
use geolens_common::events::{EventBus, PipelineEvent};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// POI category filter sent on keyword searches: cultural relics, scenic
/// spots, tourist attractions
const CATEGORY_FILTER: &str = "150700|150800|090100";

const PAGE_SIZE: u32 = 20;

/// Place-search provider seam
#[async_trait::async_trait]
pub trait PlaceProvider: Send + Sync {
    /// Keyword search, optionally narrowed to a city
    async fn search_text(
        &self,
        keywords: &[String],
        city: Option<&str>,
    ) -> Result<Vec<RawPoi>, ServiceError>;

    /// Radius search around a center point
    async fn search_around(
        &self,
        center: Coordinate,
        radius_m: u32,
    ) -> Result<Vec<RawPoi>, ServiceError>;
}

/// POI record exactly as the provider delivers it
#[derive(Debug, Clone, Deserialize)]
pub struct RawPoi {
    pub name: Option<String>,
    /// The provider emits an empty array instead of a string when no address
    /// is known, so this stays a raw value until extraction
    #[serde(default)]
    pub address: serde_json::Value,
    pub location: Option<RawCoordinate>,
    #[serde(rename = "type")]
    pub category: Option<String>,
    /// District name (`adname` in the provider payload)
    #[serde(rename = "adname")]
    pub district: Option<String>,
    #[serde(default)]
    pub biz_ext: BizExt,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BizExt {
    pub openday: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: Option<String>,
    #[serde(default)]
    pois: Vec<RawPoi>,
}

/// HTTP place provider (Amap-style GET endpoints)
pub struct HttpPlaceProvider {
    http_client: reqwest::Client,
    text_url: String,
    around_url: String,
    api_key: String,
}

impl HttpPlaceProvider {
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            text_url: config.endpoints.place_text_url.clone(),
            around_url: config.endpoints.place_around_url.clone(),
            api_key: config.place_api_key.clone(),
        })
    }

    async fn get(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<RawPoi>, ServiceError> {
        let response = self
            .http_client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let status = response.status();
        if status == 401 || status == 403 {
            return Err(ServiceError::Auth(format!("place endpoint status {}", status)));
        }
        if !status.is_success() {
            return Err(ServiceError::Network(format!(
                "place endpoint status {}",
                status
            )));
        }

        let payload: SearchResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::MalformedResponse(e.to_string()))?;

        // status "1" is success; anything else is an in-band provider error
        // carrying no POIs
        if payload.status.as_deref() != Some("1") {
            return Ok(Vec::new());
        }
        Ok(payload.pois)
    }
}

#[async_trait::async_trait]
impl PlaceProvider for HttpPlaceProvider {
    async fn search_text(
        &self,
        keywords: &[String],
        city: Option<&str>,
    ) -> Result<Vec<RawPoi>, ServiceError> {
        let joined = keywords.join("|");
        let page_size = PAGE_SIZE.to_string();
        let mut params = vec![
            ("key", self.api_key.as_str()),
            ("keywords", joined.as_str()),
            ("types", CATEGORY_FILTER),
            ("offset", page_size.as_str()),
            ("page", "1"),
            ("extensions", "all"),
        ];
        if let Some(city) = city {
            params.push(("city", city));
        }
        self.get(&self.text_url, &params).await
    }

    async fn search_around(
        &self,
        center: Coordinate,
        radius_m: u32,
    ) -> Result<Vec<RawPoi>, ServiceError> {
        // lng-first packed form, as the provider expects
        let location = format!("{},{}", center.lng, center.lat);
        let radius = radius_m.to_string();
        let page_size = PAGE_SIZE.to_string();
        let params = [
            ("key", self.api_key.as_str()),
            ("location", location.as_str()),
            ("radius", radius.as_str()),
            ("offset", page_size.as_str()),
            ("page", "1"),
            ("extensions", "all"),
        ];
        self.get(&self.around_url, &params).await
    }
}

/// Normalize one provider record into a [`Poi`].
///
/// Fails closed: a record without a name, or whose coordinate does not parse,
/// is dropped rather than defaulted.
pub fn normalize_poi(raw: RawPoi) -> Option<Poi> {
    let name = raw.name.filter(|n| !n.trim().is_empty())?;
    let coordinate = raw.location.as_ref()?.normalize()?;
    let address = raw
        .address
        .as_str()
        .map(String::from)
        .unwrap_or_default();

    Some(Poi {
        name,
        address,
        coordinate,
        category: raw.category,
        district: raw.district,
        age: raw.biz_ext.openday,
    })
}

/// Place search client with absorb-to-empty error semantics
#[derive(Clone)]
pub struct PlaceSearchClient {
    provider: Arc<dyn PlaceProvider>,
    event_bus: EventBus,
}

impl PlaceSearchClient {
    pub fn new(provider: Arc<dyn PlaceProvider>, event_bus: EventBus) -> Self {
        Self {
            provider,
            event_bus,
        }
    }

    /// Keyword search. Never fails; provider errors yield an empty set.
    pub async fn search_text(
        &self,
        keywords: &[String],
        city: Option<&str>,
        request_id: Uuid,
    ) -> Vec<Poi> {
        if keywords.is_empty() {
            return Vec::new();
        }
        match self.provider.search_text(keywords, city).await {
            Ok(raw) => self.normalize_all(raw),
            Err(e) => {
                self.absorb("place_text", request_id, &e);
                Vec::new()
            }
        }
    }

    /// Radius search. Never fails; provider errors yield an empty set.
    pub async fn search_around(
        &self,
        center: Coordinate,
        radius_m: u32,
        request_id: Uuid,
    ) -> Vec<Poi> {
        match self.provider.search_around(center, radius_m).await {
            Ok(raw) => self.normalize_all(raw),
            Err(e) => {
                self.absorb("place_around", request_id, &e);
                Vec::new()
            }
        }
    }

    fn absorb(&self, provider: &str, request_id: Uuid, error: &ServiceError) {
        warn!(provider = provider, error = %error, "Place search failed, returning no POIs");
        self.event_bus.emit(PipelineEvent::ProviderError {
            request_id,
            provider: provider.to_string(),
            reason: error.to_string(),
            timestamp: chrono::Utc::now(),
        });
        self.event_bus.emit(PipelineEvent::ProviderFallback {
            request_id,
            provider: provider.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }

    fn normalize_all(&self, raw: Vec<RawPoi>) -> Vec<Poi> {
        let total = raw.len();
        let pois: Vec<Poi> = raw.into_iter().filter_map(normalize_poi).collect();
        if pois.len() < total {
            debug!(
                dropped = total - pois.len(),
                "Dropped POIs with unusable coordinates or names"
            );
        }
        pois
    }
}
