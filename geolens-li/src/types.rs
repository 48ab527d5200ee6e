//! Core types for the location-inference pipeline
//!
//! Data model shared by the service clients, the fusion layer, and the
//! inference engine. Everything here is created fresh per inference request
//! and never mutated after construction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel name for an unresolved location. Callers never need to
/// null-check: total pipeline failure yields this marker, not an absent
/// location.
pub const UNRESOLVED_LOCATION_NAME: &str = "未知位置";

/// Sentinel address for an unresolved location
pub const UNRESOLVED_ADDRESS: &str = "无法确定";

/// Sentinel region label when no administrative district was determined
pub const UNKNOWN_REGION: &str = "未知区域";

// ============================================================================
// Coordinates
// ============================================================================

/// Normalized geographic coordinate (WGS-84 style lat/lng pair)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

/// Coordinate as delivered by the place-search provider.
///
/// The provider is inconsistent: sometimes a packed `"lng,lat"` string,
/// sometimes a structured pair. Normalization fails closed — a POI whose
/// coordinate cannot be parsed is dropped, never defaulted to (0,0).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawCoordinate {
    /// Packed `"lng,lat"` string (note the lng-first ordering)
    Packed(String),
    /// Structured pair
    Pair { lat: f64, lng: f64 },
}

impl RawCoordinate {
    /// Normalize into a structured `(lat, lng)` pair.
    ///
    /// Returns None when the packed form is not two finite numbers.
    pub fn normalize(&self) -> Option<Coordinate> {
        match self {
            RawCoordinate::Pair { lat, lng } => Some(Coordinate {
                lat: *lat,
                lng: *lng,
            }),
            RawCoordinate::Packed(s) => {
                let mut parts = s.split(',');
                let lng: f64 = parts.next()?.trim().parse().ok()?;
                let lat: f64 = parts.next()?.trim().parse().ok()?;
                if parts.next().is_some() || !lat.is_finite() || !lng.is_finite() {
                    return None;
                }
                Some(Coordinate { lat, lng })
            }
        }
    }
}

// ============================================================================
// Signal types
// ============================================================================

/// Landmark recognized in the image.
///
/// Confidence is provider-reported (or fallback-estimated) and not guaranteed
/// calibrated; it is clamped to [0,1] at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedLandmark {
    pub name: String,
    pub confidence: f32,
    pub coordinate: Option<Coordinate>,
    pub description: Option<String>,
}

impl RecognizedLandmark {
    pub fn new(
        name: impl Into<String>,
        confidence: f32,
        coordinate: Option<Coordinate>,
        description: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            confidence: confidence.clamp(0.0, 1.0),
            coordinate,
            description,
        }
    }
}

/// Primary scene classification for the image (at most one label used)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneClassification {
    pub label: String,
    pub confidence: f32,
}

impl SceneClassification {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Place-of-interest record, coordinate already normalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub name: String,
    pub address: String,
    pub coordinate: Coordinate,
    pub category: Option<String>,
    pub district: Option<String>,
    /// Opening/construction era from provider business metadata, when present
    pub age: Option<String>,
}

// ============================================================================
// Result types
// ============================================================================

/// Tri-state target-region decision.
///
/// `Unknown` must not be conflated with `Rejected`: Unknown means no signal
/// of any kind was obtained; Rejected means signals were obtained but none
/// matched the target region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionMatch {
    Confirmed,
    Rejected,
    Unknown,
}

impl RegionMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionMatch::Confirmed => "confirmed",
            RegionMatch::Rejected => "rejected",
            RegionMatch::Unknown => "unknown",
        }
    }
}

/// The single best-guess location for the image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub name: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    pub confidence: f32,
}

impl ResolvedLocation {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        lat: f64,
        lng: f64,
        confidence: f32,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            lat,
            lng,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Sentinel location for total pipeline failure
    pub fn unresolved(confidence: f32) -> Self {
        Self::new(
            UNRESOLVED_LOCATION_NAME,
            UNRESOLVED_ADDRESS,
            0.0,
            0.0,
            confidence,
        )
    }
}

/// Landmark entry in the externally visible result (ranked)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkSummary {
    pub name: String,
    pub confidence: f32,
    pub description: Option<String>,
}

/// Building entry in the externally visible result (ranked)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub confidence: f32,
    pub age: Option<String>,
}

/// Externally visible output of one inference request.
///
/// `landmarks` and `buildings` are always sorted descending by confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationInferenceResult {
    pub location: ResolvedLocation,
    pub landmarks: Vec<LandmarkSummary>,
    pub buildings: Vec<BuildingSummary>,
    pub region: String,
    pub region_match: RegionMatch,
}

// ============================================================================
// Service errors and tokens
// ============================================================================

/// Errors produced by the vision and token services.
///
/// All of these are absorbed at the component boundary that produced them;
/// none propagate past the inference engine.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Provider unreachable or request timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Token issuance failed or provider rejected credentials
    #[error("Auth error: {0}")]
    Auth(String),

    /// Unexpected payload shape from the provider
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Access token for the vision provider.
///
/// `Offline` is the sentinel produced when token acquisition fails (or demo
/// credentials are configured): recognizers interpret it as "skip the network
/// call, go straight to fallback" rather than attempting a doomed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessToken {
    Bearer(String),
    Offline,
}

impl AccessToken {
    pub fn is_offline(&self) -> bool {
        matches!(self, AccessToken::Offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_confidence_clamping() {
        let lm = RecognizedLandmark::new("测试地标", 1.5, None, None);
        assert_eq!(lm.confidence, 1.0);

        let lm2 = RecognizedLandmark::new("测试地标", -0.5, None, None);
        assert_eq!(lm2.confidence, 0.0);
    }

    #[test]
    fn test_packed_coordinate_normalizes_lng_first() {
        let raw = RawCoordinate::Packed("112.2095,30.3602".to_string());
        let coord = raw.normalize().unwrap();
        assert_eq!(coord.lng, 112.2095);
        assert_eq!(coord.lat, 30.3602);
    }

    #[test]
    fn test_pair_coordinate_normalizes() {
        let raw = RawCoordinate::Pair {
            lat: 30.36,
            lng: 112.21,
        };
        assert_eq!(
            raw.normalize(),
            Some(Coordinate {
                lat: 30.36,
                lng: 112.21
            })
        );
    }

    #[test]
    fn test_unparseable_coordinate_fails_closed() {
        assert!(RawCoordinate::Packed("garbage".to_string())
            .normalize()
            .is_none());
        assert!(RawCoordinate::Packed("112.2".to_string()).normalize().is_none());
        assert!(RawCoordinate::Packed("1,2,3".to_string()).normalize().is_none());
        assert!(RawCoordinate::Packed("NaN,30.1".to_string())
            .normalize()
            .is_none());
    }

    #[test]
    fn test_unresolved_sentinel() {
        let loc = ResolvedLocation::unresolved(0.1);
        assert_eq!(loc.name, UNRESOLVED_LOCATION_NAME);
        assert_eq!(loc.address, UNRESOLVED_ADDRESS);
        assert_eq!(loc.confidence, 0.1);
    }

    #[test]
    fn test_region_match_serialization() {
        let json = serde_json::to_string(&RegionMatch::Unknown).unwrap();
        assert_eq!(json, "\"unknown\"");
        assert_ne!(RegionMatch::Unknown, RegionMatch::Rejected);
    }
}
