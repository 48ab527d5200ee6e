//! Location inference engine
//!
//! Orchestrates the phased pipeline: concurrent vision recognition, POI
//! search, then evidence fusion. `analyze` never fails — every provider
//! outage has already been absorbed by the service clients, and total failure
//! degrades to the unresolved-sentinel result.

use crate::fusion::combiner::{district_signal, determine_region, ConfidenceCombiner, EvidenceSignals};
use crate::fusion::text_similarity::TARGET_CITY;
use crate::geo_log::{GeoMapping, GeoMappingLog, ImageSignature};
use crate::services::{PlaceSearchClient, VisionServiceClient};
use crate::types::{
    BuildingSummary, Coordinate, LandmarkSummary, LocationInferenceResult, Poi,
    RecognizedLandmark, RegionMatch, ResolvedLocation, SceneClassification, UNKNOWN_REGION,
    UNRESOLVED_ADDRESS,
};
use geolens_common::events::{EventBus, PipelineEvent};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// City-center anchor for the radius-search fallback
pub const REGION_CENTER: Coordinate = Coordinate {
    lat: 30.3602,
    lng: 112.2095,
};

/// Radius (meters) for the fallback search around the region center
pub const FALLBACK_RADIUS_M: u32 = 5000;

/// Pipeline phase, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferencePhase {
    VisionRecognition,
    PlaceSearch,
    Fusion,
}

pub struct LocationInferenceEngine {
    vision: VisionServiceClient,
    places: PlaceSearchClient,
    combiner: ConfidenceCombiner,
    geo_log: Arc<GeoMappingLog>,
    event_bus: EventBus,
}

impl LocationInferenceEngine {
    pub fn new(
        vision: VisionServiceClient,
        places: PlaceSearchClient,
        geo_log: Arc<GeoMappingLog>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            vision,
            places,
            combiner: ConfidenceCombiner::new(),
            geo_log,
            event_bus,
        }
    }

    /// Run the full inference pipeline over one image.
    ///
    /// Infallible: degraded evidence narrows the result, it never aborts it.
    /// Cancellation short-circuits to the unresolved sentinel.
    pub async fn analyze(
        &self,
        image: &[u8],
        cancel: &CancellationToken,
    ) -> LocationInferenceResult {
        let request_id = Uuid::new_v4();
        self.event_bus.emit(PipelineEvent::AnalysisStarted {
            request_id,
            image_bytes: image.len(),
            timestamp: chrono::Utc::now(),
        });

        debug!(?request_id, phase = ?InferencePhase::VisionRecognition, "Starting vision recognition");
        let vision_ops = futures::future::join3(
            self.vision.detect_text(image, request_id),
            self.vision.recognize_landmarks(image, request_id),
            self.vision.classify_scene(image, request_id),
        );
        let (texts, landmarks, scene) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(?request_id, "Analysis cancelled during vision phase");
                return self.cancelled_result(request_id);
            }
            results = vision_ops => results,
        };

        debug!(?request_id, phase = ?InferencePhase::PlaceSearch, "Starting place search");
        let pois = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(?request_id, "Analysis cancelled during place search");
                return self.cancelled_result(request_id);
            }
            pois = self.search_places(&texts, &landmarks, request_id) => pois,
        };

        // Side-channel lookup: a previously committed mapping for a similar
        // signature counts as evidence. Read-only; nothing is written here.
        let mapping_hit = self.lookup_mapping(&texts, &landmarks, scene.as_ref());
        if let Some(hit) = &mapping_hit {
            debug!(?request_id, mapping_id = hit.id, "Matched a committed geo mapping");
        }

        debug!(?request_id, phase = ?InferencePhase::Fusion, "Fusing evidence");
        let result = self.fuse(&texts, &landmarks, scene.as_ref(), pois, mapping_hit);

        self.event_bus.emit(PipelineEvent::AnalysisCompleted {
            request_id,
            confidence: result.location.confidence,
            region_match: result.region_match.as_str().to_string(),
            timestamp: chrono::Utc::now(),
        });
        info!(
            ?request_id,
            location = %result.location.name,
            confidence = result.location.confidence,
            region_match = result.region_match.as_str(),
            "Analysis complete"
        );
        result
    }

    /// POI search keyed on the vision evidence. Keyword search first; when it
    /// comes back empty but the evidence already points at the target region,
    /// fall back to a radius search around the region center.
    async fn search_places(
        &self,
        texts: &[String],
        landmarks: &[RecognizedLandmark],
        request_id: Uuid,
    ) -> Vec<Poi> {
        let mut keywords: Vec<String> = texts.to_vec();
        for lm in landmarks {
            if !keywords.contains(&lm.name) {
                keywords.push(lm.name.clone());
            }
        }
        if keywords.is_empty() {
            return Vec::new();
        }

        let tiers = self.combiner.keyword_tiers();
        let plausibly_target = tiers.has_tier1_hit(&keywords);
        let city = plausibly_target.then_some(TARGET_CITY);

        let pois = self.places.search_text(&keywords, city, request_id).await;
        if pois.is_empty() && plausibly_target {
            debug!("Keyword search empty, falling back to radius search around region center");
            return self
                .places
                .search_around(REGION_CENTER, FALLBACK_RADIUS_M, request_id)
                .await;
        }
        pois
    }

    /// Best committed mapping matching this image's recognition signature
    fn lookup_mapping(
        &self,
        texts: &[String],
        landmarks: &[RecognizedLandmark],
        scene: Option<&SceneClassification>,
    ) -> Option<GeoMapping> {
        let labels: Vec<String> = landmarks
            .iter()
            .map(|lm| lm.name.clone())
            .chain(texts.iter().cloned())
            .collect();
        if labels.is_empty() && scene.is_none() {
            return None;
        }
        let signature = ImageSignature {
            scene_label: scene.map(|s| s.label.clone()).unwrap_or_default(),
            labels,
        };
        self.geo_log.find_matching(&signature, 1).into_iter().next()
    }

    fn fuse(
        &self,
        texts: &[String],
        landmarks: &[RecognizedLandmark],
        scene: Option<&SceneClassification>,
        pois: Vec<Poi>,
        mapping_hit: Option<GeoMapping>,
    ) -> LocationInferenceResult {
        let tiers = self.combiner.keyword_tiers();
        let ranked = self.combiner.rank_pois(pois);

        let signal_count = texts.len()
            + landmarks.len()
            + ranked.len()
            + usize::from(scene.is_some())
            + usize::from(mapping_hit.is_some());
        let landmark_score = landmarks
            .iter()
            .map(|lm| lm.confidence)
            .fold(0.0f32, f32::max);
        let tier1_hit = tiers.has_tier1_hit(texts)
            || landmarks.iter().any(|lm| tiers.contains_tier1(&lm.name));
        let district_flag = landmarks
            .iter()
            .filter_map(|lm| district_signal(None, lm.description.as_deref().unwrap_or("")))
            .next()
            .or_else(|| {
                ranked
                    .iter()
                    .filter_map(|(poi, _)| district_signal(poi.district.as_deref(), &poi.address))
                    .next()
            })
            .or_else(|| {
                mapping_hit
                    .as_ref()
                    .and_then(|hit| district_signal(None, &hit.region))
            });

        let signals = EvidenceSignals {
            text_score: tiers.score(texts),
            landmark_score,
            poi_relevance: ranked.first().map(|(_, r)| *r).unwrap_or(0.0),
            signal_count,
            tier1_hit,
            district_flag,
        };
        let assessment = self.combiner.combine(&signals);

        let by_confidence = |a: &&RecognizedLandmark, b: &&RecognizedLandmark| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        };
        // A coordinate-bearing landmark beats a coordinate-less one as the
        // canonical candidate; never silently invent a position for the
        // latter when a located alternative exists
        let best_landmark = landmarks
            .iter()
            .filter(|lm| lm.coordinate.is_some())
            .max_by(by_confidence)
            .or_else(|| landmarks.iter().max_by(by_confidence));

        // Canonical location: best-relevance POI carries the combined
        // evidence total; a landmark carries its own provider confidence.
        let (location, region_source) = if let Some((poi, _)) = ranked.first() {
            let source = format!(
                "{}{}",
                poi.district.as_deref().unwrap_or(""),
                poi.address
            );
            (
                ResolvedLocation::new(
                    &poi.name,
                    &poi.address,
                    poi.coordinate.lat,
                    poi.coordinate.lng,
                    assessment.confidence,
                ),
                source,
            )
        } else if let Some(lm) = best_landmark {
            let address = lm
                .description
                .as_deref()
                .map(|d| d.strip_prefix("位于").unwrap_or(d).to_string())
                .unwrap_or_else(|| UNRESOLVED_ADDRESS.to_string());
            // (0,0) is the same not-located sentinel the unresolved marker
            // uses; reached only when no landmark carries a coordinate
            let coord = lm.coordinate.unwrap_or(Coordinate { lat: 0.0, lng: 0.0 });
            let source = lm.description.clone().unwrap_or_default();
            (
                ResolvedLocation::new(&lm.name, address, coord.lat, coord.lng, lm.confidence),
                source,
            )
        } else if let Some(hit) = &mapping_hit {
            (
                ResolvedLocation::new(
                    &hit.landmark_name,
                    &hit.region,
                    hit.coordinate.lat,
                    hit.coordinate.lng,
                    assessment.confidence,
                ),
                hit.region.clone(),
            )
        } else if let Some(scene) = scene {
            (
                ResolvedLocation::new(
                    format!("可能是{}场景", scene.label),
                    UNRESOLVED_ADDRESS,
                    0.0,
                    0.0,
                    assessment.confidence,
                ),
                String::new(),
            )
        } else {
            (ResolvedLocation::unresolved(assessment.confidence), String::new())
        };

        let region = if region_source.is_empty() {
            UNKNOWN_REGION.to_string()
        } else {
            determine_region(&region_source)
        };

        let landmark_summaries = self.landmark_summaries(texts, landmarks, &ranked);
        let buildings = self.building_summaries(&ranked);

        LocationInferenceResult {
            location,
            landmarks: landmark_summaries,
            buildings,
            region,
            region_match: assessment.region_match,
        }
    }

    /// Merge recognized landmarks and the top-ranked POIs into the ranked
    /// landmark list. POI entries are scored by rank with a bonus when OCR
    /// text corroborates the name.
    fn landmark_summaries(
        &self,
        texts: &[String],
        landmarks: &[RecognizedLandmark],
        ranked: &[(Poi, f32)],
    ) -> Vec<LandmarkSummary> {
        let mut summaries: Vec<LandmarkSummary> = landmarks
            .iter()
            .map(|lm| LandmarkSummary {
                name: lm.name.clone(),
                confidence: lm.confidence,
                description: lm.description.clone(),
            })
            .collect();

        for (idx, (poi, _)) in ranked.iter().take(5).enumerate() {
            if summaries.iter().any(|s| s.name == poi.name) {
                continue;
            }
            let text_bonus = if texts.iter().any(|t| t.contains(&poi.name) || poi.name.contains(t))
            {
                0.15
            } else {
                0.0
            };
            let confidence = (0.8 - 0.05 * idx as f32 + text_bonus).clamp(0.0, 1.0);
            summaries.push(LandmarkSummary {
                name: poi.name.clone(),
                confidence,
                description: (!poi.address.is_empty()).then(|| poi.address.clone()),
            });
        }

        summaries.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        summaries
    }

    /// Top POIs presented as buildings, slightly boosted over their raw
    /// relevance
    fn building_summaries(&self, ranked: &[(Poi, f32)]) -> Vec<BuildingSummary> {
        let mut buildings: Vec<BuildingSummary> = ranked
            .iter()
            .take(3)
            .map(|(poi, relevance)| BuildingSummary {
                name: poi.name.clone(),
                kind: poi
                    .category
                    .as_deref()
                    .and_then(|c| c.split(';').next())
                    .unwrap_or("历史建筑")
                    .to_string(),
                confidence: (relevance + 0.05).clamp(0.0, 1.0),
                age: poi.age.clone(),
            })
            .collect();
        buildings.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        buildings
    }

    fn cancelled_result(&self, request_id: Uuid) -> LocationInferenceResult {
        self.event_bus.emit(PipelineEvent::AnalysisCompleted {
            request_id,
            confidence: crate::fusion::combiner::BASE_CONFIDENCE,
            region_match: RegionMatch::Unknown.as_str().to_string(),
            timestamp: chrono::Utc::now(),
        });
        LocationInferenceResult {
            location: ResolvedLocation::unresolved(crate::fusion::combiner::BASE_CONFIDENCE),
            landmarks: Vec::new(),
            buildings: Vec::new(),
            region: UNKNOWN_REGION.to_string(),
            region_match: RegionMatch::Unknown,
        }
    }
}
