//! Confidence combiner and tri-state region decision
//!
//! Evidence from the three sources is combined additively on top of a fixed
//! base score, with per-source weights. The region decision is deterministic
//! with a strict precedence order:
//!
//! 1. an explicit administrative-district signal from a provider record
//! 2. a tier-1 keyword hit anywhere in the evidence
//! 3. the combined confidence against the confirmation threshold
//!
//! `Unknown` is produced only when zero evidence items were obtained;
//! obtained-but-unmatched evidence yields `Rejected`.

use crate::fusion::text_similarity::{KeywordTiers, TARGET_CITY};
use crate::types::{Poi, RegionMatch, UNKNOWN_REGION};

/// Fixed score assigned before any evidence is considered
pub const BASE_CONFIDENCE: f32 = 0.1;

/// Threshold above which combined confidence alone confirms the region
pub const CONFIRM_THRESHOLD: f32 = 0.5;

const TEXT_WEIGHT: f32 = 0.4;
const LANDMARK_WEIGHT: f32 = 0.3;
const POI_WEIGHT: f32 = 0.2;

/// POI name keyword containment contribution to relevance
const POI_NAME_WEIGHT: f32 = 0.8;

/// Cultural-category bonus contribution to relevance
const POI_CATEGORY_WEIGHT: f32 = 0.2;

/// Category substrings that mark a POI as culturally relevant
const CULTURAL_CATEGORIES: &[&str] = &["文化古迹", "风景名胜", "旅游景点"];

/// City names recognized when deriving a region label from an address
const KNOWN_CITIES: &[&str] = &["荆州", "北京", "上海", "广州", "深圳", "武汉"];

/// Per-source evidence summary fed into the combiner
#[derive(Debug, Clone, Default)]
pub struct EvidenceSignals {
    /// Keyword-tier score over OCR text, [0, 1]
    pub text_score: f32,
    /// Best recognized-landmark confidence, 0 when none
    pub landmark_score: f32,
    /// Best POI relevance, 0 when none
    pub poi_relevance: f32,
    /// Total count of evidence items obtained across all sources
    pub signal_count: usize,
    /// Tier-1 keyword hit anywhere in the evidence
    pub tier1_hit: bool,
    /// Explicit district signal from a provider record: Some(true) when a
    /// record places the subject in the target city, Some(false) when a
    /// record places it in a different known city, None when no record
    /// carries a usable district
    pub district_flag: Option<bool>,
}

/// Output of one combine step
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedAssessment {
    pub confidence: f32,
    pub region_match: RegionMatch,
}

/// Weighted additive evidence combiner
#[derive(Debug, Clone, Default)]
pub struct ConfidenceCombiner {
    tiers: KeywordTiers,
}

impl ConfidenceCombiner {
    pub fn new() -> Self {
        Self {
            tiers: KeywordTiers::new(),
        }
    }

    pub fn keyword_tiers(&self) -> &KeywordTiers {
        &self.tiers
    }

    /// Combine the evidence into a confidence score and region decision
    pub fn combine(&self, signals: &EvidenceSignals) -> CombinedAssessment {
        let confidence = (BASE_CONFIDENCE
            + signals.text_score * TEXT_WEIGHT
            + signals.landmark_score * LANDMARK_WEIGHT
            + signals.poi_relevance * POI_WEIGHT)
            .min(1.0);

        let region_match = if signals.signal_count == 0 {
            RegionMatch::Unknown
        } else {
            match signals.district_flag {
                Some(true) => RegionMatch::Confirmed,
                Some(false) => RegionMatch::Rejected,
                None if signals.tier1_hit => RegionMatch::Confirmed,
                None if confidence >= CONFIRM_THRESHOLD => RegionMatch::Confirmed,
                None => RegionMatch::Rejected,
            }
        };

        CombinedAssessment {
            confidence,
            region_match,
        }
    }

    /// Relevance of a POI to the target region: keyword containment in the
    /// name, plus a bonus for culturally relevant categories
    pub fn poi_relevance(&self, poi: &Poi) -> f32 {
        let name_hit = !self.tiers.matched_keywords(&poi.name).is_empty();
        let cultural = poi
            .category
            .as_deref()
            .map(|c| CULTURAL_CATEGORIES.iter().any(|m| c.contains(m)))
            .unwrap_or(false);

        let mut relevance = 0.0;
        if name_hit {
            relevance += POI_NAME_WEIGHT;
        }
        if cultural {
            relevance += POI_CATEGORY_WEIGHT;
        }
        relevance
    }

    /// Rank POIs by relevance, descending. Ties keep provider order.
    pub fn rank_pois(&self, pois: Vec<Poi>) -> Vec<(Poi, f32)> {
        let mut ranked: Vec<(Poi, f32)> = pois
            .into_iter()
            .map(|poi| {
                let relevance = self.poi_relevance(&poi);
                (poi, relevance)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}

/// Explicit district signal from a provider record: does its district or
/// address place the subject inside (or outside) the target city?
pub fn district_signal(district: Option<&str>, address: &str) -> Option<bool> {
    let haystack = match district {
        Some(d) if !d.is_empty() => format!("{}{}", d, address),
        _ => address.to_string(),
    };
    if haystack.contains("荆州") {
        return Some(true);
    }
    for city in KNOWN_CITIES.iter().skip(1) {
        if haystack.contains(city) {
            return Some(false);
        }
    }
    None
}

/// Derive a display region label from an address string, refining the target
/// city down to its district and township components when present.
pub fn determine_region(address: &str) -> String {
    if let Some(idx) = address.find(TARGET_CITY) {
        let tail = &address[idx + TARGET_CITY.len()..];
        return format!("{}{}", TARGET_CITY, admin_division(tail));
    }
    if address.contains("荆州") {
        return TARGET_CITY.to_string();
    }
    for city in KNOWN_CITIES.iter().skip(1) {
        if address.contains(city) {
            return format!("{}市", city);
        }
    }
    UNKNOWN_REGION.to_string()
}

/// Leading administrative-division components of an address tail: characters
/// up to the last district/county/township marker, stopping at the first
/// street-level marker.
fn admin_division(tail: &str) -> &str {
    const ADMIN: &[char] = &['区', '县', '镇', '乡'];
    const STREET: &[char] = &['路', '街', '巷', '道', '号'];

    let mut end = 0;
    for (i, c) in tail.char_indices() {
        if STREET.contains(&c) {
            break;
        }
        if ADMIN.contains(&c) {
            end = i + c.len_utf8();
        }
    }
    &tail[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinate;

    fn poi(name: &str, category: Option<&str>) -> Poi {
        Poi {
            name: name.to_string(),
            address: String::new(),
            coordinate: Coordinate {
                lat: 30.3,
                lng: 112.2,
            },
            category: category.map(String::from),
            district: None,
            age: None,
        }
    }

    #[test]
    fn test_no_signal_yields_base_and_unknown() {
        let combiner = ConfidenceCombiner::new();
        let assessment = combiner.combine(&EvidenceSignals::default());
        assert_eq!(assessment.confidence, BASE_CONFIDENCE);
        assert_eq!(assessment.region_match, RegionMatch::Unknown);
    }

    #[test]
    fn test_weak_signal_rejects_rather_than_unknown() {
        let combiner = ConfidenceCombiner::new();
        let assessment = combiner.combine(&EvidenceSignals {
            text_score: 0.15,
            signal_count: 1,
            ..Default::default()
        });
        assert_eq!(assessment.region_match, RegionMatch::Rejected);
        assert!(assessment.confidence < CONFIRM_THRESHOLD);
    }

    #[test]
    fn test_district_flag_overrides_threshold() {
        let combiner = ConfidenceCombiner::new();
        // Strong evidence but an explicit out-of-region district
        let assessment = combiner.combine(&EvidenceSignals {
            text_score: 1.0,
            landmark_score: 1.0,
            signal_count: 4,
            district_flag: Some(false),
            ..Default::default()
        });
        assert_eq!(assessment.region_match, RegionMatch::Rejected);

        // Weak evidence but an explicit in-region district
        let assessment = combiner.combine(&EvidenceSignals {
            landmark_score: 0.2,
            signal_count: 1,
            district_flag: Some(true),
            ..Default::default()
        });
        assert_eq!(assessment.region_match, RegionMatch::Confirmed);
    }

    #[test]
    fn test_tier1_hit_confirms_below_threshold() {
        let combiner = ConfidenceCombiner::new();
        let assessment = combiner.combine(&EvidenceSignals {
            text_score: 0.4,
            signal_count: 1,
            tier1_hit: true,
            ..Default::default()
        });
        assert!(assessment.confidence < CONFIRM_THRESHOLD);
        assert_eq!(assessment.region_match, RegionMatch::Confirmed);
    }

    #[test]
    fn test_threshold_confirms_without_flags() {
        let combiner = ConfidenceCombiner::new();
        let assessment = combiner.combine(&EvidenceSignals {
            text_score: 0.6,
            landmark_score: 0.8,
            signal_count: 3,
            ..Default::default()
        });
        assert!(assessment.confidence >= CONFIRM_THRESHOLD);
        assert_eq!(assessment.region_match, RegionMatch::Confirmed);
    }

    #[test]
    fn test_confidence_clamped() {
        let combiner = ConfidenceCombiner::new();
        let assessment = combiner.combine(&EvidenceSignals {
            text_score: 1.0,
            landmark_score: 1.0,
            poi_relevance: 1.0,
            signal_count: 9,
            ..Default::default()
        });
        assert!(assessment.confidence <= 1.0);
    }

    #[test]
    fn test_poi_relevance_components() {
        let combiner = ConfidenceCombiner::new();
        let both = combiner.poi_relevance(&poi("荆州博物馆", Some("旅游景点;博物馆")));
        let name_only = combiner.poi_relevance(&poi("章华寺", Some("宗教场所")));
        let category_only = combiner.poi_relevance(&poi("某公园", Some("风景名胜;公园")));
        let neither = combiner.poi_relevance(&poi("某餐厅", Some("餐饮服务")));

        assert_eq!(both, 1.0);
        assert_eq!(name_only, POI_NAME_WEIGHT);
        assert_eq!(category_only, POI_CATEGORY_WEIGHT);
        assert_eq!(neither, 0.0);
    }

    #[test]
    fn test_rank_pois_descending() {
        let combiner = ConfidenceCombiner::new();
        let ranked = combiner.rank_pois(vec![
            poi("某餐厅", None),
            poi("荆州古城墙", Some("风景名胜")),
            poi("某公园", Some("旅游景点")),
        ]);
        assert_eq!(ranked[0].0.name, "荆州古城墙");
        assert!(ranked[0].1 >= ranked[1].1 && ranked[1].1 >= ranked[2].1);
    }

    #[test]
    fn test_district_signal_precedence_inputs() {
        assert_eq!(district_signal(Some("荆州区"), ""), Some(true));
        assert_eq!(district_signal(None, "湖北省荆州市沙市区"), Some(true));
        assert_eq!(district_signal(None, "北京市朝阳区"), Some(false));
        assert_eq!(district_signal(None, "某地某处"), None);
    }

    #[test]
    fn test_determine_region_refines_district() {
        assert_eq!(
            determine_region("位于湖北省荆州市荆州区张居正街"),
            "荆州市荆州区"
        );
        assert_eq!(
            determine_region("位于湖北省荆州市沙市区太师渊路"),
            "荆州市沙市区"
        );
        assert_eq!(
            determine_region("位于湖北省荆州市荆州区川店镇"),
            "荆州市荆州区川店镇"
        );
        assert_eq!(determine_region("武汉市武昌区"), "武汉市");
        assert_eq!(determine_region("不知名地址"), UNKNOWN_REGION);
    }
}
