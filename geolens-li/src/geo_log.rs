//! In-memory scene-to-location mapping log
//!
//! A bounded append-only log of confirmed image-signature → geo-location
//! mappings, written only when a caller explicitly commits a result. Lookup
//! uses fuzzy label similarity so a later photo of the same subject can reuse
//! an earlier confirmed mapping.

use crate::types::Coordinate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

/// Maximum retained mappings; the oldest entry is evicted beyond this
pub const LOG_CAPACITY: usize = 1000;

/// Minimum similarity for a lookup to count as a match
pub const MATCH_THRESHOLD: f64 = 0.7;

const SCENE_WEIGHT: f64 = 0.4;
const LABEL_WEIGHT: f64 = 0.6;

/// Recognition signature of an image: its scene label plus the labels of
/// whatever was recognized in it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSignature {
    pub scene_label: String,
    pub labels: Vec<String>,
}

/// One committed signature-to-location mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoMapping {
    pub id: u64,
    pub scene_label: String,
    pub landmark_name: String,
    pub coordinate: Coordinate,
    pub region: String,
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
}

/// Mapping payload as submitted by a caller, before an id is assigned
#[derive(Debug, Clone, Deserialize)]
pub struct NewMapping {
    pub scene_label: String,
    pub landmark_name: String,
    pub coordinate: Coordinate,
    pub region: String,
    pub confidence: f32,
}

struct LogInner {
    entries: VecDeque<GeoMapping>,
    next_id: u64,
}

/// Bounded mapping log. Interior mutability keeps the handle shareable
/// across request handlers.
pub struct GeoMappingLog {
    inner: Mutex<LogInner>,
}

impl Default for GeoMappingLog {
    fn default() -> Self {
        Self::new()
    }
}

impl GeoMappingLog {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LogInner {
                entries: VecDeque::new(),
                next_id: 1,
            }),
        }
    }

    /// Append a mapping, evicting the oldest entry at capacity.
    ///
    /// Ids are monotonic for the life of the log and never reused, including
    /// after eviction. Append and eviction are atomic under one lock.
    pub fn commit(&self, mapping: NewMapping) -> GeoMapping {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = inner.next_id;
        inner.next_id += 1;

        let entry = GeoMapping {
            id,
            scene_label: mapping.scene_label,
            landmark_name: mapping.landmark_name,
            coordinate: mapping.coordinate,
            region: mapping.region,
            confidence: mapping.confidence.clamp(0.0, 1.0),
            created_at: Utc::now(),
        };
        inner.entries.push_back(entry.clone());
        if inner.entries.len() > LOG_CAPACITY {
            inner.entries.pop_front();
        }

        debug!(id = entry.id, landmark = %entry.landmark_name, "Committed geo mapping");
        entry
    }

    /// Mappings matching the signature, best first, at most `limit`.
    ///
    /// Ranked by similarity weighted by the stored mapping confidence;
    /// entries below the similarity threshold are excluded entirely.
    pub fn find_matching(&self, signature: &ImageSignature, limit: usize) -> Vec<GeoMapping> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut scored: Vec<(f64, &GeoMapping)> = inner
            .entries
            .iter()
            .filter_map(|entry| {
                let sim = similarity(entry, signature);
                (sim >= MATCH_THRESHOLD).then_some((sim * entry.confidence as f64, entry))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recent entries, newest first
    pub fn recent(&self, limit: usize) -> Vec<GeoMapping> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.iter().rev().take(limit).cloned().collect()
    }
}

/// Weighted signature similarity: exact scene-label equality plus the best
/// fuzzy distance between the stored landmark name and any signature label
fn similarity(entry: &GeoMapping, signature: &ImageSignature) -> f64 {
    let scene_score = if entry.scene_label == signature.scene_label {
        1.0
    } else {
        0.0
    };
    let label_score = signature
        .labels
        .iter()
        .map(|label| strsim::jaro_winkler(&entry.landmark_name, label))
        .fold(0.0f64, f64::max);
    SCENE_WEIGHT * scene_score + LABEL_WEIGHT * label_score
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn mapping(scene: &str, landmark: &str, confidence: f32) -> NewMapping {
        NewMapping {
            scene_label: scene.to_string(),
            landmark_name: landmark.to_string(),
            coordinate: Coordinate {
                lat: 30.335,
                lng: 112.235,
            },
            region: "荆州市荆州区".to_string(),
            confidence,
        }
    }

    fn signature(scene: &str, labels: &[&str]) -> ImageSignature {
        ImageSignature {
            scene_label: scene.to_string(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_ids_are_monotonic() {
        let log = GeoMappingLog::new();
        let a = log.commit(mapping("建筑", "荆州古城墙", 0.8));
        let b = log.commit(mapping("建筑", "荆州博物馆", 0.7));
        assert!(b.id > a.id);
    }

    #[test]
    fn test_capacity_eviction_keeps_ids_monotonic() {
        let log = GeoMappingLog::new();
        for i in 0..(LOG_CAPACITY + 10) {
            log.commit(mapping("建筑", &format!("地标{}", i), 0.5));
        }
        assert_eq!(log.len(), LOG_CAPACITY);
        // Oldest entries evicted; newest id reflects total commits
        let recent = log.recent(1);
        assert_eq!(recent[0].id, (LOG_CAPACITY + 10) as u64);
    }

    #[test]
    fn test_exact_match_found() {
        let log = GeoMappingLog::new();
        log.commit(mapping("建筑", "荆州古城墙", 0.8));
        let found = log.find_matching(&signature("建筑", &["荆州古城墙"]), 5);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].landmark_name, "荆州古城墙");
    }

    #[test]
    fn test_dissimilar_labels_do_not_match() {
        let log = GeoMappingLog::new();
        log.commit(mapping("建筑", "荆州古城墙", 0.8));
        let found = log.find_matching(&signature("水域", &["East Lake Plaza"]), 5);
        assert!(found.is_empty());
    }

    #[test]
    fn test_fuzzy_label_match_with_same_scene() {
        let log = GeoMappingLog::new();
        log.commit(mapping("建筑", "荆州古城墙", 0.8));
        // Same scene plus a near-identical label clears the threshold
        let found = log.find_matching(&signature("建筑", &["荆州古城墙东门"]), 5);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_higher_confidence_ranks_first() {
        let log = GeoMappingLog::new();
        log.commit(mapping("建筑", "荆州古城墙", 0.3));
        log.commit(mapping("建筑", "荆州古城墙", 0.9));
        let found = log.find_matching(&signature("建筑", &["荆州古城墙"]), 5);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].confidence, 0.9);
    }

    #[test]
    fn test_limit_respected() {
        let log = GeoMappingLog::new();
        for _ in 0..10 {
            log.commit(mapping("建筑", "荆州古城墙", 0.8));
        }
        assert_eq!(log.find_matching(&signature("建筑", &["荆州古城墙"]), 3).len(), 3);
    }

    #[test]
    fn test_concurrent_commits_produce_unique_ids() {
        let log = Arc::new(GeoMappingLog::new());
        let mut handles = Vec::new();
        for t in 0..8 {
            let log = Arc::clone(&log);
            handles.push(std::thread::spawn(move || {
                (0..50)
                    .map(|i| log.commit(mapping("建筑", &format!("地标{}-{}", t, i), 0.5)).id)
                    .collect::<Vec<u64>>()
            }));
        }
        let mut ids: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 400);
        assert_eq!(log.len(), 400);
    }
}
