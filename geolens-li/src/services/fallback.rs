//! Deterministic fallback substitutes for vision-provider outages
//!
//! When a provider call fails, the vision client substitutes a canned result
//! selected by a hash over the image byte prefix. The substitution is pure:
//! the same byte prefix always produces the bit-identical result.
//!
//! # Hash and bucket arithmetic
//! - `prefix_hash`: wrapping additive sum of the first [`HASH_PREFIX_LEN`]
//!   byte values (u32). Bucket selection is `hash % BUCKET_COUNT`.
//! - [`Lcg`]: linear congruential generator
//!   `state = (state * 9301 + 49297) mod 233280`, used for bounded score
//!   jitter inside a bucket.
//!
//! Empty input has no derivable hash: every generator returns an empty
//! result, which the combiner reports as "no signal obtained".

use crate::types::{Coordinate, RecognizedLandmark, SceneClassification};

/// Number of leading image bytes hashed for bucket selection
pub const HASH_PREFIX_LEN: usize = 100;

/// Number of canned fallback buckets per result type
pub const BUCKET_COUNT: u32 = 3;

/// Wrapping additive hash over the image byte prefix.
///
/// Returns None for empty input (no hash-derivable fallback exists).
pub fn prefix_hash(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() {
        return None;
    }
    let hash = bytes
        .iter()
        .take(HASH_PREFIX_LEN)
        .fold(0u32, |acc, &b| acc.wrapping_add(b as u32));
    Some(hash)
}

/// Linear congruential generator seeded from the prefix hash.
///
/// Same constants as the classic `9301/49297/233280` LCG; `next_bounded(max)`
/// maps the state uniformly-enough into `0..max`.
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(seed: u32) -> Self {
        Self { state: seed as u64 }
    }

    pub fn next_bounded(&mut self, max: u32) -> u32 {
        self.state = (self.state * 9301 + 49297) % 233280;
        ((self.state * max as u64) / 233280) as u32
    }
}

/// Canned OCR text per bucket
pub fn fallback_text(bytes: &[u8]) -> Vec<String> {
    let Some(hash) = prefix_hash(bytes) else {
        return Vec::new();
    };
    let texts: &[&str] = match hash % BUCKET_COUNT {
        0 => &["荆州古城", "荆州博物馆", "荆州城墙", "湖北省荆州市"],
        1 => &["章华寺", "荆州", "湖北省荆州市沙市区"],
        _ => &["楚王车马阵", "荆州", "湖北省荆州市荆州区川店镇"],
    };
    texts.iter().map(|s| s.to_string()).collect()
}

/// Canned landmark set per bucket.
///
/// Jitter arithmetic mirrors the demo provider: `(hash % 5) / 100` on the
/// primary confidence, `(hash % 3) / 100` on the secondary, `(hash % 5) /
/// 1000` on coordinates. Primary confidences land in [0.58, 0.67).
pub fn fallback_landmarks(bytes: &[u8]) -> Vec<RecognizedLandmark> {
    let Some(hash) = prefix_hash(bytes) else {
        return Vec::new();
    };
    let jitter5 = (hash % 5) as f64 / 1000.0;
    let conf5 = (hash % 5) as f32 / 100.0;
    let conf3 = (hash % 3) as f32 / 100.0;

    match hash % BUCKET_COUNT {
        0 => vec![
            RecognizedLandmark::new(
                "荆州古城墙",
                0.60 + conf5,
                Some(Coordinate {
                    lat: 30.335 + jitter5,
                    lng: 112.235 + jitter5,
                }),
                Some("位于湖北省荆州市荆州区张居正街".to_string()),
            ),
            RecognizedLandmark::new(
                "荆州博物馆",
                0.50 + conf3,
                Some(Coordinate {
                    lat: 30.332,
                    lng: 112.241,
                }),
                Some("位于湖北省荆州市荆州区".to_string()),
            ),
        ],
        1 => vec![
            RecognizedLandmark::new(
                "章华寺",
                0.62 + conf5,
                Some(Coordinate {
                    lat: 30.320 + jitter5,
                    lng: 112.210 + jitter5,
                }),
                Some("位于湖北省荆州市沙市区太师渊路".to_string()),
            ),
            RecognizedLandmark::new(
                "沙隆达广场",
                0.55 + conf3,
                Some(Coordinate {
                    lat: 30.315,
                    lng: 112.215,
                }),
                Some("位于湖北省荆州市沙市区".to_string()),
            ),
        ],
        _ => vec![
            RecognizedLandmark::new(
                "楚王车马阵",
                0.58 + conf5,
                Some(Coordinate {
                    lat: 30.410 + jitter5,
                    lng: 112.160 + jitter5,
                }),
                Some("位于湖北省荆州市荆州区川店镇".to_string()),
            ),
            RecognizedLandmark::new(
                "熊家冢遗址博物馆",
                0.52 + conf3,
                Some(Coordinate {
                    lat: 30.415,
                    lng: 112.155,
                }),
                Some("位于湖北省荆州市荆州区川店镇".to_string()),
            ),
        ],
    }
}

/// Canned primary scene label per bucket
pub fn fallback_scene(bytes: &[u8]) -> Option<SceneClassification> {
    let hash = prefix_hash(bytes)?;
    let label = match hash % BUCKET_COUNT {
        0 => "建筑",
        1 => "宗教场所",
        _ => "历史遗址",
    };
    let mut lcg = Lcg::new(hash);
    // Bounded jitter: confidence stays inside [0.60, 0.80)
    let confidence = 0.60 + lcg.next_bounded(20) as f32 / 100.0;
    Some(SceneClassification::new(label, confidence))
}
