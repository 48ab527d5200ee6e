//! Evidence fusion
//!
//! Combines OCR text, landmark recognition, and POI search evidence into a
//! single confidence score and a tri-state target-region decision.

pub mod combiner;
pub mod text_similarity;

pub use combiner::{CombinedAssessment, ConfidenceCombiner, EvidenceSignals};
pub use text_similarity::KeywordTiers;
