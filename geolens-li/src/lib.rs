//! geolens-li — location inference service
//!
//! Infers where a photo was taken by fusing OCR text, landmark recognition,
//! scene classification, and POI search into a confidence-scored location
//! with a tri-state target-region decision. Every external provider call is
//! fallback-protected: an outage narrows the evidence, it never fails a
//! request.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod geo_log;
pub mod services;
pub mod types;

pub use api::{build_router, AppState};
pub use engine::LocationInferenceEngine;
