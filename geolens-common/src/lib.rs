//! Shared types for GeoLens services
//!
//! Common error type, configuration resolution, and the pipeline event bus
//! used by the location-inference service.

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
