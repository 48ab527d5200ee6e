//! Service clients for external providers
//!
//! Each client absorbs its own provider failures: the inference engine never
//! sees a `ServiceError`, only substituted fallback data or empty results.

pub mod fallback;
pub mod place_search;
pub mod token;
pub mod vision;

pub use place_search::{HttpPlaceProvider, PlaceProvider, PlaceSearchClient};
pub use token::{HttpTokenProvider, TokenProvider, TokenService};
pub use vision::{HttpVisionProvider, VisionProvider, VisionServiceClient};
