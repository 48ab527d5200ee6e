//! Service configuration for geolens-li
//!
//! Resolves provider credentials and endpoints into an explicit
//! [`ServiceConfig`] that is constructor-injected into every client. There is
//! no process-wide configuration singleton.

use geolens_common::config::{is_demo_key, resolve_credential, TomlConfig};
use geolens_common::{Error, Result};
use tracing::warn;

/// Default HTTP listen port
pub const DEFAULT_PORT: u16 = 5731;

/// Default outbound request timeout (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Provider endpoint URLs
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    /// OAuth-style token issuance endpoint (credentials in, bearer token out)
    pub token_url: String,
    /// General OCR endpoint
    pub ocr_url: String,
    /// Landmark recognition endpoint
    pub landmark_url: String,
    /// Scene recognition endpoint
    pub scene_url: String,
    /// Keyword place search endpoint
    pub place_text_url: String,
    /// Radius place search endpoint
    pub place_around_url: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            token_url: "https://aip.baidubce.com/oauth/2.0/token".to_string(),
            ocr_url: "https://aip.baidubce.com/rest/2.0/ocr/v1/general_basic".to_string(),
            landmark_url: "https://aip.baidubce.com/rest/2.0/image-classify/v1/landmark"
                .to_string(),
            scene_url: "https://aip.baidubce.com/rest/2.0/image-classify/v1/scene".to_string(),
            place_text_url: "https://restapi.amap.com/v3/place/text".to_string(),
            place_around_url: "https://restapi.amap.com/v3/place/around".to_string(),
        }
    }
}

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Place-search provider API key
    pub place_api_key: String,
    /// Vision provider API key
    pub vision_api_key: String,
    /// Vision provider secret
    pub vision_secret: String,
    /// Provider endpoint URLs
    pub endpoints: ProviderEndpoints,
    /// Outbound request timeout (seconds); every external call is bounded
    pub request_timeout_secs: u64,
    /// HTTP listen port
    pub port: u16,
    /// Demo mode: placeholder credentials permitted, fallback-only operation
    pub demo_mode: bool,
}

impl ServiceConfig {
    /// Resolve configuration from ENV → TOML → demo defaults.
    ///
    /// Placeholder/demo credentials are rejected unless `allow_demo_keys` is
    /// explicitly set (env `GEOLENS_ALLOW_DEMO_KEYS` or TOML
    /// `allow_demo_keys`); demo mode is flagged on the returned config so the
    /// token provider can pin itself offline instead of sending known-bad
    /// credentials to real providers.
    pub fn resolve() -> Result<Self> {
        let toml_config = match TomlConfig::locate() {
            Some(path) => TomlConfig::load(&path)?,
            None => TomlConfig::default(),
        };
        Self::from_toml(&toml_config)
    }

    /// Resolve configuration from an already-loaded TOML model
    pub fn from_toml(toml_config: &TomlConfig) -> Result<Self> {
        let place_api_key = resolve_credential(
            "Place API key",
            "GEOLENS_PLACE_API_KEY",
            toml_config.place_api_key.as_ref(),
            "demo-place-key",
        );
        let vision_api_key = resolve_credential(
            "Vision API key",
            "GEOLENS_VISION_API_KEY",
            toml_config.vision_api_key.as_ref(),
            "demo-vision-key",
        );
        let vision_secret = resolve_credential(
            "Vision secret",
            "GEOLENS_VISION_SECRET",
            toml_config.vision_secret.as_ref(),
            "demo-vision-secret",
        );

        let allow_demo = std::env::var("GEOLENS_ALLOW_DEMO_KEYS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or_else(|_| toml_config.allow_demo_keys.unwrap_or(false));

        let demo_mode = is_demo_key(&place_api_key)
            || is_demo_key(&vision_api_key)
            || is_demo_key(&vision_secret);

        if demo_mode && !allow_demo {
            return Err(Error::Config(
                "Placeholder credentials detected. Configure real API keys via \
                 GEOLENS_PLACE_API_KEY / GEOLENS_VISION_API_KEY / GEOLENS_VISION_SECRET \
                 (or the TOML config), or set GEOLENS_ALLOW_DEMO_KEYS=1 to run in \
                 fallback-only demo mode."
                    .to_string(),
            ));
        }
        if demo_mode {
            warn!("Running with demo credentials: all provider calls use deterministic fallback");
        }

        let port = std::env::var("GEOLENS_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(toml_config.port)
            .unwrap_or(DEFAULT_PORT);

        let mut endpoints = ProviderEndpoints::default();
        let overrides = &toml_config.endpoints;
        if let Some(url) = &overrides.token_url {
            endpoints.token_url = url.clone();
        }
        if let Some(url) = &overrides.ocr_url {
            endpoints.ocr_url = url.clone();
        }
        if let Some(url) = &overrides.landmark_url {
            endpoints.landmark_url = url.clone();
        }
        if let Some(url) = &overrides.scene_url {
            endpoints.scene_url = url.clone();
        }
        if let Some(url) = &overrides.place_text_url {
            endpoints.place_text_url = url.clone();
        }
        if let Some(url) = &overrides.place_around_url {
            endpoints.place_around_url = url.clone();
        }

        Ok(Self {
            place_api_key,
            vision_api_key,
            vision_secret,
            endpoints,
            request_timeout_secs: toml_config.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            port,
            demo_mode,
        })
    }

    /// Config with demo credentials, for tests and offline demos
    pub fn demo() -> Self {
        Self {
            place_api_key: "demo-place-key".to_string(),
            vision_api_key: "demo-vision-key".to_string(),
            vision_secret: "demo-vision-secret".to_string(),
            endpoints: ProviderEndpoints::default(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            port: DEFAULT_PORT,
            demo_mode: true,
        }
    }
}
