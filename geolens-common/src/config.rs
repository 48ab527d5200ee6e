//! Configuration loading and credential resolution
//!
//! Resolution priority for every credential: environment variable → TOML
//! config file → built-in demo default. Demo defaults exist so the service
//! can run offline (fallback-only); they are rejected at startup unless
//! `allow_demo_keys` is explicitly set.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Demo credentials shipped for local/offline operation.
///
/// These match the placeholder keys of the public demo deployment. Any key in
/// this list is treated as a placeholder and never sent to a real provider.
pub const DEMO_KEYS: &[&str] = &[
    "demo-place-key",
    "demo-vision-key",
    "demo-vision-secret",
];

/// TOML configuration file model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Place-search provider API key
    pub place_api_key: Option<String>,
    /// Vision provider API key
    pub vision_api_key: Option<String>,
    /// Vision provider secret
    pub vision_secret: Option<String>,
    /// Permit running with demo/placeholder credentials (fallback-only mode)
    pub allow_demo_keys: Option<bool>,
    /// HTTP listen port
    pub port: Option<u16>,
    /// Outbound request timeout in seconds
    pub request_timeout_secs: Option<u64>,
    /// Provider endpoint URL overrides (`[endpoints]` table)
    #[serde(default)]
    pub endpoints: TomlEndpoints,
}

/// Optional provider endpoint URL overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlEndpoints {
    pub token_url: Option<String>,
    pub ocr_url: Option<String>,
    pub landmark_url: Option<String>,
    pub scene_url: Option<String>,
    pub place_text_url: Option<String>,
    pub place_around_url: Option<String>,
}

impl TomlConfig {
    /// Load TOML config from the given path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Locate the config file: `GEOLENS_CONFIG` env var, else `geolens.toml`
    /// in the working directory. Returns None when neither exists.
    pub fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("GEOLENS_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            warn!("GEOLENS_CONFIG points at missing file: {}", path.display());
            return None;
        }
        let default = PathBuf::from("geolens.toml");
        default.exists().then_some(default)
    }
}

/// Resolve a single credential from ENV → TOML → demo default.
///
/// Warns when more than one source defines the value (potential
/// misconfiguration); the highest-priority source wins.
pub fn resolve_credential(
    name: &str,
    env_var: &str,
    toml_value: Option<&String>,
    demo_default: &str,
) -> String {
    let env_value = std::env::var(env_var).ok().filter(|v| is_valid_key(v));
    let toml_value = toml_value.filter(|v| is_valid_key(v));

    let mut sources = Vec::new();
    if env_value.is_some() {
        sources.push("environment");
    }
    if toml_value.is_some() {
        sources.push("TOML");
    }
    if sources.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using environment (highest priority).",
            name,
            sources.join(", ")
        );
    }

    if let Some(value) = env_value {
        info!("{} loaded from environment variable", name);
        return value;
    }
    if let Some(value) = toml_value {
        info!("{} loaded from TOML config", name);
        return value.clone();
    }

    info!("{} not configured, using demo placeholder", name);
    demo_default.to_string()
}

/// Validate a credential value (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Whether a credential is one of the shipped demo placeholders
pub fn is_demo_key(key: &str) -> bool {
    DEMO_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc123"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }

    #[test]
    fn test_is_demo_key() {
        assert!(is_demo_key("demo-place-key"));
        assert!(!is_demo_key("real-production-key"));
    }

    #[test]
    fn test_toml_parse_roundtrip() {
        let toml_str = r#"
            place_api_key = "key-1"
            allow_demo_keys = true
            port = 5731

            [endpoints]
            ocr_url = "http://localhost:9000/ocr"
        "#;
        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.place_api_key.as_deref(), Some("key-1"));
        assert_eq!(config.allow_demo_keys, Some(true));
        assert_eq!(config.port, Some(5731));
        assert!(config.vision_api_key.is_none());
        assert_eq!(
            config.endpoints.ocr_url.as_deref(),
            Some("http://localhost:9000/ocr")
        );
        assert!(config.endpoints.token_url.is_none());
    }
}
