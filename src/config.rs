/// Runtime configuration for the gallery
///
/// Values come from the environment with logged defaults, and the whole
/// struct can be saved to / loaded from JSON.

use serde::{Deserialize, Serialize};
use std::{env, fmt::Display, str::FromStr};
use tracing::{info, warn};

use crate::state::store::DEFAULT_CAPACITY;

const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Backend root; endpoints and image paths are resolved against it
    pub base_url: String,
    /// Maximum number of images per gallery
    pub capacity: usize,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            capacity: DEFAULT_CAPACITY,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load from `GALLERY_BASE_URL`, `GALLERY_CAPACITY` and `GALLERY_TIMEOUT_SECS`
    pub fn load() -> Self {
        let defaults = Self::default();
        Self {
            base_url: try_load("GALLERY_BASE_URL", defaults.base_url),
            capacity: try_load("GALLERY_CAPACITY", defaults.capacity),
            request_timeout_secs: try_load("GALLERY_TIMEOUT_SECS", defaults.request_timeout_secs),
        }
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON string, missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity_is_six() {
        assert_eq!(Config::default().capacity, 6);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{"capacity": 4}"#).unwrap();
        assert_eq!(config.capacity, 4);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_json_round_trip() {
        let config = Config {
            base_url: "https://api.example.com/".to_string(),
            capacity: 3,
            request_timeout_secs: 5,
        };
        let restored = Config::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn test_invalid_env_value_falls_back() {
        env::set_var("GALLERY_TEST_BAD_NUMBER", "six");
        let value: usize = try_load("GALLERY_TEST_BAD_NUMBER", 6);
        assert_eq!(value, 6);
    }
}
