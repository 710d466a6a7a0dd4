//! Connection settings: the API key and the base endpoint.
//!
//! Settings come from code, the environment (`STREAK_API_KEY`,
//! `STREAK_API_ENDPOINT`), or a TOML file:
//!
//! ```toml
//! api_key = "your-key"
//! api_endpoint = "https://www.streak.com/api/v1/"
//! ```

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::{Result, StreakError};

/// Production endpoint of the Streak REST API.
pub const DEFAULT_API_ENDPOINT: &str = "https://www.streak.com/api/v1/";

/// Key used when no credential source supplied one.
pub const PLACEHOLDER_API_KEY: &str = "YOUR_API_KEY_HERE";

pub const API_KEY_ENV: &str = "STREAK_API_KEY";
pub const API_ENDPOINT_ENV: &str = "STREAK_API_ENDPOINT";

/// API key plus base endpoint. Read-only once built.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub api_endpoint: String,
}

fn default_endpoint() -> String {
    DEFAULT_API_ENDPOINT.to_string()
}

impl Settings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_endpoint: default_endpoint(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_endpoint = endpoint.into();
        self
    }

    /// Read settings from `STREAK_API_KEY` and `STREAK_API_ENDPOINT`.
    ///
    /// An unset or blank key falls back to [`PLACEHOLDER_API_KEY`]; requests
    /// made with it will be rejected by the server.
    pub fn from_env() -> Self {
        let api_key = match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => {
                warn!("{API_KEY_ENV} not set, using placeholder API key");
                PLACEHOLDER_API_KEY.to_string()
            }
        };
        let api_endpoint = std::env::var(API_ENDPOINT_ENV)
            .ok()
            .filter(|endpoint| !endpoint.trim().is_empty())
            .unwrap_or_else(default_endpoint);
        Self {
            api_key,
            api_endpoint,
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(raw).map_err(|e| StreakError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StreakError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    pub fn uses_placeholder_key(&self) -> bool {
        self.api_key == PLACEHOLDER_API_KEY
    }

    fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(StreakError::Config("api_key cannot be empty".to_string()));
        }
        if !self.api_endpoint.starts_with("https://") && !self.api_endpoint.starts_with("http://")
        {
            return Err(StreakError::Config(format!(
                "api_endpoint must start with http:// or https://, got: {}",
                self.api_endpoint
            )));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(PLACEHOLDER_API_KEY)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &"<redacted>")
            .field("api_endpoint", &self.api_endpoint)
            .finish()
    }
}
