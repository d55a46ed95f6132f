//! Configuration management for the waitlist gateway

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Waitlist gateway configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Bind address for HTTP server
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Base URL of the quota authority API
    #[serde(default = "default_quota_api_url")]
    pub quota_api_url: String,

    /// Root credential for the quota authority (never logged)
    pub quota_root_key: String,

    /// Namespace isolating this gateway's quota bucket within the authority
    #[serde(default = "default_quota_namespace")]
    pub quota_namespace: String,

    /// Rate limit window duration in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Maximum submissions per identifier per window
    #[serde(default = "default_max_per_window")]
    pub max_per_window: u64,

    /// Bounded wait for the quota authority in milliseconds
    #[serde(default = "default_limiter_timeout_ms")]
    pub limiter_timeout_ms: u64,

    /// Include fingerprint validation errors in 400 responses.
    /// Development aid only, must stay off in production.
    #[serde(default)]
    pub expose_validation_details: bool,

    /// Enable Prometheus metrics endpoint
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config: Self = envy::prefixed("WAITLIST_")
            .from_env()
            .map_err(|e| Error::Config(format!("Failed to parse environment variables: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.quota_root_key.is_empty() {
            return Err(Error::Config(
                "quota_root_key cannot be empty (set WAITLIST_QUOTA_ROOT_KEY)".to_string(),
            ));
        }

        Url::parse(&self.quota_api_url)
            .map_err(|e| Error::Config(format!("Invalid quota_api_url: {}", e)))?;

        if self.window_ms == 0 {
            return Err(Error::Config("window_ms must be > 0".to_string()));
        }

        if self.max_per_window == 0 {
            return Err(Error::Config("max_per_window must be > 0".to_string()));
        }

        // The bounded wait must expire well before the window it guards
        if self.limiter_timeout_ms == 0 || self.limiter_timeout_ms >= self.window_ms {
            return Err(Error::Config(
                "limiter_timeout_ms must be > 0 and < window_ms".to_string(),
            ));
        }

        Ok(())
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn limiter_timeout(&self) -> Duration {
        Duration::from_millis(self.limiter_timeout_ms)
    }
}

// Default value functions
fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_quota_api_url() -> String {
    "https://api.unkey.dev".to_string()
}

fn default_quota_namespace() -> String {
    "waitlist".to_string()
}

fn default_window_ms() -> u64 {
    3_600_000 // 1 hour
}

fn default_max_per_window() -> u64 {
    3
}

fn default_limiter_timeout_ms() -> u64 {
    3_000 // only wait 3s at most before denying
}

fn default_true() -> bool {
    true
}
