//! Room Coordinator configuration.
//!
//! Configuration is loaded from environment variables with defaults for
//! everything; malformed values are rejected rather than silently replaced.

use chrono::format::{Item, StrftimeItems};
use common::config::ObservabilityConfig;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8082";

/// Default maximum number of rooms one coordinator hosts.
pub const DEFAULT_MAX_ROOMS: u32 = 1000;

/// Default date format for appointment period messages (chrono `strftime` syntax).
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Default coordinator instance ID prefix.
pub const DEFAULT_COORDINATOR_ID_PREFIX: &str = "rc";

/// Room Coordinator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Health endpoint bind address (default: "0.0.0.0:8082").
    pub health_bind_address: String,

    /// Unique identifier for this coordinator instance.
    pub coordinator_id: String,

    /// Maximum concurrently open rooms.
    pub max_rooms: u32,

    /// How long a rights request may stay pending before it expires.
    /// `None` disables expiry.
    pub rights_request_ttl: Option<Duration>,

    /// `strftime` pattern used to render appointment periods.
    pub date_format: String,

    /// Logging configuration.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let health_bind_address = vars
            .get("RC_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let max_rooms = match vars.get("RC_MAX_ROOMS") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(format!(
                        "RC_MAX_ROOMS must be a positive integer, got '{raw}'"
                    ))
                })?,
            None => DEFAULT_MAX_ROOMS,
        };

        let rights_request_ttl = match vars.get("RC_RIGHTS_REQUEST_TTL_SECONDS") {
            Some(raw) => {
                let seconds = raw.parse::<u64>().ok().filter(|n| *n > 0).ok_or_else(|| {
                    ConfigError::InvalidValue(format!(
                        "RC_RIGHTS_REQUEST_TTL_SECONDS must be a positive integer, got '{raw}'"
                    ))
                })?;
                Some(Duration::from_secs(seconds))
            }
            None => None,
        };

        let date_format = vars
            .get("RC_DATE_FORMAT")
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
        if StrftimeItems::new(&date_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::InvalidValue(format!(
                "RC_DATE_FORMAT is not a valid strftime pattern: '{date_format}'"
            )));
        }

        let json_logs = match vars.get("RC_LOG_JSON").map(|s| s.to_ascii_lowercase()) {
            None => false,
            Some(v) if v == "true" || v == "1" => true,
            Some(v) if v == "false" || v == "0" => false,
            Some(v) => {
                return Err(ConfigError::InvalidValue(format!(
                    "RC_LOG_JSON must be true or false, got '{v}'"
                )))
            }
        };

        let log_level = vars
            .get("RC_LOG_LEVEL")
            .cloned()
            .unwrap_or_else(|| common::config::DEFAULT_LOG_LEVEL.to_string());

        let coordinator_id = vars.get("RC_COORDINATOR_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_COORDINATOR_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            health_bind_address,
            coordinator_id,
            max_rooms,
            rights_request_ttl,
            date_format,
            observability: ObservabilityConfig {
                log_level,
                json_logs,
            },
        })
    }
}
