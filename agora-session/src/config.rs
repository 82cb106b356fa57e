//! Session configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Remote conversation service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Duplex (WebSocket) endpoint
    pub endpoint: String,

    /// Fixed delay before each reconnect attempt (ms)
    pub reconnect_delay_ms: u64,

    /// Consecutive reconnect attempts before giving up
    pub max_reconnect_attempts: u32,

    /// Timeout for establishing one connection (seconds)
    pub connect_timeout_secs: u64,

    /// Base URL of the HTTP interaction API
    pub interact_base_url: String,

    /// Timeout for interaction requests (seconds)
    pub interact_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8000/ws/debate".to_string(),
            reconnect_delay_ms: 3000,
            max_reconnect_attempts: 5,
            connect_timeout_secs: 10,
            interact_base_url: "http://127.0.0.1:8000".to_string(),
            interact_timeout_secs: 30,
        }
    }
}

impl SessionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let endpoint = Url::parse(&self.endpoint)
            .map_err(|e| format!("Invalid session endpoint '{}': {}", self.endpoint, e))?;
        if endpoint.scheme() != "ws" && endpoint.scheme() != "wss" {
            return Err(format!("Session endpoint must be ws:// or wss://: {}", self.endpoint));
        }

        let interact = Url::parse(&self.interact_base_url)
            .map_err(|e| format!("Invalid interaction URL '{}': {}", self.interact_base_url, e))?;
        if interact.scheme() != "http" && interact.scheme() != "https" {
            return Err(format!(
                "Interaction URL must be http:// or https://: {}",
                self.interact_base_url
            ));
        }

        if self.reconnect_delay_ms > 300_000 {
            return Err("Reconnect delay too large (max 300000 ms)".to_string());
        }
        if self.max_reconnect_attempts > 100 {
            return Err("Max reconnect attempts too large (max 100)".to_string());
        }
        if self.connect_timeout_secs == 0 || self.connect_timeout_secs > 300 {
            return Err("Connect timeout must be between 1 and 300 seconds".to_string());
        }
        if self.interact_timeout_secs == 0 || self.interact_timeout_secs > 600 {
            return Err("Interaction timeout must be between 1 and 600 seconds".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reconnect_delay(), Duration::from_secs(3));
        assert_eq!(config.max_reconnect_attempts, 5);
    }

    #[test]
    fn test_rejects_wrong_schemes() {
        let config = SessionConfig {
            endpoint: "http://127.0.0.1:8000/ws/debate".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SessionConfig {
            interact_base_url: "ftp://example.com".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SessionConfig {
            endpoint: "not a url".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
