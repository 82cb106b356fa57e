//! HTTP interaction endpoint: one question, one performed answer

use crate::config::SessionConfig;
use crate::error::SessionError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Serialize)]
struct InteractRequest<'a> {
    session_id: &'a str,
    user_input: &'a str,
}

/// Reply from `/v1/interact`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct InteractResponse {
    pub text_response: String,
    pub avatar_commands: Value,
    pub audio_b64: Option<String>,
}

pub struct InteractClient {
    client: Client,
    base_url: String,
}

impl InteractClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SessionError> {
        url::Url::parse(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SessionError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        Self::new(
            &config.interact_base_url,
            Duration::from_secs(config.interact_timeout_secs),
        )
    }

    /// Identifier for a new conversation, derived from the current time
    pub fn new_session_id() -> String {
        format!("session_{}", chrono::Utc::now().timestamp_millis())
    }

    pub async fn interact(
        &self,
        session_id: &str,
        user_input: &str,
    ) -> Result<InteractResponse, SessionError> {
        let url = format!("{}/v1/interact", self.base_url);
        debug!(url = %url, session_id, "sending interaction");

        let response = self
            .client
            .post(&url)
            .json(&InteractRequest {
                session_id,
                user_input,
            })
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "interaction request failed");
                SessionError::Http(format!("request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::Http(format!(
                "Server Error: {} - {}",
                status.as_u16(),
                body.trim()
            )));
        }

        response
            .json::<InteractResponse>()
            .await
            .map_err(|e| SessionError::Http(format!("invalid interaction response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_shape() {
        let id = InteractClient::new_session_id();
        assert!(id.starts_with("session_"));
        assert!(id["session_".len()..].parse::<i64>().is_ok());
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(InteractClient::new("::nope::", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_response_defaults() {
        let r: InteractResponse = serde_json::from_str(r#"{"text_response": "Hi"}"#).unwrap();
        assert_eq!(r.text_response, "Hi");
        assert!(r.audio_b64.is_none());
        assert!(r.avatar_commands.is_null());
    }
}
