//! REST client for the platform API.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::{PlatformClient, PlatformError, PlatformErrorKind};
use crate::config::PlatformSettings;
use crate::models::PlatformGuild;
use crate::{Error, Result};

/// HTTP settings for the platform client.
#[derive(Debug, Clone)]
pub struct PlatformHttpConfig {
    /// API base URL, without a trailing slash.
    pub api_base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for PlatformHttpConfig {
    fn default() -> Self {
        Self {
            api_base_url: HttpPlatformClient::DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(10),
            user_agent: format!("guildsync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&PlatformSettings> for PlatformHttpConfig {
    fn from(settings: &PlatformSettings) -> Self {
        Self {
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(settings.timeout_secs),
            ..Self::default()
        }
    }
}

/// Error body returned by the platform on failure.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// Platform client backed by the REST API.
pub struct HttpPlatformClient {
    config: PlatformHttpConfig,
    client: reqwest::Client,
}

impl HttpPlatformClient {
    /// Default API endpoint.
    pub const DEFAULT_API_BASE: &'static str = "https://discord.com/api/v10";

    /// Creates a client with the given settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (TLS backend
    /// initialization).
    pub fn new(config: PlatformHttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::OperationFailed {
                operation: "build_platform_client".to_string(),
                cause: e.to_string(),
            })?;
        Ok(Self { config, client })
    }

    fn guilds_url(&self) -> String {
        format!("{}/users/@me/guilds", self.config.api_base_url)
    }
}

/// Maps a non-success response to a [`PlatformError`].
fn classify_status(status: StatusCode, body: &str) -> PlatformError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });

    if status == StatusCode::UNAUTHORIZED {
        PlatformError::new(PlatformErrorKind::Unauthorized, message)
    } else {
        PlatformError::new(PlatformErrorKind::Http(status.as_u16()), message)
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn list_user_guilds(
        &self,
        token: &SecretString,
    ) -> std::result::Result<Vec<PlatformGuild>, PlatformError> {
        let response = self
            .client
            .get(self.guilds_url())
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| {
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connect"
                } else if e.is_request() {
                    "request"
                } else {
                    "unknown"
                };
                tracing::error!(
                    error = %e,
                    error_kind = error_kind,
                    "Platform guild request failed"
                );
                PlatformError::new(
                    PlatformErrorKind::Transport,
                    format!("{error_kind} error: {e}"),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Platform returned error status");
            return Err(classify_status(status, &body));
        }

        let guilds: Vec<PlatformGuild> = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse platform guild list");
            PlatformError::new(PlatformErrorKind::Decode, e.to_string())
        })?;

        tracing::debug!(guild_count = guilds.len(), "Fetched platform guilds");
        Ok(guilds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_status() {
        let err = classify_status(
            StatusCode::UNAUTHORIZED,
            r#"{"message": "401: Unauthorized", "code": 0}"#,
        );
        assert!(err.is_unauthorized());
        assert_eq!(err.message, "401: Unauthorized");
    }

    #[test]
    fn test_other_status_uses_body_message() {
        let err = classify_status(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"message": "You are being rate limited.", "retry_after": 1.5}"#,
        );
        assert_eq!(err.kind, PlatformErrorKind::Http(429));
        assert_eq!(err.message, "You are being rate limited.");
    }

    #[test]
    fn test_status_without_json_body() {
        let err = classify_status(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(err.kind, PlatformErrorKind::Http(502));
        assert_eq!(err.message, "Bad Gateway");
    }

    #[test]
    fn test_config_from_settings_strips_slash() {
        let settings = PlatformSettings {
            api_base_url: "http://localhost:8080/api/".to_string(),
            ..PlatformSettings::default()
        };
        let config = PlatformHttpConfig::from(&settings);
        assert_eq!(config.api_base_url, "http://localhost:8080/api");
        let client = HttpPlatformClient::new(config).unwrap();
        assert_eq!(client.guilds_url(), "http://localhost:8080/api/users/@me/guilds");
    }
}
