//! Results of a guild list fetch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

use super::capability::CapabilitySet;
use super::guild::{EnrichedGuild, GuildId, InvitableGuild};

/// Why a guild list could not be produced.
///
/// Presentation code matches on this exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, ThisError, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuildListError {
    /// The caller has no platform credential.
    #[error("no platform token available")]
    NoToken,

    /// The platform rejected the credential.
    #[error("platform token expired or revoked")]
    TokenExpired,

    /// Any other upstream or store failure.
    #[error("platform request failed: {message}")]
    ApiError {
        /// Upstream message.
        message: String,
    },
}

impl GuildListError {
    /// Wire name of the variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NoToken => "no_token",
            Self::TokenExpired => "token_expired",
            Self::ApiError { .. } => "api_error",
        }
    }

    /// Text shown to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NoToken => "Please sign in again to load your servers.".to_string(),
            Self::TokenExpired => "Your session has expired. Please sign in again.".to_string(),
            Self::ApiError { message } => format!("Could not load your servers: {message}"),
        }
    }

    /// Returns `true` if retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ApiError { .. })
    }
}

/// One reconciled view of a user's guilds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildSnapshot {
    /// Registered guilds the user is a member of.
    pub guilds: Vec<EnrichedGuild>,
    /// Unregistered guilds the user may invite the bot to.
    pub invitable: Vec<InvitableGuild>,
}

/// What `fetch_guilds` hands back to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildListing {
    /// Registered guilds with capabilities.
    pub guilds: Vec<EnrichedGuild>,
    /// Guilds the bot can be invited to.
    pub invitable_guilds: Vec<InvitableGuild>,
    /// Set when the fetch failed; both lists are then empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<GuildListError>,
}

impl GuildListing {
    /// Builds a failed listing with empty lists.
    #[must_use]
    pub fn failed(error: GuildListError) -> Self {
        Self {
            guilds: Vec::new(),
            invitable_guilds: Vec::new(),
            error: Some(error),
        }
    }
}

impl From<&GuildSnapshot> for GuildListing {
    fn from(snapshot: &GuildSnapshot) -> Self {
        Self {
            guilds: snapshot.guilds.clone(),
            invitable_guilds: snapshot.invitable.clone(),
            error: None,
        }
    }
}

/// Authorization inputs for one joined guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildAuthorization {
    /// The user's capabilities (raw bits are not serialized).
    pub capabilities: CapabilitySet,
    /// The guild's restriction flag.
    pub restricted: bool,
}

/// What `refresh_guilds` hands back to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedGuilds {
    /// The freshly fetched listing.
    #[serde(flatten)]
    pub listing: GuildListing,
    /// Per joined guild authorization data, keyed by platform guild ID.
    pub authorizations: BTreeMap<GuildId, GuildAuthorization>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_wire_format() {
        let json = serde_json::to_value(GuildListError::NoToken).unwrap();
        assert_eq!(json, serde_json::json!({"type": "no_token"}));

        let json = serde_json::to_value(GuildListError::ApiError {
            message: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "api_error", "message": "boom"})
        );
    }

    #[test]
    fn test_error_kind_matches_wire_tag() {
        for err in [
            GuildListError::NoToken,
            GuildListError::TokenExpired,
            GuildListError::ApiError {
                message: String::new(),
            },
        ] {
            let json = serde_json::to_value(&err).unwrap();
            assert_eq!(json["type"], err.kind());
        }
    }

    #[test]
    fn test_only_api_error_is_retryable() {
        assert!(!GuildListError::NoToken.is_retryable());
        assert!(!GuildListError::TokenExpired.is_retryable());
        assert!(
            GuildListError::ApiError {
                message: "x".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_user_message_per_variant() {
        assert_eq!(
            GuildListError::NoToken.user_message(),
            "Please sign in again to load your servers."
        );
        assert_eq!(
            GuildListError::TokenExpired.user_message(),
            "Your session has expired. Please sign in again."
        );
        let message = GuildListError::ApiError {
            message: "rate limited".to_string(),
        }
        .user_message();
        assert_eq!(message, "Could not load your servers: rate limited");
    }

    #[test]
    fn test_failed_listing_is_empty() {
        let listing = GuildListing::failed(GuildListError::TokenExpired);
        assert!(listing.guilds.is_empty());
        assert!(listing.invitable_guilds.is_empty());

        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["error"]["type"], "token_expired");
        assert_eq!(json["invitableGuilds"], serde_json::json!([]));
    }

    #[test]
    fn test_successful_listing_omits_error() {
        let listing = GuildListing::from(&GuildSnapshot::default());
        let json = serde_json::to_value(&listing).unwrap();
        assert!(json.get("error").is_none());
    }
}
