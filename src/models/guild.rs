//! Guild models.
//!
//! A guild shows up in three shapes over one fetch cycle:
//!
//! - [`PlatformGuild`]: what the platform reports for the signed-in user
//! - [`RegisteredGuild`]: what the internal store has onboarded
//! - [`EnrichedGuild`] / [`InvitableGuild`]: the reconciled views handed to
//!   callers, carrying decoded capabilities

use serde::{Deserialize, Serialize};
use std::fmt;

use super::capability::CapabilitySet;

/// Platform identifier of a guild (a snowflake, kept opaque).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildId(String);

impl GuildId {
    /// Creates a new guild ID from the given string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for GuildId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for GuildId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A guild as reported by the platform for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformGuild {
    /// Platform guild ID.
    pub id: GuildId,
    /// Display name.
    pub name: String,
    /// Icon hash, if the guild has an icon.
    #[serde(default)]
    pub icon: Option<String>,
    /// Whether the user owns the guild.
    #[serde(default)]
    pub owner: bool,
    /// The user's effective permissions as a decimal string.
    #[serde(default)]
    pub permissions: String,
    /// Guild feature flags.
    #[serde(default)]
    pub features: Vec<String>,
}

/// A guild onboarded into the internal store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredGuild {
    /// Internal row ID.
    pub id: i64,
    /// Platform guild ID.
    pub guild_id: GuildId,
    /// Display name at registration time.
    pub name: String,
    /// Fully qualified avatar URL.
    pub avatar_url: Option<String>,
    /// Locale used for messages posted to the guild.
    pub locale: String,
}

/// A registered guild together with the current user's capabilities in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedGuild {
    /// The stored registration.
    #[serde(flatten)]
    pub guild: RegisteredGuild,
    /// Capabilities decoded from the platform's permission string.
    pub permissions: CapabilitySet,
}

impl EnrichedGuild {
    /// Platform guild ID.
    #[must_use]
    pub const fn guild_id(&self) -> &GuildId {
        &self.guild.guild_id
    }
}

/// A platform guild the bot is not in yet and the user may invite it to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitableGuild {
    /// Platform guild ID.
    pub guild_id: GuildId,
    /// Display name.
    pub name: String,
    /// Fully qualified icon URL.
    pub avatar_url: Option<String>,
    /// Whether the user owns the guild.
    pub owner: bool,
    /// Capabilities decoded from the platform's permission string.
    pub permissions: CapabilitySet,
}

/// Per-guild configuration consulted by write authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildConfig {
    /// Platform guild ID.
    pub guild_id: GuildId,
    /// Only members with management capability may write when set.
    pub restricted: bool,
}

impl GuildConfig {
    /// Configuration used when nothing is stored for a guild.
    #[must_use]
    pub const fn unrestricted(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            restricted: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_guild_from_api_json() {
        let json = r#"{
            "id": "81384788765712384",
            "name": "Discord API",
            "icon": "a363a84e969bcbe1353eb2fdfb2e50e6",
            "owner": false,
            "permissions": "2251799813685247",
            "features": ["COMMUNITY", "NEWS"]
        }"#;
        let guild: PlatformGuild = serde_json::from_str(json).unwrap();
        assert_eq!(guild.id.as_str(), "81384788765712384");
        assert_eq!(guild.icon.as_deref(), Some("a363a84e969bcbe1353eb2fdfb2e50e6"));
        assert_eq!(guild.features.len(), 2);
    }

    #[test]
    fn test_platform_guild_missing_optional_fields() {
        let guild: PlatformGuild =
            serde_json::from_str(r#"{"id": "1", "name": "Bare", "icon": null}"#).unwrap();
        assert!(guild.icon.is_none());
        assert!(!guild.owner);
        assert!(guild.permissions.is_empty());
        assert!(guild.features.is_empty());
    }

    #[test]
    fn test_enriched_guild_serializes_flat() {
        let enriched = EnrichedGuild {
            guild: RegisteredGuild {
                id: 7,
                guild_id: GuildId::new("42"),
                name: "Guild".to_string(),
                avatar_url: None,
                locale: "en-US".to_string(),
            },
            permissions: CapabilitySet::decode("8"),
        };
        let json = serde_json::to_value(&enriched).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["guildId"], "42");
        assert_eq!(json["permissions"]["administrator"], true);
        assert!(json["permissions"].get("raw").is_none());
    }

    #[test]
    fn test_guild_id_display() {
        assert_eq!(GuildId::from("123").to_string(), "123");
    }
}
