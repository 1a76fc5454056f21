//! Storage trait definitions.
//!
//! The reconciler and the service layer read from two stores: the
//! registrations the bot has been onboarded into, and per-guild
//! configuration. Both are read-only from this crate's point of view.

use async_trait::async_trait;

use crate::Result;
use crate::models::{GuildConfig, GuildId, RegisteredGuild};

/// Registered guilds visible to a user.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Lists the registered guilds linked to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be accessed.
    async fn list_registered_guilds(&self, user_id: &str) -> Result<Vec<RegisteredGuild>>;
}

/// Per-guild configuration.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait RestrictionStore: Send + Sync {
    /// Gets the stored configuration for a guild.
    ///
    /// # Returns
    ///
    /// The configuration if one was stored, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be accessed.
    async fn guild_config(&self, guild_id: &GuildId) -> Result<Option<GuildConfig>>;
}
