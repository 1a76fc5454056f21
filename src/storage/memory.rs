//! In-memory store for tests and embedding.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::traits::{RegistrationStore, RestrictionStore};
use crate::models::{GuildConfig, GuildId, RegisteredGuild};
use crate::{Error, Result};

/// Registrations keyed by user plus guild configuration, held in memory.
#[derive(Debug, Default)]
pub struct InMemoryGuildStore {
    registrations: RwLock<HashMap<String, Vec<RegisteredGuild>>>,
    configs: RwLock<HashMap<GuildId, bool>>,
}

fn lock_error(operation: &str, e: impl std::fmt::Display) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

impl InMemoryGuildStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Links a registered guild to a user, replacing any earlier entry for
    /// the same guild.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn register(&self, user_id: &str, guild: RegisteredGuild) -> Result<()> {
        let mut registrations = self
            .registrations
            .write()
            .map_err(|e| lock_error("register_guild", e))?;
        let entries = registrations.entry(user_id.to_string()).or_default();
        entries.retain(|g| g.guild_id != guild.guild_id);
        entries.push(guild);
        Ok(())
    }

    /// Sets a guild's restriction flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn set_restricted(&self, guild_id: &GuildId, restricted: bool) -> Result<()> {
        self.configs
            .write()
            .map_err(|e| lock_error("set_restricted", e))?
            .insert(guild_id.clone(), restricted);
        Ok(())
    }
}

#[async_trait]
impl RegistrationStore for InMemoryGuildStore {
    async fn list_registered_guilds(&self, user_id: &str) -> Result<Vec<RegisteredGuild>> {
        let registrations = self
            .registrations
            .read()
            .map_err(|e| lock_error("list_registered_guilds", e))?;
        Ok(registrations.get(user_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl RestrictionStore for InMemoryGuildStore {
    async fn guild_config(&self, guild_id: &GuildId) -> Result<Option<GuildConfig>> {
        let configs = self
            .configs
            .read()
            .map_err(|e| lock_error("guild_config", e))?;
        Ok(configs.get(guild_id).map(|&restricted| GuildConfig {
            guild_id: guild_id.clone(),
            restricted,
        }))
    }
}
