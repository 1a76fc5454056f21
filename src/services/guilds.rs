//! Guild listing service.
//!
//! The entry point callers use: wraps the [`GuildReconciler`] in a
//! [`GuildCache`], resolves restriction flags for the authorization UI, and
//! exposes the write-permission check.
//!
//! # Operations
//!
//! | Operation | Cache behavior |
//! |-----------|----------------|
//! | `fetch_guilds` | fresh hit, join in-flight, or reconcile |
//! | `refresh_guilds` | invalidate, then reconcile |
//! | `logout` | invalidate |
//! | `check_event_permission` | none (pure) |

use futures::future::join_all;
use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use super::guild_cache::{FetchResult, GuildCache};
use super::reconciler::{GuildReconciler, IconUrls};
use crate::config::GuildSyncConfig;
use crate::models::{
    CapabilitySet, GuildAuthorization, GuildConfig, GuildId, GuildListError, GuildListing,
    RefreshedGuilds,
};
use crate::platform::{HttpPlatformClient, PlatformHttpConfig};
use crate::security::{Operation, PermissionCheck, check_operation};
use crate::storage::{RestrictionStore, SqliteGuildStore};
use crate::{Error, Result};

/// Service for guild listing and write authorization.
pub struct GuildService {
    cache: GuildCache,
    reconciler: Arc<GuildReconciler>,
    restrictions: Arc<dyn RestrictionStore>,
}

impl GuildService {
    /// Creates a guild service from its collaborators.
    #[must_use]
    pub fn new(
        cache: GuildCache,
        reconciler: GuildReconciler,
        restrictions: Arc<dyn RestrictionStore>,
    ) -> Self {
        Self {
            cache,
            reconciler: Arc::new(reconciler),
            restrictions,
        }
    }

    /// Creates a guild service backed by the platform's REST API and the
    /// configured `SQLite` database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the HTTP client
    /// cannot be built.
    pub fn try_from_config(config: &GuildSyncConfig) -> Result<Self> {
        let db_path = config
            .storage
            .database_path
            .clone()
            .or_else(SqliteGuildStore::default_path)
            .ok_or_else(|| Error::OperationFailed {
                operation: "resolve_database_path".to_string(),
                cause: "no database path configured and no data directory found".to_string(),
            })?;

        let store = Arc::new(SqliteGuildStore::new(&db_path)?);
        let platform = Arc::new(HttpPlatformClient::new(PlatformHttpConfig::from(
            &config.platform,
        ))?);

        let reconciler = GuildReconciler::new(platform, store.clone())
            .with_icons(IconUrls::from(&config.platform));
        let cache = GuildCache::new(Duration::from_secs(config.cache.ttl_secs));

        tracing::debug!(
            database = %db_path.display(),
            ttl_secs = config.cache.ttl_secs,
            "Guild service initialized"
        );
        Ok(Self::new(cache, reconciler, store))
    }

    /// The cache this service reads through.
    #[must_use]
    pub const fn cache(&self) -> &GuildCache {
        &self.cache
    }

    /// Lists the user's joined and invitable guilds.
    ///
    /// Never fails: on error both lists are empty and `error` is set. Without
    /// a token nothing upstream is called and the cache is not consulted.
    #[instrument(skip(self, token), fields(operation = "fetch_guilds"))]
    pub async fn fetch_guilds(&self, user_id: &str, token: Option<&SecretString>) -> GuildListing {
        let Some(token) = token else {
            return GuildListing::failed(GuildListError::NoToken);
        };

        match self.load(user_id, token).await {
            Ok(snapshot) => GuildListing::from(snapshot.as_ref()),
            Err(e) => GuildListing::failed(e),
        }
    }

    /// Invalidates the user's cache entry, fetches afresh, and resolves the
    /// restriction flag of every joined guild.
    #[instrument(skip(self, token), fields(operation = "refresh_guilds"))]
    pub async fn refresh_guilds(
        &self,
        user_id: &str,
        token: Option<&SecretString>,
    ) -> RefreshedGuilds {
        self.cache.invalidate(user_id);

        let Some(token) = token else {
            return RefreshedGuilds {
                listing: GuildListing::failed(GuildListError::NoToken),
                authorizations: BTreeMap::new(),
            };
        };

        let snapshot = match self.load(user_id, token).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                return RefreshedGuilds {
                    listing: GuildListing::failed(e),
                    authorizations: BTreeMap::new(),
                };
            },
        };

        let configs = join_all(
            snapshot
                .guilds
                .iter()
                .map(|guild| self.resolve_guild_config(guild.guild_id())),
        )
        .await;

        let authorizations = snapshot
            .guilds
            .iter()
            .zip(configs)
            .map(|(guild, config)| {
                (
                    guild.guild_id().clone(),
                    GuildAuthorization {
                        capabilities: guild.permissions,
                        restricted: config.restricted,
                    },
                )
            })
            .collect();

        RefreshedGuilds {
            listing: GuildListing::from(snapshot.as_ref()),
            authorizations,
        }
    }

    /// Forgets the user's cached guilds.
    pub fn logout(&self, user_id: &str) {
        self.cache.invalidate(user_id);
        tracing::info!(user_id, "Guild cache cleared on logout");
    }

    /// Returns the guild's configuration, defaulting to unrestricted.
    ///
    /// Store failures are logged and also fall back to unrestricted.
    pub async fn resolve_guild_config(&self, guild_id: &GuildId) -> GuildConfig {
        match self.restrictions.guild_config(guild_id).await {
            Ok(Some(config)) => config,
            Ok(None) => GuildConfig::unrestricted(guild_id.clone()),
            Err(e) => {
                tracing::warn!(
                    guild_id = %guild_id,
                    error = %e,
                    "Guild config lookup failed, treating guild as unrestricted"
                );
                metrics::counter!("guild_config_lookup_failures_total").increment(1);
                GuildConfig::unrestricted(guild_id.clone())
            },
        }
    }

    /// Decides whether `operation` is permitted. See
    /// [`check_operation`](crate::security::check_operation).
    #[must_use]
    pub fn check_event_permission(
        operation: Operation,
        config: &GuildConfig,
        capabilities: &CapabilitySet,
    ) -> PermissionCheck {
        check_operation(operation, config, capabilities)
    }

    async fn load(&self, user_id: &str, token: &SecretString) -> FetchResult {
        let reconciler = Arc::clone(&self.reconciler);
        let user = user_id.to_string();
        let token = SecretString::from(token.expose_secret().to_owned());

        self.cache
            .fetch(user_id, move || async move {
                reconciler.reconcile(&user, Some(&token)).await
            })
            .await
    }
}
