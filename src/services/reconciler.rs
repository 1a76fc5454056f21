//! One guild list fetch cycle.
//!
//! Fetches the user's guilds from the platform and their registrations from
//! the store, then splits the platform list in two:
//!
//! - **joined**: registered guilds, enriched with the user's capabilities
//! - **invitable**: unregistered guilds where the user may invite the bot
//!
//! No caching happens here; [`GuildCache`](super::GuildCache) wraps it.

use secrecy::SecretString;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use crate::config::PlatformSettings;
use crate::models::{
    CapabilitySet, EnrichedGuild, GuildId, GuildListError, GuildSnapshot, InvitableGuild,
    PlatformGuild, RegisteredGuild,
};
use crate::platform::{PlatformClient, PlatformError};
use crate::security::can_invite_bot;
use crate::storage::RegistrationStore;

/// Builds CDN URLs for guild icons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconUrls {
    cdn_base_url: String,
    size: u32,
}

impl IconUrls {
    /// Default CDN base.
    pub const DEFAULT_CDN_BASE: &'static str = "https://cdn.discordapp.com";

    /// Default requested icon size in pixels.
    pub const DEFAULT_SIZE: u32 = 128;

    /// Creates a builder for the given CDN base and icon size.
    #[must_use]
    pub fn new(cdn_base_url: impl Into<String>, size: u32) -> Self {
        let base: String = cdn_base_url.into();
        Self {
            cdn_base_url: base.trim_end_matches('/').to_string(),
            size,
        }
    }

    /// Returns the icon URL, or `None` when the guild has no icon.
    #[must_use]
    pub fn icon_url(&self, guild_id: &GuildId, icon: Option<&str>) -> Option<String> {
        icon.filter(|hash| !hash.is_empty()).map(|hash| {
            format!(
                "{}/icons/{guild_id}/{hash}.png?size={}",
                self.cdn_base_url, self.size
            )
        })
    }
}

impl Default for IconUrls {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CDN_BASE, Self::DEFAULT_SIZE)
    }
}

impl From<&PlatformSettings> for IconUrls {
    fn from(settings: &PlatformSettings) -> Self {
        Self::new(settings.cdn_base_url.clone(), settings.icon_size)
    }
}

/// Splits platform guilds into joined and invitable sets.
///
/// Joined guilds keep the platform's order. Platform guilds without a
/// registration only ever land in the invitable set, and only when the user
/// may invite the bot there. A guild the platform reports more than once is
/// placed by its first occurrence.
#[must_use]
pub fn partition(
    platform_guilds: Vec<PlatformGuild>,
    registered: Vec<RegisteredGuild>,
    icons: &IconUrls,
) -> GuildSnapshot {
    let mut registered: HashMap<GuildId, RegisteredGuild> = registered
        .into_iter()
        .map(|g| (g.guild_id.clone(), g))
        .collect();

    let mut seen = HashSet::new();
    let mut snapshot = GuildSnapshot::default();
    for platform_guild in platform_guilds {
        if !seen.insert(platform_guild.id.clone()) {
            tracing::debug!(guild_id = %platform_guild.id, "Skipping duplicate platform guild");
            continue;
        }
        let permissions = CapabilitySet::decode(&platform_guild.permissions);

        if let Some(guild) = registered.remove(&platform_guild.id) {
            snapshot.guilds.push(EnrichedGuild { guild, permissions });
        } else if can_invite_bot(&permissions) {
            let avatar_url = icons.icon_url(&platform_guild.id, platform_guild.icon.as_deref());
            snapshot.invitable.push(InvitableGuild {
                guild_id: platform_guild.id,
                name: platform_guild.name,
                avatar_url,
                owner: platform_guild.owner,
                permissions,
            });
        }
    }

    snapshot
}

fn platform_error(e: PlatformError) -> GuildListError {
    if e.is_unauthorized() {
        GuildListError::TokenExpired
    } else {
        GuildListError::ApiError { message: e.message }
    }
}

/// Runs a fetch cycle against the platform and the registration store.
pub struct GuildReconciler {
    platform: Arc<dyn PlatformClient>,
    registrations: Arc<dyn RegistrationStore>,
    icons: IconUrls,
}

impl GuildReconciler {
    /// Creates a reconciler with default icon URLs.
    #[must_use]
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        registrations: Arc<dyn RegistrationStore>,
    ) -> Self {
        Self {
            platform,
            registrations,
            icons: IconUrls::default(),
        }
    }

    /// Sets the icon URL builder.
    #[must_use]
    pub fn with_icons(mut self, icons: IconUrls) -> Self {
        self.icons = icons;
        self
    }

    /// Fetches and partitions the user's guilds.
    ///
    /// # Errors
    ///
    /// - [`GuildListError::NoToken`] if `token` is `None` (nothing is called)
    /// - [`GuildListError::TokenExpired`] if the platform rejects the token
    /// - [`GuildListError::ApiError`] for any other platform or store failure
    #[instrument(skip(self, token), fields(operation = "reconcile_guilds"))]
    pub async fn reconcile(
        &self,
        user_id: &str,
        token: Option<&SecretString>,
    ) -> std::result::Result<GuildSnapshot, GuildListError> {
        let start = Instant::now();
        let result = self.run(user_id, token).await;

        #[allow(clippy::cast_precision_loss)]
        let duration_ms = start.elapsed().as_millis() as f64;
        match &result {
            Ok(snapshot) => {
                metrics::histogram!("guild_reconcile_duration_ms", "status" => "success")
                    .record(duration_ms);
                tracing::info!(
                    guild_count = snapshot.guilds.len(),
                    invitable_count = snapshot.invitable.len(),
                    duration_ms,
                    "Reconciled guilds"
                );
            },
            Err(e) => {
                metrics::histogram!("guild_reconcile_duration_ms", "status" => "error")
                    .record(duration_ms);
                metrics::counter!("guild_reconcile_errors_total", "type" => e.kind())
                    .increment(1);
                tracing::warn!(error = %e, error_type = e.kind(), "Guild reconciliation failed");
            },
        }
        result
    }

    async fn run(
        &self,
        user_id: &str,
        token: Option<&SecretString>,
    ) -> std::result::Result<GuildSnapshot, GuildListError> {
        let token = token.ok_or(GuildListError::NoToken)?;

        let platform_guilds = self
            .platform
            .list_user_guilds(token)
            .await
            .map_err(platform_error)?;

        let registered = self
            .registrations
            .list_registered_guilds(user_id)
            .await
            .map_err(|e| GuildListError::ApiError {
                message: e.to_string(),
            })?;

        Ok(partition(platform_guilds, registered, &self.icons))
    }
}
