//! Data models for guildsync.
//!
//! This module contains the guild, capability and listing types shared by
//! the cache, the reconciler and the service layer.

mod capability;
mod guild;
mod listing;

pub use capability::{CapabilitySet, flags};
pub use guild::{EnrichedGuild, GuildConfig, GuildId, InvitableGuild, PlatformGuild, RegisteredGuild};
pub use listing::{
    GuildAuthorization, GuildListError, GuildListing, GuildSnapshot, RefreshedGuilds,
};
