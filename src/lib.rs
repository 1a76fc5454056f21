//! # Guildsync
//!
//! Reconciles the guilds a chat-platform user belongs to with the guilds
//! registered locally, and decides who may manage them.
//!
//! For each user the platform's guild list is split into:
//!
//! - **Joined** guilds: registered locally, enriched with the user's decoded
//!   capabilities in that guild.
//! - **Invitable** guilds: not registered yet, where the user may add the bot.
//!
//! Results are cached per user with in-flight coalescing, so concurrent
//! requests for one user trigger a single upstream fetch.
//!
//! ## Example
//!
//! ```rust,ignore
//! use guildsync::{GuildService, GuildSyncConfig};
//! use secrecy::SecretString;
//!
//! let service = GuildService::try_from_config(&GuildSyncConfig::load_default()?)?;
//! let token = SecretString::from(token);
//! let listing = service.fetch_guilds("user-1", Some(&token)).await;
//! for guild in &listing.guilds {
//!     println!("{} admin={}", guild.guild.name, guild.permissions.administrator);
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod models;
pub mod observability;
pub mod platform;
pub mod security;
pub mod services;
pub mod storage;

pub use config::GuildSyncConfig;
pub use models::{
    CapabilitySet, EnrichedGuild, GuildConfig, GuildId, GuildListError, GuildListing,
    InvitableGuild, PlatformGuild, RefreshedGuilds, RegisteredGuild,
};
pub use platform::{HttpPlatformClient, PlatformClient, PlatformError};
pub use security::{Operation, PermissionCheck};
pub use services::{GuildCache, GuildReconciler, GuildService};
pub use storage::{InMemoryGuildStore, RegistrationStore, RestrictionStore, SqliteGuildStore};

/// Error type for guildsync operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Unknown operation names, malformed identifiers |
/// | `OperationFailed` | Database, filesystem, or HTTP client setup failures |
///
/// Listing failures seen by end users are reported as
/// [`GuildListError`] values, not as this type.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` statements or connection setup fail
    /// - Config or log files cannot be read or created
    /// - The HTTP client cannot be constructed
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for guildsync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
///
/// # Examples
///
/// ```rust
/// use guildsync::current_timestamp;
///
/// let ts = current_timestamp();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
