//! Guild listing services.
//!
//! The reconciler merges the platform's view with local registrations, the
//! cache coalesces and expires those results per user, and [`GuildService`]
//! ties both to restriction lookups.

mod guild_cache;
mod guilds;
mod reconciler;

pub use guild_cache::{FetchResult, GuildCache};
pub use guilds::GuildService;
pub use reconciler::{GuildReconciler, IconUrls, partition};
