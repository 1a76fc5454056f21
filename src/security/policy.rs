//! Write authorization for guild-scoped content.
//!
//! Every decision here is a pure function of its inputs. Callers resolve the
//! guild's [`GuildConfig`] and the member's [`CapabilitySet`] first; nothing in
//! this module looks anything up.
//!
//! # Rules
//!
//! | Operation | Unrestricted guild | Restricted guild |
//! |-----------|--------------------|------------------|
//! | `read` | allowed | allowed |
//! | `create` / `update` / `delete` | allowed | requires [`can_manage_guild`] |
//!
//! # Example
//!
//! ```rust
//! use guildsync::models::{CapabilitySet, GuildConfig, GuildId};
//! use guildsync::security::{Operation, check_operation};
//!
//! let config = GuildConfig { guild_id: GuildId::new("1"), restricted: true };
//! let member = CapabilitySet::none();
//!
//! assert!(check_operation(Operation::Read, &config, &member).allowed);
//! assert!(!check_operation(Operation::Delete, &config, &member).allowed);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;
use crate::models::{CapabilitySet, GuildConfig};

/// Operations on guild-scoped content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Create new content.
    Create,
    /// Modify existing content.
    Update,
    /// Remove content.
    Delete,
    /// View content.
    Read,
}

impl Operation {
    /// Returns all operations.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Create, Self::Update, Self::Delete, Self::Read]
    }

    /// Returns the operation as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Read => "read",
        }
    }

    /// Returns `true` for operations that mutate content.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        !matches!(self, Self::Read)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "read" => Ok(Self::Read),
            other => Err(Error::InvalidInput(format!("unknown operation: {other}"))),
        }
    }
}

/// Outcome of [`check_operation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionCheck {
    /// Whether the operation may proceed.
    pub allowed: bool,
    /// Why it may not, when denied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PermissionCheck {
    /// An allowed result.
    #[must_use]
    pub const fn granted() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    /// A denied result with the given reason.
    #[must_use]
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Whether the member is trusted to manage the guild's content.
///
/// Manage Channels and Manage Events do not count.
#[must_use]
pub const fn can_manage_guild(caps: &CapabilitySet) -> bool {
    caps.administrator || caps.manage_guild || caps.manage_messages || caps.manage_roles
}

/// Whether the member may invite the bot into the guild.
///
/// Narrower than [`can_manage_guild`]: only Administrator or Manage Guild.
#[must_use]
pub const fn can_invite_bot(caps: &CapabilitySet) -> bool {
    caps.administrator || caps.manage_guild
}

/// Decides whether `operation` is permitted in a guild.
#[must_use]
pub fn check_operation(
    operation: Operation,
    config: &GuildConfig,
    caps: &CapabilitySet,
) -> PermissionCheck {
    if !operation.is_write() || !config.restricted || can_manage_guild(caps) {
        return PermissionCheck::granted();
    }

    tracing::debug!(
        guild_id = %config.guild_id,
        operation = %operation,
        "Write denied in restricted guild"
    );

    PermissionCheck::denied(format!(
        "This server only lets members with Administrator, Manage Server, Manage Messages \
         or Manage Roles {operation} events"
    ))
}
