//! Decoded platform permission bitfields.
//!
//! The platform reports a member's effective permissions in a guild as a
//! decimal string. Bit positions run past 53, so the value is parsed into a
//! `u128` rather than going anywhere near floating point.
//!
//! # Example
//!
//! ```rust
//! use guildsync::models::CapabilitySet;
//!
//! let caps = CapabilitySet::decode("40");
//! assert!(caps.administrator);
//! assert!(caps.manage_guild);
//! assert!(!caps.manage_roles);
//!
//! // Garbage never fails, it just grants nothing.
//! assert_eq!(CapabilitySet::decode("not-a-number"), CapabilitySet::none());
//! ```

use serde::{Deserialize, Serialize};

/// Named bit masks for the capabilities this crate cares about.
pub mod flags {
    /// Full access to the guild (bit 3).
    pub const ADMINISTRATOR: u128 = 1 << 3;
    /// Create, edit and delete channels (bit 4).
    pub const MANAGE_CHANNELS: u128 = 1 << 4;
    /// Edit guild settings (bit 5).
    pub const MANAGE_GUILD: u128 = 1 << 5;
    /// Moderate other members' content (bit 13).
    pub const MANAGE_MESSAGES: u128 = 1 << 13;
    /// Create and assign roles below the member's own (bit 28).
    pub const MANAGE_ROLES: u128 = 1 << 28;
    /// Create and edit scheduled events (bit 33).
    pub const MANAGE_EVENTS: u128 = 1 << 33;
}

/// Capabilities decoded from a platform permission string.
///
/// The raw value is kept for callers that need to test other bits, but it is
/// never serialized: JSON consumers cannot represent it without losing
/// precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySet {
    /// Administrator bit is set.
    pub administrator: bool,
    /// Manage Guild bit is set.
    pub manage_guild: bool,
    /// Manage Channels bit is set.
    pub manage_channels: bool,
    /// Manage Messages bit is set.
    pub manage_messages: bool,
    /// Manage Roles bit is set.
    pub manage_roles: bool,
    /// Manage Events bit is set.
    pub manage_events: bool,
    /// The full bitfield as reported by the platform.
    #[serde(skip)]
    pub raw: u128,
}

impl CapabilitySet {
    /// Returns a capability set with every flag cleared and `raw = 0`.
    #[must_use]
    pub const fn none() -> Self {
        Self::from_bits(0)
    }

    /// Builds a capability set from an already-parsed bitfield.
    #[must_use]
    pub const fn from_bits(raw: u128) -> Self {
        Self {
            administrator: raw & flags::ADMINISTRATOR != 0,
            manage_guild: raw & flags::MANAGE_GUILD != 0,
            manage_channels: raw & flags::MANAGE_CHANNELS != 0,
            manage_messages: raw & flags::MANAGE_MESSAGES != 0,
            manage_roles: raw & flags::MANAGE_ROLES != 0,
            manage_events: raw & flags::MANAGE_EVENTS != 0,
            raw,
        }
    }

    /// Decodes a decimal permission string.
    ///
    /// This is total: empty input, non-decimal text, negative numbers and
    /// values wider than 128 bits all decode to [`CapabilitySet::none`].
    #[must_use]
    pub fn decode(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::none();
        }

        trimmed.parse::<u128>().map_or_else(
            |e| {
                tracing::trace!(input = %raw, error = %e, "Unparseable permission string");
                Self::none()
            },
            Self::from_bits,
        )
    }

    /// Returns `true` if every bit in `mask` is present in the raw value.
    #[must_use]
    pub const fn contains(&self, mask: u128) -> bool {
        self.raw & mask == mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_empty_is_none() {
        assert_eq!(CapabilitySet::decode(""), CapabilitySet::none());
        assert_eq!(CapabilitySet::decode("   "), CapabilitySet::none());
    }

    #[test]
    fn test_decode_garbage_is_none() {
        for input in ["abc", "-8", "8.0", "0x20", "1e9", "8 8"] {
            let caps = CapabilitySet::decode(input);
            assert_eq!(caps, CapabilitySet::none(), "input {input:?}");
            assert_eq!(caps.raw, 0);
        }
    }

    #[test]
    fn test_decode_overflow_is_none() {
        // 2^128 does not fit
        let too_wide = "340282366920938463463374607431768211456";
        assert_eq!(CapabilitySet::decode(too_wide), CapabilitySet::none());
    }

    #[test]
    fn test_single_flags() {
        let admin = CapabilitySet::decode("8");
        assert!(admin.administrator);
        assert!(!admin.manage_guild);
        assert!(!admin.manage_channels);
        assert!(!admin.manage_messages);
        assert!(!admin.manage_roles);
        assert!(!admin.manage_events);

        let guild = CapabilitySet::decode("32");
        assert!(guild.manage_guild);
        assert!(!guild.administrator);

        let both = CapabilitySet::decode("40");
        assert!(both.administrator);
        assert!(both.manage_guild);
        assert_eq!(both.raw, 40);
    }

    #[test]
    fn test_bits_above_53() {
        // MANAGE_EVENTS plus a high bit the platform may add later
        let value = flags::MANAGE_EVENTS | (1 << 60);
        let caps = CapabilitySet::decode(&value.to_string());
        assert!(caps.manage_events);
        assert!(!caps.administrator);
        assert_eq!(caps.raw, value);
        assert!(caps.contains(1 << 60));
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        assert!(CapabilitySet::decode(" 8\n").administrator);
    }

    #[test]
    fn test_raw_not_serialized() {
        let caps = CapabilitySet::decode("8589934592");
        let json = serde_json::to_value(caps).unwrap();
        assert_eq!(json["manageEvents"], true);
        assert!(json.get("raw").is_none());
    }
}
