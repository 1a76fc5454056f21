//! Chat platform client.
//!
//! The reconciler only needs one upstream call: the list of guilds the
//! signed-in user belongs to, with their effective permissions in each.
//! [`PlatformClient`] is that seam; [`HttpPlatformClient`] talks to the real
//! REST API.

mod http;

pub use http::{HttpPlatformClient, PlatformHttpConfig};

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error as ThisError;

use crate::models::PlatformGuild;

/// Category of a platform failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformErrorKind {
    /// The platform rejected the credential (HTTP 401).
    Unauthorized,
    /// Any other non-success HTTP status.
    Http(u16),
    /// Connection, TLS or timeout failure.
    Transport,
    /// The response body could not be decoded.
    Decode,
}

impl PlatformErrorKind {
    /// Short machine-readable code.
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            Self::Unauthorized => "unauthorized".to_string(),
            Self::Http(status) => format!("http_{status}"),
            Self::Transport => "transport".to_string(),
            Self::Decode => "decode".to_string(),
        }
    }
}

/// A failed platform call.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("platform error ({}): {message}", .kind.code())]
pub struct PlatformError {
    /// What went wrong.
    pub kind: PlatformErrorKind,
    /// Upstream message.
    pub message: String,
}

impl PlatformError {
    /// Creates a new platform error.
    #[must_use]
    pub fn new(kind: PlatformErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns `true` if the platform rejected the credential.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self.kind, PlatformErrorKind::Unauthorized)
    }
}

/// Read access to the platform's view of a user.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Lists the guilds the token's owner belongs to.
    async fn list_user_guilds(
        &self,
        token: &SecretString,
    ) -> std::result::Result<Vec<PlatformGuild>, PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlatformError::new(PlatformErrorKind::Http(503), "Service Unavailable");
        assert_eq!(
            err.to_string(),
            "platform error (http_503): Service Unavailable"
        );
    }

    #[test]
    fn test_unauthorized() {
        assert!(PlatformError::new(PlatformErrorKind::Unauthorized, "401").is_unauthorized());
        assert!(!PlatformError::new(PlatformErrorKind::Transport, "reset").is_unauthorized());
    }
}
