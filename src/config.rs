//! Configuration types for the team engine.
//!
//! # Example
//!
//! ```rust
//! use teamgate::config::{InvitationConfig, TeamsConfig};
//! use chrono::Duration;
//!
//! // Use defaults
//! let config = TeamsConfig::default();
//! assert_eq!(config.default_member_limit, 5);
//!
//! // Or customize
//! let config = TeamsConfig {
//!     default_member_limit: 25,
//!     invitation: InvitationConfig {
//!         expiry: Duration::days(3),
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! }
//! .with_base_url("https://app.example.com");
//! ```

use chrono::Duration;

/// Main configuration for the team engine.
#[derive(Debug, Clone)]
pub struct TeamsConfig {
    /// Member limit given to newly created teams.
    ///
    /// Default: 5
    pub default_member_limit: u32,

    /// Invitation token and expiry settings.
    pub invitation: InvitationConfig,

    /// Base URL used to format the acceptance link returned when an
    /// invitation is sent. No link is produced when unset.
    pub base_url: Option<String>,
}

impl Default for TeamsConfig {
    fn default() -> Self {
        Self {
            default_member_limit: 5,
            invitation: InvitationConfig::default(),
            base_url: None,
        }
    }
}

impl TeamsConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration suitable for development/testing.
    ///
    /// Larger teams and invitations that live for a month.
    pub fn development() -> Self {
        Self {
            default_member_limit: 50,
            invitation: InvitationConfig {
                token_length: 32,
                expiry: Duration::days(30),
            },
            base_url: None,
        }
    }

    /// Creates a configuration with shorter-lived, longer invitation tokens.
    pub fn strict() -> Self {
        Self {
            default_member_limit: 5,
            invitation: InvitationConfig {
                token_length: 48,
                expiry: Duration::hours(24),
            },
            base_url: None,
        }
    }

    /// Sets the base URL used for acceptance links.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Formats the acceptance link for a plaintext invitation token.
    pub fn accept_url(&self, token: &str) -> Option<String> {
        self.base_url.as_ref().map(|base| {
            format!(
                "{}/invitations/accept?token={token}",
                base.trim_end_matches('/')
            )
        })
    }
}

/// Configuration for team invitations.
#[derive(Debug, Clone)]
pub struct InvitationConfig {
    /// Number of random bytes in an invitation token before encoding.
    ///
    /// Default: 32 (43 characters once base64url encoded)
    pub token_length: usize,

    /// How long an invitation stays acceptable after it is sent.
    ///
    /// Default: 7 days
    pub expiry: Duration,
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            token_length: 32,
            expiry: Duration::days(7),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TeamsConfig::default();

        assert_eq!(config.default_member_limit, 5);
        assert_eq!(config.invitation.token_length, 32);
        assert_eq!(config.invitation.expiry, Duration::days(7));
        assert!(config.base_url.is_none());
    }

    #[test]
    fn test_strict_config() {
        let config = TeamsConfig::strict();

        assert_eq!(config.invitation.token_length, 48);
        assert_eq!(config.invitation.expiry, Duration::hours(24));
    }

    #[test]
    fn test_development_config() {
        let config = TeamsConfig::development();

        assert_eq!(config.default_member_limit, 50);
        assert_eq!(config.invitation.expiry, Duration::days(30));
    }

    #[test]
    fn test_accept_url() {
        let config = TeamsConfig::default();
        assert!(config.accept_url("abc").is_none());

        let config = config.with_base_url("https://app.example.com/");
        assert_eq!(
            config.accept_url("abc").as_deref(),
            Some("https://app.example.com/invitations/accept?token=abc")
        );
    }
}
