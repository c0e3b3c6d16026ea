//! Input validation for team names and invitee emails.

pub mod email;
pub mod name;

pub use email::{normalize_email, validate_email};
pub use name::validate_team_name;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmailEmpty,
    EmailTooLong,
    EmailInvalidFormat,
    TeamNameEmpty,
    TeamNameTooLong,
    TeamNameWithoutSlug,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmailEmpty => write!(f, "Email cannot be empty"),
            Self::EmailTooLong => write!(f, "Email is too long (max 254 characters)"),
            Self::EmailInvalidFormat => write!(f, "Invalid email format"),
            Self::TeamNameEmpty => write!(f, "Team name cannot be empty"),
            Self::TeamNameTooLong => write!(f, "Team name is too long (max 100 characters)"),
            Self::TeamNameWithoutSlug => {
                write!(f, "Team name must contain at least one letter or digit")
            }
        }
    }
}

impl std::error::Error for ValidationError {}
