//! Team collaboration authorization and invitation lifecycle engine.
//!
//! `teamgate` decides who may act on a team and mediates how external users
//! are admitted into it. Storage is abstracted behind async repository traits;
//! enable `mocks` for in-memory implementations or `sqlx_sqlite` for a SQLite
//! backend.
//!
//! # Example
//!
//! ```rust,ignore
//! use teamgate::teams::actions::{CreateTeamAction, CreateTeamInput};
//! use teamgate::teams::{MemoryStore, TeamPorts};
//!
//! let store = MemoryStore::new();
//! let ports = TeamPorts::from_store(store);
//! let team = CreateTeamAction::new(ports)
//!     .execute(CreateTeamInput::new(1, "My Team"))
//!     .await?;
//! assert_eq!(team.slug, "my-team");
//! ```

pub mod clock;
pub mod config;
pub mod crypto;
mod secret;
pub mod teams;
pub mod validators;

#[cfg(feature = "sqlx_sqlite")]
pub mod sqlite;

pub use config::{InvitationConfig, TeamsConfig};
pub use secret::SecretString;

/// Stable error categories callers can render or map to transport codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    PermissionDenied,
    InvalidState,
    Expired,
    Validation,
    Internal,
}

/// Every failure an engine operation can return.
///
/// Business conditions are explicit variants; storage failures are wrapped in
/// [`TeamError::Database`] with a message only, so no driver type crosses this
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TeamError {
    #[error("team {0} not found")]
    TeamNotFound(i64),
    #[error("user {user_id} is not a member of team {team_id}")]
    MemberNotFound { team_id: i64, user_id: i64 },
    #[error("invitation not found")]
    InvitationNotFound,

    #[error("a team with slug \"{0}\" already exists")]
    SlugAlreadyExists(String),
    #[error("user is already a member of team {team_id}")]
    AlreadyMember { team_id: i64 },
    #[error("an invitation is already pending for this email on team {team_id}")]
    InvitationAlreadyPending { team_id: i64 },
    #[error("team {team_id} has reached its member limit of {limit}")]
    MemberLimitExceeded { team_id: i64, limit: u32 },

    #[error("insufficient permission")]
    PermissionDenied,
    #[error("the owner's role cannot be changed")]
    CannotChangeOwner,
    #[error("the owner cannot be removed from the team")]
    CannotRemoveOwner,
    #[error("only the owner can delete the team")]
    OnlyOwnerCanDelete,
    #[error("only the owner can transfer ownership")]
    OnlyOwnerCanTransfer,
    #[error("this invitation is addressed to a different email")]
    InvitationNotForYou,

    #[error("invalid role")]
    InvalidRole,
    #[error("invitation {0} has already been processed")]
    InvitationAlreadyProcessed(i64),
    #[error("invitation {0} has already been processed and cannot be revoked")]
    CannotRevokeProcessed(i64),

    #[error("invitation {0} has expired")]
    InvitationExpired(i64),

    #[error("validation error: {0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl TeamError {
    /// The stable category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TeamNotFound(_) | Self::MemberNotFound { .. } | Self::InvitationNotFound => {
                ErrorKind::NotFound
            }
            Self::SlugAlreadyExists(_)
            | Self::AlreadyMember { .. }
            | Self::InvitationAlreadyPending { .. }
            | Self::MemberLimitExceeded { .. } => ErrorKind::Conflict,
            Self::PermissionDenied
            | Self::CannotChangeOwner
            | Self::CannotRemoveOwner
            | Self::OnlyOwnerCanDelete
            | Self::OnlyOwnerCanTransfer
            | Self::InvitationNotForYou => ErrorKind::PermissionDenied,
            Self::InvalidRole
            | Self::InvitationAlreadyProcessed(_)
            | Self::CannotRevokeProcessed(_) => ErrorKind::InvalidState,
            Self::InvitationExpired(_) => ErrorKind::Expired,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Database(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<validators::ValidationError> for TeamError {
    fn from(err: validators::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}
