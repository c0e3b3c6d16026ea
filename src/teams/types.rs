//! Core types for team management.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::role::Role;
use super::slug::slugify;
use crate::TeamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamStatus {
    Active,
    Deleted,
}

impl TeamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// A team is a named collaboration space with one owner and bounded
/// membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    /// User ID of the team owner.
    pub owner_id: i64,
    pub name: String,
    /// Derived from `name`; unique per owner among active teams.
    pub slug: String,
    pub description: Option<String>,
    pub visibility: Visibility,
    /// Maximum number of members, owner included.
    pub member_limit: u32,
    pub status: TeamStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Team {
    /// Renames the team and re-derives its slug.
    pub fn set_name(&mut self, name: &str, now: DateTime<Utc>) {
        self.name = name.to_owned();
        self.slug = slugify(name);
        self.updated_at = now;
    }

    pub fn set_description(&mut self, description: Option<String>, now: DateTime<Utc>) {
        self.description = description;
        self.updated_at = now;
    }

    pub fn set_visibility(&mut self, visibility: Visibility, now: DateTime<Utc>) {
        self.visibility = visibility;
        self.updated_at = now;
    }

    /// Sets the member limit; zero is rejected.
    pub fn set_member_limit(&mut self, limit: u32, now: DateTime<Utc>) -> Result<(), TeamError> {
        if limit == 0 {
            return Err(TeamError::Validation(
                "member limit must be at least 1".to_owned(),
            ));
        }
        self.member_limit = limit;
        self.updated_at = now;
        Ok(())
    }

    /// Soft delete. Rows are kept; lookups skip deleted teams.
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) {
        self.status = TeamStatus::Deleted;
        self.updated_at = now;
    }

    pub fn is_deleted(&self) -> bool {
        self.status == TeamStatus::Deleted
    }
}

/// Links a user to a team with a role. Keyed by `(team_id, user_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub team_id: i64,
    pub user_id: i64,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A member joined with the user's directory details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberWithUser {
    #[serde(flatten)]
    pub member: Member,
    pub email: String,
    pub name: String,
}

/// A user as known to the external user directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: i64,
    /// Stored lowercase.
    pub email: String,
    pub name: String,
}

/// Invitation lifecycle. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
    Revoked,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "revoked" => Some(Self::Revoked),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// An invitation for an email address to join a team at a given role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: i64,
    pub team_id: i64,
    pub invited_by: i64,
    /// Lowercased invitee email.
    pub email: String,
    /// Set when the email already belonged to a known user at send time.
    pub invitee_user_id: Option<i64>,
    pub role: Role,
    /// SHA-256 hash of the invitation token.
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl Invitation {
    pub fn is_pending(&self) -> bool {
        self.status == InvitationStatus::Pending
    }

    /// Whether the expiry has passed at `now`, regardless of stored status.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_for(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email.trim())
    }
}

/// Read model returned by invitation listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvitationView {
    #[serde(flatten)]
    pub invitation: Invitation,
    /// True when still pending but past its expiry.
    pub is_expired: bool,
}

impl InvitationView {
    pub fn at(invitation: Invitation, now: DateTime<Utc>) -> Self {
        let is_expired = invitation.is_pending() && invitation.is_expired_at(now);
        Self {
            invitation,
            is_expired,
        }
    }
}
