//! Role hierarchy, permission matrix, and assignment rules.
//!
//! Everything here is a pure function over closed enums. Other components call
//! these as guards before any mutation.

use serde::{Deserialize, Serialize};

/// A member's privilege tier, ordered `Owner > Admin > Member > Guest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Member,
    Guest,
}

/// A governed action on a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    View,
    Invite,
    RemoveMember,
    UpdateRole,
    UpdateTeam,
    DeleteTeam,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Owner, Role::Admin, Role::Member, Role::Guest];

    /// Convert to string for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
            Self::Guest => "guest",
        }
    }

    /// Parse from a stored string. Unknown values are `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            "guest" => Some(Self::Guest),
            _ => None,
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            Self::Owner => 100,
            Self::Admin => 75,
            Self::Member => 50,
            Self::Guest => 25,
        }
    }

    pub fn is_at_least(&self, other: Role) -> bool {
        self.level() >= other.level()
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        match permission {
            Permission::View => true,
            Permission::Invite
            | Permission::RemoveMember
            | Permission::UpdateRole
            | Permission::UpdateTeam => matches!(self, Self::Owner | Self::Admin),
            Permission::DeleteTeam => matches!(self, Self::Owner),
        }
    }

    /// Whether a member holding `self` may hand out `target`.
    ///
    /// Nobody can assign `Owner`; owners and admins can assign the rest.
    pub fn can_assign(&self, target: Role) -> bool {
        match self {
            Self::Owner | Self::Admin => target != Self::Owner,
            Self::Member | Self::Guest => false,
        }
    }

    /// Roles that may be offered through an invitation.
    pub fn valid_invite_roles() -> &'static [Role] {
        &[Role::Admin, Role::Member, Role::Guest]
    }

    pub fn is_valid_invite_role(&self) -> bool {
        Self::valid_invite_roles().contains(self)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Privilege level of a raw role string; unknown roles are level 0.
pub fn level_of(role: &str) -> u8 {
    Role::parse(role).map_or(0, |r| r.level())
}
