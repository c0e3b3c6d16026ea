//! Storage ports consumed by the engine.
//!
//! Implement these traits to back the engine with your own database. The same
//! traits are exposed inside a transaction (see
//! [`TransactionScope`](super::TransactionScope)), so engine code reads the
//! same in both places.
//!
//! Implementations convert stored role/status strings into the closed enums
//! at this boundary; unknown values are reported as
//! [`TeamError::Database`] rather than passed inward.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::role::Role;
use super::types::{
    DirectoryUser, Invitation, InvitationStatus, Member, MemberWithUser, Team, Visibility,
};
use crate::TeamError;

#[derive(Debug, Clone)]
pub struct CreateTeam {
    pub owner_id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub visibility: Visibility,
    pub member_limit: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMember {
    pub team_id: i64,
    pub user_id: i64,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateInvitation {
    pub team_id: i64,
    pub invited_by: i64,
    pub email: String,
    pub invitee_user_id: Option<i64>,
    pub role: Role,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Pagination window for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    limit: u32,
    offset: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    /// Builds a page, clamping the limit to [`Page::MAX_LIMIT`].
    pub fn new(limit: u32, offset: u32) -> Result<Self, TeamError> {
        if limit == 0 {
            return Err(TeamError::Validation(
                "page limit must be at least 1".to_owned(),
            ));
        }
        Ok(Self {
            limit: limit.min(Self::MAX_LIMIT),
            offset,
        })
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// Teams. Deleted teams are invisible to every lookup.
#[async_trait]
pub trait TeamRepository: Send + Sync {
    async fn create(&self, data: CreateTeam) -> Result<Team, TeamError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Team>, TeamError>;
    async fn find_by_owner_and_slug(
        &self,
        owner_id: i64,
        slug: &str,
    ) -> Result<Option<Team>, TeamError>;
    /// Active teams `user_id` is a member of, newest first.
    async fn list_by_user(&self, user_id: i64, page: Page) -> Result<Vec<Team>, TeamError>;
    /// Persists every mutable field of `team`.
    async fn update(&self, team: &Team) -> Result<Team, TeamError>;
    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), TeamError>;
}

#[async_trait]
pub trait MemberRepository: Send + Sync {
    async fn add(&self, data: NewMember) -> Result<Member, TeamError>;
    async fn find(&self, team_id: i64, user_id: i64) -> Result<Option<Member>, TeamError>;
    async fn list(&self, team_id: i64) -> Result<Vec<Member>, TeamError>;
    async fn list_with_users(&self, team_id: i64) -> Result<Vec<MemberWithUser>, TeamError>;
    async fn update_role(
        &self,
        team_id: i64,
        user_id: i64,
        role: Role,
        at: DateTime<Utc>,
    ) -> Result<Member, TeamError>;
    async fn remove(&self, team_id: i64, user_id: i64) -> Result<(), TeamError>;
    async fn count(&self, team_id: i64) -> Result<u32, TeamError>;
}

#[async_trait]
pub trait InvitationRepository: Send + Sync {
    async fn create(&self, data: CreateInvitation) -> Result<Invitation, TeamError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Invitation>, TeamError>;
    async fn find_by_token_hash(&self, token_hash: &str)
        -> Result<Option<Invitation>, TeamError>;
    async fn find_pending_by_email(
        &self,
        team_id: i64,
        email: &str,
    ) -> Result<Option<Invitation>, TeamError>;
    async fn list_by_team(
        &self,
        team_id: i64,
        status: Option<InvitationStatus>,
        page: Page,
    ) -> Result<Vec<Invitation>, TeamError>;
    async fn list_by_email(
        &self,
        email: &str,
        status: Option<InvitationStatus>,
        page: Page,
    ) -> Result<Vec<Invitation>, TeamError>;
    /// Moves a still-pending invitation to `status`.
    ///
    /// The write is conditioned on the stored status being `Pending`; returns
    /// `None` when it no longer is. `accepted_at` is stamped for `Accepted`.
    async fn update_status(
        &self,
        id: i64,
        status: InvitationStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Invitation>, TeamError>;
    /// Revokes every pending invitation of a team, returning how many changed.
    async fn cancel_all_pending(&self, team_id: i64) -> Result<u64, TeamError>;
    /// Marks pending invitations whose expiry is before `now` as expired.
    async fn expire_stale(&self, team_id: Option<i64>, now: DateTime<Utc>)
        -> Result<u64, TeamError>;
}

/// Read-only view of the application's users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<DirectoryUser>, TeamError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<DirectoryUser>, TeamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_clamps_limit() {
        let page = Page::new(500, 10).unwrap();
        assert_eq!(page.limit(), Page::MAX_LIMIT);
        assert_eq!(page.offset(), 10);
    }

    #[test]
    fn test_page_rejects_zero_limit() {
        assert!(matches!(Page::new(0, 0), Err(TeamError::Validation(_))));
    }

    #[test]
    fn test_default_page_has_nonzero_limit() {
        let page = Page::default();
        assert_eq!(page.limit(), Page::DEFAULT_LIMIT);
        assert_eq!(page.offset(), 0);
    }
}
