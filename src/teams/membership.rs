//! Membership rules: who may change whose role, and who may leave or be
//! removed.
//!
//! The owner row is untouchable here. It is created once, with the team, and
//! no path in this module changes its role or deletes it.

use super::repository::{MemberRepository, NewMember};
use super::role::{Permission, Role};
use super::types::{Member, Team};
use crate::clock::Clock;
use crate::TeamError;

/// Enforces membership rules over any [`MemberRepository`], including the
/// transaction-bound one.
pub struct MembershipManager<'a> {
    members: &'a dyn MemberRepository,
    clock: &'a dyn Clock,
}

impl<'a> MembershipManager<'a> {
    pub fn new(members: &'a dyn MemberRepository, clock: &'a dyn Clock) -> Self {
        Self { members, clock }
    }

    /// Creates the single owner row. Only called while creating `team`, inside
    /// the same transaction as the team insert.
    pub(crate) async fn add_owner(&self, team: &Team) -> Result<Member, TeamError> {
        self.members
            .add(NewMember {
                team_id: team.id,
                user_id: team.owner_id,
                role: Role::Owner,
                joined_at: team.created_at,
            })
            .await
    }

    /// Adds a non-owner member.
    pub(crate) async fn add(
        &self,
        team_id: i64,
        user_id: i64,
        role: Role,
    ) -> Result<Member, TeamError> {
        if role == Role::Owner {
            return Err(TeamError::OnlyOwnerCanTransfer);
        }
        self.members
            .add(NewMember {
                team_id,
                user_id,
                role,
                joined_at: self.clock.now(),
            })
            .await
    }

    pub async fn get(&self, team_id: i64, user_id: i64) -> Result<Member, TeamError> {
        self.members
            .find(team_id, user_id)
            .await?
            .ok_or(TeamError::MemberNotFound { team_id, user_id })
    }

    pub async fn count(&self, team_id: i64) -> Result<u32, TeamError> {
        self.members.count(team_id).await
    }

    /// Resolves `user_id`'s membership and checks it grants `permission`.
    ///
    /// A non-member has no standing, so a missing row is `PermissionDenied`
    /// rather than `MemberNotFound`.
    pub async fn require(
        &self,
        team_id: i64,
        user_id: i64,
        permission: Permission,
    ) -> Result<Member, TeamError> {
        let member = self
            .members
            .find(team_id, user_id)
            .await?
            .ok_or(TeamError::PermissionDenied)?;

        if !member.role.has_permission(permission) {
            return Err(TeamError::PermissionDenied);
        }
        Ok(member)
    }

    /// Changes `target_id`'s role on behalf of `requester_id`.
    ///
    /// Never touches the owner and never creates a second one.
    pub async fn update_role(
        &self,
        team_id: i64,
        target_id: i64,
        requester_id: i64,
        new_role: Role,
    ) -> Result<Member, TeamError> {
        let requester = self
            .require(team_id, requester_id, Permission::UpdateRole)
            .await?;
        let target = self.get(team_id, target_id).await?;

        if target.role == Role::Owner {
            return Err(TeamError::CannotChangeOwner);
        }
        if new_role == Role::Owner {
            return Err(TeamError::OnlyOwnerCanTransfer);
        }
        if !requester.role.can_assign(new_role) {
            return Err(TeamError::PermissionDenied);
        }

        self.members
            .update_role(team_id, target_id, new_role, self.clock.now())
            .await
    }

    /// Removes `target_id` from the team.
    ///
    /// Removing yourself is leaving and skips the `RemoveMember` check.
    pub async fn remove(
        &self,
        team_id: i64,
        target_id: i64,
        requester_id: i64,
    ) -> Result<(), TeamError> {
        let target = self.get(team_id, target_id).await?;

        if target.role == Role::Owner {
            return Err(TeamError::CannotRemoveOwner);
        }
        if target_id != requester_id {
            self.require(team_id, requester_id, Permission::RemoveMember)
                .await?;
        }

        self.members.remove(team_id, target_id).await
    }

    /// The member-triggered exit. The owner cannot leave.
    pub async fn leave(&self, team_id: i64, user_id: i64) -> Result<(), TeamError> {
        self.remove(team_id, user_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::clock::SystemClock;
    use crate::teams::MemoryStore;

    const TEAM: i64 = 1;
    const OWNER: i64 = 1;
    const ADMIN: i64 = 2;
    const MEMBER: i64 = 3;
    const GUEST: i64 = 4;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (user_id, role) in [
            (OWNER, Role::Owner),
            (ADMIN, Role::Admin),
            (MEMBER, Role::Member),
            (GUEST, Role::Guest),
        ] {
            store
                .add(NewMember {
                    team_id: TEAM,
                    user_id,
                    role,
                    joined_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_admin_promotes_member() {
        let store = seeded().await;
        let manager = MembershipManager::new(&store, &SystemClock);

        let updated = manager
            .update_role(TEAM, MEMBER, ADMIN, Role::Admin)
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_non_member_requester_is_denied() {
        let store = seeded().await;
        let manager = MembershipManager::new(&store, &SystemClock);

        let result = manager.update_role(TEAM, MEMBER, 99, Role::Guest).await;
        assert_eq!(result.unwrap_err(), TeamError::PermissionDenied);
    }

    #[tokio::test]
    async fn test_member_cannot_update_roles() {
        let store = seeded().await;
        let manager = MembershipManager::new(&store, &SystemClock);

        let result = manager.update_role(TEAM, GUEST, MEMBER, Role::Member).await;
        assert_eq!(result.unwrap_err(), TeamError::PermissionDenied);
    }

    #[tokio::test]
    async fn test_missing_target_is_not_found() {
        let store = seeded().await;
        let manager = MembershipManager::new(&store, &SystemClock);

        let result = manager.update_role(TEAM, 42, OWNER, Role::Member).await;
        assert_eq!(
            result.unwrap_err(),
            TeamError::MemberNotFound {
                team_id: TEAM,
                user_id: 42
            }
        );
    }

    #[tokio::test]
    async fn test_owner_role_is_frozen() {
        let store = seeded().await;
        let manager = MembershipManager::new(&store, &SystemClock);

        let by_admin = manager.update_role(TEAM, OWNER, ADMIN, Role::Member).await;
        assert_eq!(by_admin.unwrap_err(), TeamError::CannotChangeOwner);

        let by_owner = manager.update_role(TEAM, OWNER, OWNER, Role::Admin).await;
        assert_eq!(by_owner.unwrap_err(), TeamError::CannotChangeOwner);
    }

    #[tokio::test]
    async fn test_promote_to_owner_is_rejected() {
        let store = seeded().await;
        let manager = MembershipManager::new(&store, &SystemClock);

        let result = manager.update_role(TEAM, ADMIN, OWNER, Role::Owner).await;
        assert_eq!(result.unwrap_err(), TeamError::OnlyOwnerCanTransfer);
        assert_eq!(manager.get(TEAM, ADMIN).await.unwrap().role, Role::Admin);
    }

    #[tokio::test]
    async fn test_owner_cannot_be_removed_or_leave() {
        let store = seeded().await;
        let manager = MembershipManager::new(&store, &SystemClock);

        assert_eq!(
            manager.remove(TEAM, OWNER, ADMIN).await.unwrap_err(),
            TeamError::CannotRemoveOwner
        );
        assert_eq!(
            manager.remove(TEAM, OWNER, OWNER).await.unwrap_err(),
            TeamError::CannotRemoveOwner
        );
        assert_eq!(
            manager.leave(TEAM, OWNER).await.unwrap_err(),
            TeamError::CannotRemoveOwner
        );
        assert_eq!(manager.count(TEAM).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_member_cannot_remove_others() {
        let store = seeded().await;
        let manager = MembershipManager::new(&store, &SystemClock);

        let result = manager.remove(TEAM, GUEST, MEMBER).await;
        assert_eq!(result.unwrap_err(), TeamError::PermissionDenied);
        assert_eq!(manager.count(TEAM).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_self_removal_skips_permission_check() {
        let store = seeded().await;
        let manager = MembershipManager::new(&store, &SystemClock);

        manager.remove(TEAM, GUEST, GUEST).await.unwrap();
        assert!(matches!(
            manager.get(TEAM, GUEST).await,
            Err(TeamError::MemberNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_admin_removes_member() {
        let store = seeded().await;
        let manager = MembershipManager::new(&store, &SystemClock);

        manager.remove(TEAM, MEMBER, ADMIN).await.unwrap();
        assert_eq!(manager.count(TEAM).await.unwrap(), 3);
    }
}
