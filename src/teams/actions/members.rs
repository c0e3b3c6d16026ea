use crate::teams::membership::MembershipManager;
use crate::teams::role::{Permission, Role};
use crate::teams::types::{Member, MemberWithUser};
use crate::teams::TeamPorts;
use crate::TeamError;

fn memberships(ports: &TeamPorts) -> MembershipManager<'_> {
    MembershipManager::new(ports.members.as_ref(), ports.clock.as_ref())
}

/// Member rows outlive a soft-deleted team, so every operation resolves the
/// team first.
async fn require_team(ports: &TeamPorts, team_id: i64) -> Result<(), TeamError> {
    ports
        .teams
        .find_by_id(team_id)
        .await?
        .ok_or(TeamError::TeamNotFound(team_id))?;
    Ok(())
}

/// Lists a team's members with their directory details.
pub struct ListMembersAction {
    ports: TeamPorts,
}

impl ListMembersAction {
    pub fn new(ports: TeamPorts) -> Self {
        Self { ports }
    }

    /// Any member, guests included, may list the team.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "list_members", skip_all, err)
    )]
    pub async fn execute(
        &self,
        team_id: i64,
        requester_id: i64,
    ) -> Result<Vec<MemberWithUser>, TeamError> {
        require_team(&self.ports, team_id).await?;

        memberships(&self.ports)
            .require(team_id, requester_id, Permission::View)
            .await?;

        self.ports.members.list_with_users(team_id).await
    }
}

#[derive(Debug, Clone)]
pub struct UpdateMemberRoleInput {
    pub team_id: i64,
    pub target_user_id: i64,
    pub requester_id: i64,
    pub new_role: Role,
}

/// Changes a member's role.
pub struct UpdateMemberRoleAction {
    ports: TeamPorts,
}

impl UpdateMemberRoleAction {
    pub fn new(ports: TeamPorts) -> Self {
        Self { ports }
    }

    /// # Returns
    ///
    /// - `Ok(member)` - the member with the new role
    /// - `Err(TeamError::TeamNotFound(_))` - team is missing or deleted
    /// - `Err(TeamError::PermissionDenied)` - requester lacks `UpdateRole` or
    ///   cannot grant `new_role`
    /// - `Err(TeamError::MemberNotFound { .. })` - target is not a member
    /// - `Err(TeamError::CannotChangeOwner)` - target is the owner
    /// - `Err(TeamError::OnlyOwnerCanTransfer)` - `new_role` is owner
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "update_member_role", skip_all, err)
    )]
    pub async fn execute(&self, input: UpdateMemberRoleInput) -> Result<Member, TeamError> {
        require_team(&self.ports, input.team_id).await?;

        let member = memberships(&self.ports)
            .update_role(
                input.team_id,
                input.target_user_id,
                input.requester_id,
                input.new_role,
            )
            .await?;

        log::info!(
            target: "teamgate",
            "msg=\"member role updated\", team_id={}, user_id={}, role=\"{}\", requester_id={}",
            member.team_id,
            member.user_id,
            member.role,
            input.requester_id
        );

        Ok(member)
    }
}

/// Removes a member on behalf of someone with `RemoveMember` permission.
pub struct RemoveMemberAction {
    ports: TeamPorts,
}

impl RemoveMemberAction {
    pub fn new(ports: TeamPorts) -> Self {
        Self { ports }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "remove_member", skip_all, err)
    )]
    pub async fn execute(
        &self,
        team_id: i64,
        target_user_id: i64,
        requester_id: i64,
    ) -> Result<(), TeamError> {
        require_team(&self.ports, team_id).await?;

        memberships(&self.ports)
            .remove(team_id, target_user_id, requester_id)
            .await?;

        log::info!(
            target: "teamgate",
            "msg=\"member removed\", team_id={team_id}, user_id={target_user_id}, requester_id={requester_id}"
        );

        Ok(())
    }
}

pub struct LeaveTeamAction {
    ports: TeamPorts,
}

impl LeaveTeamAction {
    pub fn new(ports: TeamPorts) -> Self {
        Self { ports }
    }

    /// Removes the caller from the team. The owner cannot leave.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "leave_team", skip_all, err)
    )]
    pub async fn execute(&self, team_id: i64, user_id: i64) -> Result<(), TeamError> {
        require_team(&self.ports, team_id).await?;

        memberships(&self.ports).leave(team_id, user_id).await?;

        log::info!(
            target: "teamgate",
            "msg=\"member left\", team_id={team_id}, user_id={user_id}"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::teams::actions::{CreateTeamAction, CreateTeamInput};
    use crate::teams::repository::{MemberRepository, NewMember};
    use crate::teams::MemoryStore;

    const OWNER: i64 = 1;
    const ADMIN: i64 = 2;
    const MEMBER: i64 = 3;

    async fn setup() -> (MemoryStore, TeamPorts, i64) {
        let store = MemoryStore::new();
        let owner = store.insert_user("owner@example.com", "Owner").await;
        let admin = store.insert_user("admin@example.com", "Admin").await;
        let member = store.insert_user("member@example.com", "Member").await;
        assert_eq!((owner.id, admin.id, member.id), (OWNER, ADMIN, MEMBER));

        let ports = TeamPorts::from_store(store.clone());
        let team = CreateTeamAction::new(ports.clone())
            .execute(CreateTeamInput::new(OWNER, "Platform"))
            .await
            .unwrap();

        for (user_id, role) in [(ADMIN, Role::Admin), (MEMBER, Role::Member)] {
            store
                .add(NewMember {
                    team_id: team.id,
                    user_id,
                    role,
                    joined_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        (store, ports, team.id)
    }

    #[tokio::test]
    async fn test_list_members_includes_directory_details() {
        let (_, ports, team_id) = setup().await;

        let members = ListMembersAction::new(ports.clone())
            .execute(team_id, MEMBER)
            .await
            .unwrap();
        assert_eq!(members.len(), 3);
        let owner = members.iter().find(|m| m.member.user_id == OWNER).unwrap();
        assert_eq!(owner.email, "owner@example.com");
        assert_eq!(owner.member.role, Role::Owner);

        let outsider = ListMembersAction::new(ports).execute(team_id, 42).await;
        assert_eq!(outsider.unwrap_err(), TeamError::PermissionDenied);
    }

    #[tokio::test]
    async fn test_update_member_role() {
        let (_, ports, team_id) = setup().await;
        let action = UpdateMemberRoleAction::new(ports);

        let demoted = action
            .execute(UpdateMemberRoleInput {
                team_id,
                target_user_id: MEMBER,
                requester_id: ADMIN,
                new_role: Role::Guest,
            })
            .await
            .unwrap();
        assert_eq!(demoted.role, Role::Guest);

        let owner_change = action
            .execute(UpdateMemberRoleInput {
                team_id,
                target_user_id: OWNER,
                requester_id: ADMIN,
                new_role: Role::Admin,
            })
            .await;
        assert_eq!(owner_change.unwrap_err(), TeamError::CannotChangeOwner);
    }

    #[tokio::test]
    async fn test_remove_and_leave() {
        let (store, ports, team_id) = setup().await;

        assert_eq!(
            RemoveMemberAction::new(ports.clone())
                .execute(team_id, ADMIN, MEMBER)
                .await
                .unwrap_err(),
            TeamError::PermissionDenied
        );

        RemoveMemberAction::new(ports.clone())
            .execute(team_id, MEMBER, ADMIN)
            .await
            .unwrap();
        LeaveTeamAction::new(ports.clone())
            .execute(team_id, ADMIN)
            .await
            .unwrap();
        assert_eq!(store.count(team_id).await.unwrap(), 1);

        assert_eq!(
            LeaveTeamAction::new(ports)
                .execute(team_id, OWNER)
                .await
                .unwrap_err(),
            TeamError::CannotRemoveOwner
        );
    }
}
