use crate::teams::types::{Invitation, Member};
use crate::teams::{InvitationEngine, TeamPorts};
use crate::{SecretString, TeamError};

/// Action to accept a team invitation.
///
/// The caller supplies the plain token (received out of band) and the
/// authenticated user's id and email. The invitation must be addressed to
/// that email.
pub struct AcceptInvitationAction {
    ports: TeamPorts,
}

impl AcceptInvitationAction {
    pub fn new(ports: TeamPorts) -> Self {
        Self { ports }
    }

    /// # Returns
    ///
    /// - `Ok(member)` - the new membership, at the invitation's role
    /// - `Err(TeamError::InvitationNotFound)` - unknown token
    /// - `Err(TeamError::InvitationNotForYou)` - addressed to another email
    /// - `Err(TeamError::InvitationAlreadyProcessed(_))` - no longer pending
    /// - `Err(TeamError::InvitationExpired(_))` - past its expiry
    /// - `Err(TeamError::MemberLimitExceeded { .. })` - team filled up since
    ///   the invitation was sent
    /// - `Err(TeamError::AlreadyMember { .. })` - user joined by other means
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "accept_invitation", skip_all, err)
    )]
    pub async fn execute(
        &self,
        token: &SecretString,
        user_id: i64,
        user_email: &str,
    ) -> Result<Member, TeamError> {
        let member = InvitationEngine::new(&self.ports)
            .accept(token, user_id, user_email)
            .await?;

        log::info!(
            target: "teamgate",
            "msg=\"invitation accepted\", team_id={}, user_id={}, role=\"{}\"",
            member.team_id,
            member.user_id,
            member.role
        );

        Ok(member)
    }
}

/// Action to decline a team invitation.
pub struct RejectInvitationAction {
    ports: TeamPorts,
}

impl RejectInvitationAction {
    pub fn new(ports: TeamPorts) -> Self {
        Self { ports }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "reject_invitation", skip_all, err)
    )]
    pub async fn execute(
        &self,
        token: &SecretString,
        user_email: &str,
    ) -> Result<Invitation, TeamError> {
        let invitation = InvitationEngine::new(&self.ports)
            .reject(token, user_email)
            .await?;

        log::info!(
            target: "teamgate",
            "msg=\"invitation rejected\", team_id={}, invitation_id={}",
            invitation.team_id,
            invitation.id
        );

        Ok(invitation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::teams::actions::{
        CreateTeamAction, CreateTeamInput, SendInvitationAction, SendInvitationInput,
    };
    use crate::teams::role::Role;
    use crate::teams::types::InvitationStatus;
    use crate::teams::MemoryStore;

    async fn invited(email: &str, role: Role) -> (TeamPorts, SecretString) {
        let ports = TeamPorts::from_store(MemoryStore::new());
        let team = CreateTeamAction::new(ports.clone())
            .execute(CreateTeamInput::new(1, "Ops"))
            .await
            .unwrap();
        let sent = SendInvitationAction::new(ports.clone())
            .execute(SendInvitationInput {
                team_id: team.id,
                inviter_id: 1,
                email: email.to_owned(),
                role,
            })
            .await
            .unwrap();
        (ports, sent.token)
    }

    #[tokio::test]
    async fn test_accept_adds_member_with_offered_role() {
        let (ports, token) = invited("dev@example.com", Role::Admin).await;

        let member = AcceptInvitationAction::new(ports.clone())
            .execute(&token, 2, "DEV@example.com")
            .await
            .unwrap();
        assert_eq!(member.role, Role::Admin);
        assert_eq!(ports.members.count(member.team_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_accept_twice_is_already_processed() {
        let (ports, token) = invited("dev@example.com", Role::Member).await;
        let action = AcceptInvitationAction::new(ports);

        action.execute(&token, 2, "dev@example.com").await.unwrap();
        let second = action.execute(&token, 2, "dev@example.com").await;
        assert!(matches!(
            second,
            Err(TeamError::InvitationAlreadyProcessed(_))
        ));
    }

    #[tokio::test]
    async fn test_accept_unknown_token() {
        let (ports, _) = invited("dev@example.com", Role::Member).await;

        let result = AcceptInvitationAction::new(ports)
            .execute(&SecretString::new("bogus"), 2, "dev@example.com")
            .await;
        assert_eq!(result.unwrap_err(), TeamError::InvitationNotFound);
    }

    #[tokio::test]
    async fn test_reject_wrong_email() {
        let (ports, token) = invited("dev@example.com", Role::Member).await;
        let action = RejectInvitationAction::new(ports);

        assert_eq!(
            action
                .execute(&token, "someone@example.com")
                .await
                .unwrap_err(),
            TeamError::InvitationNotForYou
        );

        let rejected = action.execute(&token, "dev@example.com").await.unwrap();
        assert_eq!(rejected.status, InvitationStatus::Rejected);
    }
}
