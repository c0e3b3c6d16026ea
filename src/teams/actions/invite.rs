use crate::teams::invitations::SentInvitation;
use crate::teams::membership::MembershipManager;
use crate::teams::repository::Page;
use crate::teams::role::{Permission, Role};
use crate::teams::types::{Invitation, InvitationStatus, InvitationView};
use crate::teams::{InvitationEngine, TeamPorts};
use crate::validators::normalize_email;
use crate::TeamError;

/// Input for sending a team invitation.
#[derive(Debug, Clone)]
pub struct SendInvitationInput {
    pub team_id: i64,
    pub inviter_id: i64,
    pub email: String,
    pub role: Role,
}

/// Action to invite an email address to a team.
///
/// The returned token should be delivered to the invitee (e.g. by email). It
/// is hashed before storage and cannot be recovered later.
pub struct SendInvitationAction {
    ports: TeamPorts,
}

impl SendInvitationAction {
    pub fn new(ports: TeamPorts) -> Self {
        Self { ports }
    }

    /// # Returns
    ///
    /// - `Ok(sent)` - invitation created, with the plain token for delivery
    /// - `Err(TeamError::PermissionDenied)` - inviter lacks `Invite` or cannot
    ///   grant `role`
    /// - `Err(TeamError::InvalidRole)` - `role` is not invitable
    /// - `Err(TeamError::MemberLimitExceeded { .. })` - team is full
    /// - `Err(TeamError::AlreadyMember { .. })` - email belongs to a member
    /// - `Err(TeamError::InvitationAlreadyPending { .. })` - one is outstanding
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "send_invitation", skip_all, err)
    )]
    pub async fn execute(&self, input: SendInvitationInput) -> Result<SentInvitation, TeamError> {
        let sent = InvitationEngine::new(&self.ports)
            .send(input.team_id, input.inviter_id, &input.email, input.role)
            .await?;

        log::info!(
            target: "teamgate",
            "msg=\"invitation sent\", team_id={}, invitation_id={}, role=\"{}\", invited_by={}",
            sent.invitation.team_id,
            sent.invitation.id,
            sent.invitation.role,
            sent.invitation.invited_by
        );

        Ok(sent)
    }
}

/// Lists a team's invitations for members allowed to invite.
pub struct ListTeamInvitationsAction {
    ports: TeamPorts,
}

impl ListTeamInvitationsAction {
    pub fn new(ports: TeamPorts) -> Self {
        Self { ports }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "list_team_invitations", skip_all, err)
    )]
    pub async fn execute(
        &self,
        team_id: i64,
        requester_id: i64,
        status: Option<InvitationStatus>,
        page: Page,
    ) -> Result<Vec<InvitationView>, TeamError> {
        self.ports
            .teams
            .find_by_id(team_id)
            .await?
            .ok_or(TeamError::TeamNotFound(team_id))?;

        MembershipManager::new(self.ports.members.as_ref(), self.ports.clock.as_ref())
            .require(team_id, requester_id, Permission::Invite)
            .await?;

        let now = self.ports.clock.now();
        let invitations = self
            .ports
            .invitations
            .list_by_team(team_id, status, page)
            .await?;

        Ok(invitations
            .into_iter()
            .map(|invitation| InvitationView::at(invitation, now))
            .collect())
    }
}

/// Lists invitations addressed to the caller's email.
pub struct ListMyInvitationsAction {
    ports: TeamPorts,
}

impl ListMyInvitationsAction {
    pub fn new(ports: TeamPorts) -> Self {
        Self { ports }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "list_my_invitations", skip_all, err)
    )]
    pub async fn execute(
        &self,
        user_email: &str,
        status: Option<InvitationStatus>,
        page: Page,
    ) -> Result<Vec<InvitationView>, TeamError> {
        let email = normalize_email(user_email);
        let now = self.ports.clock.now();

        let invitations = self
            .ports
            .invitations
            .list_by_email(&email, status, page)
            .await?;

        Ok(invitations
            .into_iter()
            .map(|invitation| InvitationView::at(invitation, now))
            .collect())
    }
}

pub struct RevokeInvitationAction {
    ports: TeamPorts,
}

impl RevokeInvitationAction {
    pub fn new(ports: TeamPorts) -> Self {
        Self { ports }
    }

    /// # Returns
    ///
    /// - `Ok(invitation)` - now `Revoked`
    /// - `Err(TeamError::InvitationNotFound)` - unknown id
    /// - `Err(TeamError::PermissionDenied)` - requester lacks `Invite`
    /// - `Err(TeamError::CannotRevokeProcessed(_))` - no longer pending
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "revoke_invitation", skip_all, err)
    )]
    pub async fn execute(
        &self,
        invitation_id: i64,
        requester_id: i64,
    ) -> Result<Invitation, TeamError> {
        let invitation = InvitationEngine::new(&self.ports)
            .revoke(invitation_id, requester_id)
            .await?;

        log::info!(
            target: "teamgate",
            "msg=\"invitation revoked\", team_id={}, invitation_id={}, requester_id={requester_id}",
            invitation.team_id,
            invitation.id
        );

        Ok(invitation)
    }
}

/// Marks pending invitations past their expiry as expired.
///
/// Acceptance already expires invitations it finds stale; run this
/// periodically (e.g. from a background task) so listings and the
/// one-pending-per-email rule see them too.
pub struct ExpireStaleInvitationsAction {
    ports: TeamPorts,
}

impl ExpireStaleInvitationsAction {
    pub fn new(ports: TeamPorts) -> Self {
        Self { ports }
    }

    /// Sweeps one team, or every team when `team_id` is `None`. Returns the
    /// number of invitations expired.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self), name = "expire_stale_invitations", err)
    )]
    pub async fn execute(&self, team_id: Option<i64>) -> Result<u64, TeamError> {
        let expired = InvitationEngine::new(&self.ports)
            .expire_stale(team_id)
            .await?;

        log::info!(
            target: "teamgate",
            "msg=\"stale invitations expired\", count={expired}"
        );

        Ok(expired)
    }
}
