//! The invitation state machine.
//!
//! ```text
//!            ┌──────────► Accepted
//!            ├──────────► Rejected
//!  Pending ──┼──────────► Revoked
//!            └──────────► Expired
//! ```
//!
//! `Pending` is the only state with outgoing transitions. Every transition is
//! written through [`InvitationRepository::update_status`], which refuses to
//! move an invitation that is no longer pending, so two racing callers cannot
//! both succeed.

use super::context::TeamPorts;
use super::membership::MembershipManager;
use super::repository::{CreateInvitation, InvitationRepository};
use super::role::{Permission, Role};
use super::transaction::run_atomically;
use super::types::{Invitation, InvitationStatus, Member};
use crate::crypto::{generate_token, hash_token};
use crate::validators::{normalize_email, validate_email};
use crate::{SecretString, TeamError};

/// Result of sending an invitation.
#[derive(Debug)]
pub struct SentInvitation {
    /// The stored invitation record.
    pub invitation: Invitation,
    /// The plain token to deliver to the invitee. Only its hash is stored, so
    /// this is the one chance to read it.
    pub token: SecretString,
    /// Acceptance link, when a base URL is configured.
    pub accept_url: Option<SecretString>,
}

pub struct InvitationEngine<'a> {
    ports: &'a TeamPorts,
}

impl<'a> InvitationEngine<'a> {
    pub fn new(ports: &'a TeamPorts) -> Self {
        Self { ports }
    }

    fn memberships(&self) -> MembershipManager<'a> {
        MembershipManager::new(self.ports.members.as_ref(), self.ports.clock.as_ref())
    }

    /// Issues a new pending invitation for `email` to join at `role`.
    pub async fn send(
        &self,
        team_id: i64,
        inviter_id: i64,
        email: &str,
        role: Role,
    ) -> Result<SentInvitation, TeamError> {
        let memberships = self.memberships();
        let inviter = memberships
            .require(team_id, inviter_id, Permission::Invite)
            .await?;

        if !role.is_valid_invite_role() {
            return Err(TeamError::InvalidRole);
        }
        if !inviter.role.can_assign(role) {
            return Err(TeamError::PermissionDenied);
        }

        let team = self
            .ports
            .teams
            .find_by_id(team_id)
            .await?
            .ok_or(TeamError::TeamNotFound(team_id))?;
        // checked again on accept
        if memberships.count(team_id).await? >= team.member_limit {
            return Err(TeamError::MemberLimitExceeded {
                team_id,
                limit: team.member_limit,
            });
        }

        let email = normalize_email(email);
        validate_email(&email)?;

        let invitee = self.ports.users.find_by_email(&email).await?;
        if let Some(user) = &invitee {
            if self.ports.members.find(team_id, user.id).await?.is_some() {
                return Err(TeamError::AlreadyMember { team_id });
            }
        }

        if self
            .ports
            .invitations
            .find_pending_by_email(team_id, &email)
            .await?
            .is_some()
        {
            return Err(TeamError::InvitationAlreadyPending { team_id });
        }

        let settings = &self.ports.config.invitation;
        let token = generate_token(self.ports.random.as_ref(), settings.token_length);
        let now = self.ports.clock.now();

        let invitation = self
            .ports
            .invitations
            .create(CreateInvitation {
                team_id,
                invited_by: inviter_id,
                email,
                invitee_user_id: invitee.map(|u| u.id),
                role,
                token_hash: hash_token(&token),
                expires_at: now + settings.expiry,
                created_at: now,
            })
            .await?;

        let accept_url = self.ports.config.accept_url(&token).map(SecretString::new);

        Ok(SentInvitation {
            invitation,
            token: SecretString::new(token),
            accept_url,
        })
    }

    /// Accepts the invitation behind `token` for the authenticated user.
    ///
    /// The member-limit check, the member insert, and the status change run
    /// in one transaction; a failure in any of them leaves no trace.
    pub async fn accept(
        &self,
        token: &SecretString,
        user_id: i64,
        user_email: &str,
    ) -> Result<Member, TeamError> {
        let invitation = self.resolve_for(token, user_email).await?;

        let now = self.ports.clock.now();
        if invitation.is_expired_at(now) {
            self.expire_lazily(&invitation).await;
            return Err(TeamError::InvitationExpired(invitation.id));
        }

        let clock = self.ports.clock.clone();
        run_atomically(self.ports.transactions.as_ref(), move |tx| {
            Box::pin(async move {
                let team = tx
                    .teams()
                    .find_by_id(invitation.team_id)
                    .await?
                    .ok_or(TeamError::TeamNotFound(invitation.team_id))?;

                let memberships = MembershipManager::new(tx.members(), clock.as_ref());
                if memberships.count(team.id).await? >= team.member_limit {
                    return Err(TeamError::MemberLimitExceeded {
                        team_id: team.id,
                        limit: team.member_limit,
                    });
                }

                let member = memberships.add(team.id, user_id, invitation.role).await?;

                tx.invitations()
                    .update_status(invitation.id, InvitationStatus::Accepted, clock.now())
                    .await?
                    .ok_or(TeamError::InvitationAlreadyProcessed(invitation.id))?;

                Ok(member)
            })
        })
        .await
    }

    /// Declines the invitation behind `token`. Allowed even past expiry.
    pub async fn reject(
        &self,
        token: &SecretString,
        user_email: &str,
    ) -> Result<Invitation, TeamError> {
        let invitation = self.resolve_for(token, user_email).await?;

        self.ports
            .invitations
            .update_status(
                invitation.id,
                InvitationStatus::Rejected,
                self.ports.clock.now(),
            )
            .await?
            .ok_or(TeamError::InvitationAlreadyProcessed(invitation.id))
    }

    /// Withdraws a pending invitation on behalf of a team member allowed to
    /// invite.
    pub async fn revoke(
        &self,
        invitation_id: i64,
        requester_id: i64,
    ) -> Result<Invitation, TeamError> {
        let invitation = self
            .ports
            .invitations
            .find_by_id(invitation_id)
            .await?
            .ok_or(TeamError::InvitationNotFound)?;

        self.memberships()
            .require(invitation.team_id, requester_id, Permission::Invite)
            .await?;

        if !invitation.is_pending() {
            return Err(TeamError::CannotRevokeProcessed(invitation.id));
        }

        self.ports
            .invitations
            .update_status(
                invitation.id,
                InvitationStatus::Revoked,
                self.ports.clock.now(),
            )
            .await?
            .ok_or(TeamError::CannotRevokeProcessed(invitation.id))
    }

    /// Revokes every pending invitation of a team. Called with the
    /// transaction-bound repository while the team is being deleted.
    pub async fn cancel_all_pending(
        invitations: &dyn InvitationRepository,
        team_id: i64,
    ) -> Result<u64, TeamError> {
        invitations.cancel_all_pending(team_id).await
    }

    /// Sweeps pending invitations past their expiry into `Expired`.
    pub async fn expire_stale(&self, team_id: Option<i64>) -> Result<u64, TeamError> {
        self.ports
            .invitations
            .expire_stale(team_id, self.ports.clock.now())
            .await
    }

    /// Token lookup, addressee check, and pending check shared by accept and
    /// reject.
    async fn resolve_for(
        &self,
        token: &SecretString,
        user_email: &str,
    ) -> Result<Invitation, TeamError> {
        let invitation = self
            .ports
            .invitations
            .find_by_token_hash(&hash_token(token.expose_secret()))
            .await?
            .ok_or(TeamError::InvitationNotFound)?;

        if !invitation.is_for(user_email) {
            return Err(TeamError::InvitationNotForYou);
        }
        if !invitation.is_pending() {
            return Err(TeamError::InvitationAlreadyProcessed(invitation.id));
        }
        Ok(invitation)
    }

    /// Records an observed expiry. Failure is logged and swallowed: the
    /// caller gets `InvitationExpired` either way, and later reads re-check
    /// the timestamp.
    async fn expire_lazily(&self, invitation: &Invitation) {
        let result = self
            .ports
            .invitations
            .update_status(
                invitation.id,
                InvitationStatus::Expired,
                self.ports.clock.now(),
            )
            .await;

        if let Err(e) = result {
            log::warn!(
                target: "teamgate",
                "msg=\"failed to mark invitation expired\", invitation_id={}, error=\"{e}\"",
                invitation.id
            );
        }
    }
}
