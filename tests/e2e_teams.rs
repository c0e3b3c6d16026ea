//! End-to-end team workflows against the in-memory store.
//!
//! Run with: `cargo test --features mocks --test e2e_teams`

#![cfg(feature = "mocks")]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use teamgate::clock::FixedClock;
use teamgate::teams::actions::{
    AcceptInvitationAction, CreateTeamAction, CreateTeamInput, DeleteTeamAction,
    LeaveTeamAction, ListMembersAction, ListMyInvitationsAction, ListTeamInvitationsAction,
    RejectInvitationAction, RemoveMemberAction, RevokeInvitationAction, SendInvitationAction,
    SendInvitationInput, UpdateMemberRoleAction, UpdateMemberRoleInput,
};
use teamgate::teams::{
    InvitationRepository, InvitationStatus, MemberRepository, MemoryStore, Page, Role, Team,
    TeamPorts, TransactionCoordinator, TransactionScope,
};
use teamgate::{ErrorKind, SecretString, TeamError, TeamsConfig};

const OWNER: i64 = 1;

struct World {
    store: MemoryStore,
    clock: Arc<FixedClock>,
    ports: TeamPorts,
}

fn world() -> World {
    let store = MemoryStore::new();
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let ports = TeamPorts::from_store(store.clone())
        .with_clock(clock.clone())
        .with_config(TeamsConfig::default().with_base_url("https://app.example.com/"));
    World {
        store,
        clock,
        ports,
    }
}

async fn create_team(w: &World, limit: u32) -> Team {
    CreateTeamAction::new(w.ports.clone())
        .execute(CreateTeamInput::new(OWNER, "My Team").member_limit(limit))
        .await
        .unwrap()
}

async fn send(w: &World, team_id: i64, email: &str, role: Role) -> SecretString {
    SendInvitationAction::new(w.ports.clone())
        .execute(SendInvitationInput {
            team_id,
            inviter_id: OWNER,
            email: email.to_owned(),
            role,
        })
        .await
        .unwrap()
        .token
}

/// Sends an invitation and accepts it as a fresh user id.
async fn admit(w: &World, team_id: i64, user_id: i64, role: Role) {
    let email = format!("user{user_id}@example.com");
    let token = send(w, team_id, &email, role).await;
    AcceptInvitationAction::new(w.ports.clone())
        .execute(&token, user_id, &email)
        .await
        .unwrap();
}

async fn owners(w: &World, team: &Team) -> Vec<i64> {
    w.store
        .list(team.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.role == Role::Owner)
        .map(|m| m.user_id)
        .collect()
}

#[tokio::test]
async fn test_create_team_with_default_limit() {
    let w = world();

    let team = CreateTeamAction::new(w.ports.clone())
        .execute(CreateTeamInput::new(OWNER, "My Team"))
        .await
        .unwrap();

    assert_eq!(team.slug, "my-team");
    assert_eq!(team.member_limit, 5);
    assert_eq!(w.store.count(team.id).await.unwrap(), 1);
    assert_eq!(owners(&w, &team).await, vec![OWNER]);
}

#[tokio::test]
async fn test_send_invitation_at_limit_creates_nothing() {
    let w = world();
    let team = create_team(&w, 5).await;
    for user_id in 2..=5 {
        admit(&w, team.id, user_id, Role::Member).await;
    }
    assert_eq!(w.store.count(team.id).await.unwrap(), 5);

    let result = SendInvitationAction::new(w.ports.clone())
        .execute(SendInvitationInput {
            team_id: team.id,
            inviter_id: OWNER,
            email: "late@example.com".to_owned(),
            role: Role::Member,
        })
        .await;

    let err = result.unwrap_err();
    assert_eq!(
        err,
        TeamError::MemberLimitExceeded {
            team_id: team.id,
            limit: 5
        }
    );
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(w
        .store
        .find_pending_by_email(team.id, "late@example.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_accept_with_wrong_email() {
    let w = world();
    let team = create_team(&w, 5).await;
    let token = send(&w, team.id, "other@example.com", Role::Member).await;

    let result = AcceptInvitationAction::new(w.ports.clone())
        .execute(&token, 2, "user@example.com")
        .await;

    assert_eq!(result.unwrap_err(), TeamError::InvitationNotForYou);
    assert_eq!(w.store.count(team.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_accept_expired_invitation_marks_it_expired() {
    let w = world();
    let team = create_team(&w, 5).await;
    let token = send(&w, team.id, "user@example.com", Role::Member).await;

    w.clock.advance(Duration::days(7) + Duration::minutes(1));
    let result = AcceptInvitationAction::new(w.ports.clone())
        .execute(&token, 2, "user@example.com")
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, TeamError::InvitationExpired(_)));
    assert_eq!(err.kind(), ErrorKind::Expired);

    let listed = ListTeamInvitationsAction::new(w.ports.clone())
        .execute(team.id, OWNER, None, Page::default())
        .await
        .unwrap();
    assert_eq!(listed[0].invitation.status, InvitationStatus::Expired);
}

#[tokio::test]
async fn test_admin_cannot_change_owner_role() {
    let w = world();
    let team = create_team(&w, 5).await;
    admit(&w, team.id, 2, Role::Admin).await;

    let result = UpdateMemberRoleAction::new(w.ports.clone())
        .execute(UpdateMemberRoleInput {
            team_id: team.id,
            target_user_id: OWNER,
            requester_id: 2,
            new_role: Role::Member,
        })
        .await;

    assert_eq!(result.unwrap_err(), TeamError::CannotChangeOwner);
    assert_eq!(owners(&w, &team).await, vec![OWNER]);
}

#[tokio::test]
async fn test_member_removes_self() {
    let w = world();
    let team = create_team(&w, 5).await;
    admit(&w, team.id, 2, Role::Member).await;

    RemoveMemberAction::new(w.ports.clone())
        .execute(team.id, 2, 2)
        .await
        .unwrap();

    assert!(w.store.find(team.id, 2).await.unwrap().is_none());
    assert_eq!(w.store.count(team.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_owner_is_never_removed() {
    let w = world();
    let team = create_team(&w, 5).await;
    admit(&w, team.id, 2, Role::Admin).await;

    for requester in [OWNER, 2] {
        let result = RemoveMemberAction::new(w.ports.clone())
            .execute(team.id, OWNER, requester)
            .await;
        assert_eq!(result.unwrap_err(), TeamError::CannotRemoveOwner);
    }
    let leave = LeaveTeamAction::new(w.ports.clone())
        .execute(team.id, OWNER)
        .await;
    assert_eq!(leave.unwrap_err(), TeamError::CannotRemoveOwner);
    assert_eq!(owners(&w, &team).await, vec![OWNER]);
}

#[tokio::test]
async fn test_accept_twice_is_already_processed() {
    let w = world();
    let team = create_team(&w, 5).await;
    let token = send(&w, team.id, "user@example.com", Role::Guest).await;
    let action = AcceptInvitationAction::new(w.ports.clone());

    let member = action.execute(&token, 2, "user@example.com").await.unwrap();
    assert_eq!(member.role, Role::Guest);

    let again = action.execute(&token, 2, "user@example.com").await;
    assert!(matches!(
        again,
        Err(TeamError::InvitationAlreadyProcessed(_))
    ));
    assert_eq!(again.unwrap_err().kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_terminal_invitations_stay_terminal() {
    let w = world();
    let team = create_team(&w, 5).await;
    let token = send(&w, team.id, "user@example.com", Role::Member).await;

    let rejected = RejectInvitationAction::new(w.ports.clone())
        .execute(&token, "user@example.com")
        .await
        .unwrap();
    assert_eq!(rejected.status, InvitationStatus::Rejected);

    let revoke = RevokeInvitationAction::new(w.ports.clone())
        .execute(rejected.id, OWNER)
        .await;
    assert_eq!(
        revoke.unwrap_err(),
        TeamError::CannotRevokeProcessed(rejected.id)
    );

    let accept = AcceptInvitationAction::new(w.ports.clone())
        .execute(&token, 2, "user@example.com")
        .await;
    assert_eq!(
        accept.unwrap_err(),
        TeamError::InvitationAlreadyProcessed(rejected.id)
    );

    assert!(w
        .store
        .update_status(rejected.id, InvitationStatus::Pending, Utc::now())
        .await
        .unwrap()
        .is_none());
}

/// Revokes one invitation just before handing out the next transaction,
/// after the caller has already read it as pending.
struct RevokeBeforeBegin {
    inner: Arc<dyn TransactionCoordinator>,
    invitations: Arc<dyn InvitationRepository>,
    target: Mutex<Option<i64>>,
}

#[async_trait]
impl TransactionCoordinator for RevokeBeforeBegin {
    async fn begin(&self) -> Result<Box<dyn TransactionScope>, TeamError> {
        let target = self.target.lock().unwrap().take();
        if let Some(id) = target {
            self.invitations
                .update_status(id, InvitationStatus::Revoked, Utc::now())
                .await?;
        }
        self.inner.begin().await
    }
}

#[tokio::test]
async fn test_accept_loses_to_concurrent_revoke() {
    let w = world();
    let team = create_team(&w, 5).await;
    let sent = SendInvitationAction::new(w.ports.clone())
        .execute(SendInvitationInput {
            team_id: team.id,
            inviter_id: OWNER,
            email: "user@example.com".to_owned(),
            role: Role::Member,
        })
        .await
        .unwrap();

    let ports = TeamPorts {
        transactions: Arc::new(RevokeBeforeBegin {
            inner: w.ports.transactions.clone(),
            invitations: w.ports.invitations.clone(),
            target: Mutex::new(Some(sent.invitation.id)),
        }),
        ..w.ports.clone()
    };

    let result = AcceptInvitationAction::new(ports)
        .execute(&sent.token, 2, "user@example.com")
        .await;
    assert_eq!(
        result.unwrap_err(),
        TeamError::InvitationAlreadyProcessed(sent.invitation.id)
    );

    assert_eq!(w.store.count(team.id).await.unwrap(), 1);
    assert!(w.store.find(team.id, 2).await.unwrap().is_none());
    let stored = w
        .store
        .find_by_id(sent.invitation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, InvitationStatus::Revoked);
}

#[tokio::test]
async fn test_concurrent_accepts_respect_limit() {
    let w = world();
    let team = create_team(&w, 3).await;
    admit(&w, team.id, 2, Role::Member).await;

    let first = send(&w, team.id, "a@example.com", Role::Member).await;
    let second = send(&w, team.id, "b@example.com", Role::Member).await;

    let action = AcceptInvitationAction::new(w.ports.clone());
    let (a, b) = tokio::join!(
        action.execute(&first, 10, "a@example.com"),
        action.execute(&second, 11, "b@example.com"),
    );

    let outcomes = [a, b];
    let accepted = outcomes.iter().filter(|r| r.is_ok()).count();
    let limited = outcomes
        .iter()
        .filter(|r| matches!(r, Err(TeamError::MemberLimitExceeded { .. })))
        .count();
    assert_eq!((accepted, limited), (1, 1));
    assert_eq!(w.store.count(team.id).await.unwrap(), 3);
}

#[tokio::test]
async fn test_failed_accept_leaves_no_member() {
    let w = world();
    let team = create_team(&w, 5).await;
    let token = send(&w, team.id, "user@example.com", Role::Member).await;

    w.store.fail_status_updates(true);
    let result = AcceptInvitationAction::new(w.ports.clone())
        .execute(&token, 2, "user@example.com")
        .await;
    w.store.fail_status_updates(false);

    assert_eq!(result.unwrap_err().kind(), ErrorKind::Internal);
    assert!(w.store.find(team.id, 2).await.unwrap().is_none());

    // the invitation is untouched and still usable
    AcceptInvitationAction::new(w.ports.clone())
        .execute(&token, 2, "user@example.com")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_team_cancels_pending_invitations() {
    let w = world();
    let team = create_team(&w, 5).await;
    let token = send(&w, team.id, "user@example.com", Role::Member).await;
    send(&w, team.id, "other@example.com", Role::Guest).await;

    let cancelled = DeleteTeamAction::new(w.ports.clone())
        .execute(team.id, OWNER)
        .await
        .unwrap();
    assert_eq!(cancelled, 2);

    let mine = ListMyInvitationsAction::new(w.ports.clone())
        .execute("user@example.com", None, Page::default())
        .await
        .unwrap();
    assert_eq!(mine[0].invitation.status, InvitationStatus::Revoked);

    let accept = AcceptInvitationAction::new(w.ports.clone())
        .execute(&token, 2, "user@example.com")
        .await;
    assert!(matches!(
        accept,
        Err(TeamError::InvitationAlreadyProcessed(_))
    ));

    // the slug is free again once the old team is deleted
    let again = create_team(&w, 5).await;
    assert_eq!(again.slug, "my-team");
    assert_ne!(again.id, team.id);
}

#[tokio::test]
async fn test_member_operations_on_deleted_team() {
    let w = world();
    let team = create_team(&w, 5).await;
    admit(&w, team.id, 2, Role::Member).await;
    admit(&w, team.id, 3, Role::Member).await;

    DeleteTeamAction::new(w.ports.clone())
        .execute(team.id, OWNER)
        .await
        .unwrap();

    let update = UpdateMemberRoleAction::new(w.ports.clone())
        .execute(UpdateMemberRoleInput {
            team_id: team.id,
            target_user_id: 2,
            requester_id: OWNER,
            new_role: Role::Admin,
        })
        .await;
    assert_eq!(update.unwrap_err(), TeamError::TeamNotFound(team.id));

    let remove = RemoveMemberAction::new(w.ports.clone())
        .execute(team.id, 3, OWNER)
        .await;
    assert_eq!(remove.unwrap_err(), TeamError::TeamNotFound(team.id));

    let leave = LeaveTeamAction::new(w.ports.clone())
        .execute(team.id, 2)
        .await;
    assert_eq!(leave.unwrap_err(), TeamError::TeamNotFound(team.id));

    let untouched = w.store.find(team.id, 2).await.unwrap().unwrap();
    assert_eq!(untouched.role, Role::Member);
    assert_eq!(w.store.count(team.id).await.unwrap(), 3);
}

#[tokio::test]
async fn test_list_members_after_joins() {
    let w = world();
    w.store.insert_user("owner@example.com", "Owner").await;
    let joiner = w.store.insert_user("joiner@example.com", "Joiner").await;
    let team = create_team(&w, 5).await;

    let token = send(&w, team.id, "Joiner@Example.com", Role::Member).await;
    AcceptInvitationAction::new(w.ports.clone())
        .execute(&token, joiner.id, "joiner@example.com")
        .await
        .unwrap();

    let members = ListMembersAction::new(w.ports.clone())
        .execute(team.id, joiner.id)
        .await
        .unwrap();
    let emails: Vec<&str> = members.iter().map(|m| m.email.as_str()).collect();
    assert_eq!(emails, vec!["owner@example.com", "joiner@example.com"]);

    // a known user who already joined cannot be invited again
    let result = SendInvitationAction::new(w.ports.clone())
        .execute(SendInvitationInput {
            team_id: team.id,
            inviter_id: OWNER,
            email: "joiner@example.com".to_owned(),
            role: Role::Member,
        })
        .await;
    assert_eq!(
        result.unwrap_err(),
        TeamError::AlreadyMember { team_id: team.id }
    );
}

#[tokio::test]
async fn test_cancelled_operation_leaves_store_usable() {
    let w = world();

    // an open transaction holds the store; the create cannot proceed
    let blocker = w.store.begin().await.unwrap();
    let timed_out = tokio::time::timeout(
        std::time::Duration::from_millis(50),
        CreateTeamAction::new(w.ports.clone()).execute(CreateTeamInput::new(OWNER, "Blocked")),
    )
    .await;
    assert!(timed_out.is_err());
    drop(blocker);

    let team = CreateTeamAction::new(w.ports.clone())
        .execute(CreateTeamInput::new(OWNER, "Blocked"))
        .await
        .unwrap();
    assert_eq!(w.store.count(team.id).await.unwrap(), 1);
}
