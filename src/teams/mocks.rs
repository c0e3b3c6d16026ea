#![allow(clippy::significant_drop_tightening)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::repository::{
    CreateInvitation, CreateTeam, InvitationRepository, MemberRepository, NewMember, Page,
    TeamRepository, UserDirectory,
};
use super::role::Role;
use super::transaction::{TransactionCoordinator, TransactionScope};
use super::types::{
    DirectoryUser, Invitation, InvitationStatus, Member, MemberWithUser, Team, TeamStatus,
};
use crate::TeamError;

/// Tables plus id sequences. Every repository operation is a synchronous
/// method here so the plain store and its transactions share one code path.
#[derive(Debug, Clone, Default)]
struct StoreState {
    teams: BTreeMap<i64, Team>,
    members: BTreeMap<(i64, i64), Member>,
    invitations: BTreeMap<i64, Invitation>,
    users: BTreeMap<i64, DirectoryUser>,
    last_team_id: i64,
    last_invitation_id: i64,
    last_user_id: i64,
}

fn paginate<T>(items: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    items
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect()
}

impl StoreState {
    fn slug_taken(&self, owner_id: i64, slug: &str, except: Option<i64>) -> bool {
        self.teams.values().any(|t| {
            t.status == TeamStatus::Active
                && t.owner_id == owner_id
                && t.slug == slug
                && Some(t.id) != except
        })
    }

    fn create_team(&mut self, data: CreateTeam) -> Result<Team, TeamError> {
        if self.slug_taken(data.owner_id, &data.slug, None) {
            return Err(TeamError::SlugAlreadyExists(data.slug));
        }

        self.last_team_id += 1;
        let team = Team {
            id: self.last_team_id,
            owner_id: data.owner_id,
            name: data.name,
            slug: data.slug,
            description: data.description,
            visibility: data.visibility,
            member_limit: data.member_limit,
            status: TeamStatus::Active,
            created_at: data.created_at,
            updated_at: data.created_at,
        };
        self.teams.insert(team.id, team.clone());
        Ok(team)
    }

    fn find_team(&self, id: i64) -> Option<Team> {
        self.teams.get(&id).filter(|t| !t.is_deleted()).cloned()
    }

    fn find_team_by_owner_and_slug(&self, owner_id: i64, slug: &str) -> Option<Team> {
        self.teams
            .values()
            .find(|t| !t.is_deleted() && t.owner_id == owner_id && t.slug == slug)
            .cloned()
    }

    fn list_teams_by_user(&self, user_id: i64, page: Page) -> Vec<Team> {
        let mut teams: Vec<&Team> = self
            .teams
            .values()
            .filter(|t| !t.is_deleted() && self.members.contains_key(&(t.id, user_id)))
            .collect();
        teams.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        paginate(teams.into_iter().cloned(), page)
    }

    fn update_team(&mut self, team: &Team) -> Result<Team, TeamError> {
        if self.find_team(team.id).is_none() {
            return Err(TeamError::TeamNotFound(team.id));
        }
        if self.slug_taken(team.owner_id, &team.slug, Some(team.id)) {
            return Err(TeamError::SlugAlreadyExists(team.slug.clone()));
        }
        self.teams.insert(team.id, team.clone());
        Ok(team.clone())
    }

    fn soft_delete_team(&mut self, id: i64, at: DateTime<Utc>) -> Result<(), TeamError> {
        let team = self
            .teams
            .get_mut(&id)
            .filter(|t| !t.is_deleted())
            .ok_or(TeamError::TeamNotFound(id))?;
        team.mark_deleted(at);
        Ok(())
    }

    fn add_member(&mut self, data: NewMember) -> Result<Member, TeamError> {
        let key = (data.team_id, data.user_id);
        if self.members.contains_key(&key) {
            return Err(TeamError::AlreadyMember {
                team_id: data.team_id,
            });
        }

        let member = Member {
            team_id: data.team_id,
            user_id: data.user_id,
            role: data.role,
            joined_at: data.joined_at,
            updated_at: data.joined_at,
        };
        self.members.insert(key, member.clone());
        Ok(member)
    }

    fn find_member(&self, team_id: i64, user_id: i64) -> Option<Member> {
        self.members.get(&(team_id, user_id)).cloned()
    }

    fn list_members(&self, team_id: i64) -> Vec<Member> {
        let mut members: Vec<Member> = self
            .members
            .values()
            .filter(|m| m.team_id == team_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.user_id.cmp(&b.user_id)));
        members
    }

    fn list_members_with_users(&self, team_id: i64) -> Vec<MemberWithUser> {
        self.list_members(team_id)
            .into_iter()
            .filter_map(|member| {
                let user = self.users.get(&member.user_id)?;
                Some(MemberWithUser {
                    email: user.email.clone(),
                    name: user.name.clone(),
                    member,
                })
            })
            .collect()
    }

    fn update_member_role(
        &mut self,
        team_id: i64,
        user_id: i64,
        role: Role,
        at: DateTime<Utc>,
    ) -> Result<Member, TeamError> {
        let member = self
            .members
            .get_mut(&(team_id, user_id))
            .ok_or(TeamError::MemberNotFound { team_id, user_id })?;
        member.role = role;
        member.updated_at = at;
        Ok(member.clone())
    }

    fn remove_member(&mut self, team_id: i64, user_id: i64) -> Result<(), TeamError> {
        self.members
            .remove(&(team_id, user_id))
            .map(|_| ())
            .ok_or(TeamError::MemberNotFound { team_id, user_id })
    }

    fn count_members(&self, team_id: i64) -> u32 {
        let count = self.members.keys().filter(|(t, _)| *t == team_id).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    fn create_invitation(&mut self, data: CreateInvitation) -> Result<Invitation, TeamError> {
        if self
            .invitations
            .values()
            .any(|i| i.token_hash == data.token_hash)
        {
            return Err(TeamError::Internal("duplicate invitation token".to_owned()));
        }
        if self.find_pending_invitation(data.team_id, &data.email).is_some() {
            return Err(TeamError::InvitationAlreadyPending {
                team_id: data.team_id,
            });
        }

        self.last_invitation_id += 1;
        let invitation = Invitation {
            id: self.last_invitation_id,
            team_id: data.team_id,
            invited_by: data.invited_by,
            email: data.email,
            invitee_user_id: data.invitee_user_id,
            role: data.role,
            token_hash: data.token_hash,
            status: InvitationStatus::Pending,
            expires_at: data.expires_at,
            created_at: data.created_at,
            accepted_at: None,
        };
        self.invitations.insert(invitation.id, invitation.clone());
        Ok(invitation)
    }

    fn find_invitation_by_token_hash(&self, token_hash: &str) -> Option<Invitation> {
        self.invitations
            .values()
            .find(|i| i.token_hash == token_hash)
            .cloned()
    }

    fn find_pending_invitation(&self, team_id: i64, email: &str) -> Option<Invitation> {
        self.invitations
            .values()
            .find(|i| i.team_id == team_id && i.is_pending() && i.email == email)
            .cloned()
    }

    fn list_invitations(
        &self,
        filter: impl Fn(&Invitation) -> bool,
        status: Option<InvitationStatus>,
        page: Page,
    ) -> Vec<Invitation> {
        let mut found: Vec<&Invitation> = self
            .invitations
            .values()
            .filter(|i| filter(i) && status.map_or(true, |s| i.status == s))
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        paginate(found.into_iter().cloned(), page)
    }

    fn update_invitation_status(
        &mut self,
        id: i64,
        status: InvitationStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Invitation>, TeamError> {
        let invitation = self
            .invitations
            .get_mut(&id)
            .ok_or(TeamError::InvitationNotFound)?;
        if !invitation.is_pending() {
            return Ok(None);
        }

        invitation.status = status;
        if status == InvitationStatus::Accepted {
            invitation.accepted_at = Some(at);
        }
        Ok(Some(invitation.clone()))
    }

    fn transition_pending(
        &mut self,
        matches: impl Fn(&Invitation) -> bool,
        status: InvitationStatus,
    ) -> u64 {
        let mut changed = 0;
        for invitation in self.invitations.values_mut() {
            if invitation.is_pending() && matches(invitation) {
                invitation.status = status;
                changed += 1;
            }
        }
        changed
    }

    fn insert_user(&mut self, email: &str, name: &str) -> DirectoryUser {
        self.last_user_id += 1;
        let user = DirectoryUser {
            id: self.last_user_id,
            email: email.trim().to_lowercase(),
            name: name.to_owned(),
        };
        self.users.insert(user.id, user.clone());
        user
    }

    fn find_user_by_email(&self, email: &str) -> Option<DirectoryUser> {
        let email = email.trim().to_lowercase();
        self.users.values().find(|u| u.email == email).cloned()
    }
}

/// In-memory implementation of every storage port.
///
/// Clones share the same data, so one store can be handed to the engine as
/// team, member, invitation, user, and transaction port at once.
/// Transactions hold the store's lock until they commit or drop, which
/// serializes them against every other call.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<AsyncMutex<StoreState>>,
    fail_status_updates: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user in the directory.
    pub async fn insert_user(&self, email: &str, name: &str) -> DirectoryUser {
        self.state.lock().await.insert_user(email, name)
    }

    /// Makes every subsequent `update_status` call fail with a database
    /// error, inside or outside a transaction.
    pub fn fail_status_updates(&self, fail: bool) {
        self.fail_status_updates.store(fail, Ordering::SeqCst);
    }

    fn check_status_update(flag: &AtomicBool) -> Result<(), TeamError> {
        if flag.load(Ordering::SeqCst) {
            return Err(TeamError::Database(
                "injected failure: update_status".to_owned(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TeamRepository for MemoryStore {
    async fn create(&self, data: CreateTeam) -> Result<Team, TeamError> {
        self.state.lock().await.create_team(data)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Team>, TeamError> {
        Ok(self.state.lock().await.find_team(id))
    }

    async fn find_by_owner_and_slug(
        &self,
        owner_id: i64,
        slug: &str,
    ) -> Result<Option<Team>, TeamError> {
        Ok(self
            .state
            .lock()
            .await
            .find_team_by_owner_and_slug(owner_id, slug))
    }

    async fn list_by_user(&self, user_id: i64, page: Page) -> Result<Vec<Team>, TeamError> {
        Ok(self.state.lock().await.list_teams_by_user(user_id, page))
    }

    async fn update(&self, team: &Team) -> Result<Team, TeamError> {
        self.state.lock().await.update_team(team)
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), TeamError> {
        self.state.lock().await.soft_delete_team(id, at)
    }
}

#[async_trait]
impl MemberRepository for MemoryStore {
    async fn add(&self, data: NewMember) -> Result<Member, TeamError> {
        self.state.lock().await.add_member(data)
    }

    async fn find(&self, team_id: i64, user_id: i64) -> Result<Option<Member>, TeamError> {
        Ok(self.state.lock().await.find_member(team_id, user_id))
    }

    async fn list(&self, team_id: i64) -> Result<Vec<Member>, TeamError> {
        Ok(self.state.lock().await.list_members(team_id))
    }

    async fn list_with_users(&self, team_id: i64) -> Result<Vec<MemberWithUser>, TeamError> {
        Ok(self.state.lock().await.list_members_with_users(team_id))
    }

    async fn update_role(
        &self,
        team_id: i64,
        user_id: i64,
        role: Role,
        at: DateTime<Utc>,
    ) -> Result<Member, TeamError> {
        self.state
            .lock()
            .await
            .update_member_role(team_id, user_id, role, at)
    }

    async fn remove(&self, team_id: i64, user_id: i64) -> Result<(), TeamError> {
        self.state.lock().await.remove_member(team_id, user_id)
    }

    async fn count(&self, team_id: i64) -> Result<u32, TeamError> {
        Ok(self.state.lock().await.count_members(team_id))
    }
}

#[async_trait]
impl InvitationRepository for MemoryStore {
    async fn create(&self, data: CreateInvitation) -> Result<Invitation, TeamError> {
        self.state.lock().await.create_invitation(data)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Invitation>, TeamError> {
        Ok(self.state.lock().await.invitations.get(&id).cloned())
    }

    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Invitation>, TeamError> {
        Ok(self
            .state
            .lock()
            .await
            .find_invitation_by_token_hash(token_hash))
    }

    async fn find_pending_by_email(
        &self,
        team_id: i64,
        email: &str,
    ) -> Result<Option<Invitation>, TeamError> {
        Ok(self
            .state
            .lock()
            .await
            .find_pending_invitation(team_id, email))
    }

    async fn list_by_team(
        &self,
        team_id: i64,
        status: Option<InvitationStatus>,
        page: Page,
    ) -> Result<Vec<Invitation>, TeamError> {
        Ok(self
            .state
            .lock()
            .await
            .list_invitations(|i| i.team_id == team_id, status, page))
    }

    async fn list_by_email(
        &self,
        email: &str,
        status: Option<InvitationStatus>,
        page: Page,
    ) -> Result<Vec<Invitation>, TeamError> {
        Ok(self
            .state
            .lock()
            .await
            .list_invitations(|i| i.email == email, status, page))
    }

    async fn update_status(
        &self,
        id: i64,
        status: InvitationStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Invitation>, TeamError> {
        Self::check_status_update(&self.fail_status_updates)?;
        self.state
            .lock()
            .await
            .update_invitation_status(id, status, at)
    }

    async fn cancel_all_pending(&self, team_id: i64) -> Result<u64, TeamError> {
        Ok(self
            .state
            .lock()
            .await
            .transition_pending(|i| i.team_id == team_id, InvitationStatus::Revoked))
    }

    async fn expire_stale(
        &self,
        team_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<u64, TeamError> {
        Ok(self.state.lock().await.transition_pending(
            |i| team_id.map_or(true, |t| i.team_id == t) && i.is_expired_at(now),
            InvitationStatus::Expired,
        ))
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<DirectoryUser>, TeamError> {
        Ok(self.state.lock().await.find_user_by_email(email))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<DirectoryUser>, TeamError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl TransactionCoordinator for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn TransactionScope>, TeamError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemoryTransaction {
            inner: Mutex::new(TxState {
                guard,
                snapshot: Some(snapshot),
            }),
            fail_status_updates: Arc::clone(&self.fail_status_updates),
        }))
    }
}

struct TxState {
    guard: OwnedMutexGuard<StoreState>,
    /// State as of `begin`; `None` once committed.
    snapshot: Option<StoreState>,
}

/// A transaction over a [`MemoryStore`]. Restores the pre-transaction state
/// when dropped uncommitted.
pub struct MemoryTransaction {
    inner: Mutex<TxState>,
    fail_status_updates: Arc<AtomicBool>,
}

impl MemoryTransaction {
    fn with_state<R>(
        &self,
        f: impl FnOnce(&mut StoreState) -> Result<R, TeamError>,
    ) -> Result<R, TeamError> {
        let mut tx = self
            .inner
            .lock()
            .map_err(|_| TeamError::Internal("lock poisoned".into()))?;
        f(&mut *tx.guard)
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        let tx = self
            .inner
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(snapshot) = tx.snapshot.take() {
            *tx.guard = snapshot;
        }
    }
}

#[async_trait]
impl TransactionScope for MemoryTransaction {
    fn teams(&self) -> &dyn TeamRepository {
        self
    }

    fn members(&self) -> &dyn MemberRepository {
        self
    }

    fn invitations(&self) -> &dyn InvitationRepository {
        self
    }

    async fn commit(&mut self) -> Result<(), TeamError> {
        let tx = self
            .inner
            .get_mut()
            .map_err(|_| TeamError::Internal("lock poisoned".into()))?;
        tx.snapshot = None;
        Ok(())
    }
}

#[async_trait]
impl TeamRepository for MemoryTransaction {
    async fn create(&self, data: CreateTeam) -> Result<Team, TeamError> {
        self.with_state(|s| s.create_team(data))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Team>, TeamError> {
        self.with_state(|s| Ok(s.find_team(id)))
    }

    async fn find_by_owner_and_slug(
        &self,
        owner_id: i64,
        slug: &str,
    ) -> Result<Option<Team>, TeamError> {
        self.with_state(|s| Ok(s.find_team_by_owner_and_slug(owner_id, slug)))
    }

    async fn list_by_user(&self, user_id: i64, page: Page) -> Result<Vec<Team>, TeamError> {
        self.with_state(|s| Ok(s.list_teams_by_user(user_id, page)))
    }

    async fn update(&self, team: &Team) -> Result<Team, TeamError> {
        self.with_state(|s| s.update_team(team))
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), TeamError> {
        self.with_state(|s| s.soft_delete_team(id, at))
    }
}

#[async_trait]
impl MemberRepository for MemoryTransaction {
    async fn add(&self, data: NewMember) -> Result<Member, TeamError> {
        self.with_state(|s| s.add_member(data))
    }

    async fn find(&self, team_id: i64, user_id: i64) -> Result<Option<Member>, TeamError> {
        self.with_state(|s| Ok(s.find_member(team_id, user_id)))
    }

    async fn list(&self, team_id: i64) -> Result<Vec<Member>, TeamError> {
        self.with_state(|s| Ok(s.list_members(team_id)))
    }

    async fn list_with_users(&self, team_id: i64) -> Result<Vec<MemberWithUser>, TeamError> {
        self.with_state(|s| Ok(s.list_members_with_users(team_id)))
    }

    async fn update_role(
        &self,
        team_id: i64,
        user_id: i64,
        role: Role,
        at: DateTime<Utc>,
    ) -> Result<Member, TeamError> {
        self.with_state(|s| s.update_member_role(team_id, user_id, role, at))
    }

    async fn remove(&self, team_id: i64, user_id: i64) -> Result<(), TeamError> {
        self.with_state(|s| s.remove_member(team_id, user_id))
    }

    async fn count(&self, team_id: i64) -> Result<u32, TeamError> {
        self.with_state(|s| Ok(s.count_members(team_id)))
    }
}

#[async_trait]
impl InvitationRepository for MemoryTransaction {
    async fn create(&self, data: CreateInvitation) -> Result<Invitation, TeamError> {
        self.with_state(|s| s.create_invitation(data))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Invitation>, TeamError> {
        self.with_state(|s| Ok(s.invitations.get(&id).cloned()))
    }

    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Invitation>, TeamError> {
        self.with_state(|s| Ok(s.find_invitation_by_token_hash(token_hash)))
    }

    async fn find_pending_by_email(
        &self,
        team_id: i64,
        email: &str,
    ) -> Result<Option<Invitation>, TeamError> {
        self.with_state(|s| Ok(s.find_pending_invitation(team_id, email)))
    }

    async fn list_by_team(
        &self,
        team_id: i64,
        status: Option<InvitationStatus>,
        page: Page,
    ) -> Result<Vec<Invitation>, TeamError> {
        self.with_state(|s| Ok(s.list_invitations(|i| i.team_id == team_id, status, page)))
    }

    async fn list_by_email(
        &self,
        email: &str,
        status: Option<InvitationStatus>,
        page: Page,
    ) -> Result<Vec<Invitation>, TeamError> {
        self.with_state(|s| Ok(s.list_invitations(|i| i.email == email, status, page)))
    }

    async fn update_status(
        &self,
        id: i64,
        status: InvitationStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Invitation>, TeamError> {
        MemoryStore::check_status_update(&self.fail_status_updates)?;
        self.with_state(|s| s.update_invitation_status(id, status, at))
    }

    async fn cancel_all_pending(&self, team_id: i64) -> Result<u64, TeamError> {
        self.with_state(|s| {
            Ok(s.transition_pending(|i| i.team_id == team_id, InvitationStatus::Revoked))
        })
    }

    async fn expire_stale(
        &self,
        team_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<u64, TeamError> {
        self.with_state(|s| {
            Ok(s.transition_pending(
                |i| team_id.map_or(true, |t| i.team_id == t) && i.is_expired_at(now),
                InvitationStatus::Expired,
            ))
        })
    }
}
