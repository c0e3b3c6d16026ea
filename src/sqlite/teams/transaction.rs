//! `SQLite` transactions for the engine's atomic units of work.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::handle::{db_error, SharedTransaction};
use super::invitation::SqliteInvitationRepository;
use super::membership::SqliteMemberRepository;
use super::team::SqliteTeamRepository;
use crate::teams::{
    InvitationRepository, MemberRepository, TeamRepository, TransactionCoordinator,
    TransactionScope,
};
use crate::TeamError;

/// Opens [`SqliteTransaction`]s on a pool.
///
/// Scopes opened through one coordinator (and its clones) run one at a time,
/// so a member count read inside a scope holds until that scope ends.
/// Writers in other processes are still caught by `SQLite`'s own locking.
#[derive(Clone)]
pub struct SqliteTransactionCoordinator {
    pool: SqlitePool,
    write_gate: Arc<Mutex<()>>,
}

impl SqliteTransactionCoordinator {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_gate: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl TransactionCoordinator for SqliteTransactionCoordinator {
    async fn begin(&self) -> Result<Box<dyn TransactionScope>, TeamError> {
        let gate = Arc::clone(&self.write_gate).lock_owned().await;
        let tx = self.pool.begin().await.map_err(db_error("begin_transaction"))?;
        let shared: SharedTransaction = Arc::new(Mutex::new(Some(tx)));

        Ok(Box::new(SqliteTransaction {
            teams: SqliteTeamRepository::in_transaction(Arc::clone(&shared)),
            members: SqliteMemberRepository::in_transaction(Arc::clone(&shared)),
            invitations: SqliteInvitationRepository::in_transaction(Arc::clone(&shared)),
            tx: shared,
            _gate: gate,
        }))
    }
}

/// One open `SQLite` transaction. Dropping it uncommitted rolls back.
pub struct SqliteTransaction {
    teams: SqliteTeamRepository,
    members: SqliteMemberRepository,
    invitations: SqliteInvitationRepository,
    tx: SharedTransaction,
    _gate: OwnedMutexGuard<()>,
}

#[async_trait]
impl TransactionScope for SqliteTransaction {
    fn teams(&self) -> &dyn TeamRepository {
        &self.teams
    }

    fn members(&self) -> &dyn MemberRepository {
        &self.members
    }

    fn invitations(&self) -> &dyn InvitationRepository {
        &self.invitations
    }

    async fn commit(&mut self) -> Result<(), TeamError> {
        let tx = self
            .tx
            .lock()
            .await
            .take()
            .ok_or_else(|| TeamError::Internal("transaction already committed".to_owned()))?;
        tx.commit().await.map_err(db_error("commit_transaction"))
    }
}
