//! `SQLite` storage backend.
//!
//! Enable the `sqlx_sqlite` feature to use these implementations. Run
//! [`migrations::run`] once against the pool before building the
//! repositories.

pub mod migrations;
mod teams;

pub use teams::{
    SqliteInvitationRepository, SqliteMemberRepository, SqliteTeamRepository,
    SqliteTransaction, SqliteTransactionCoordinator, SqliteUserDirectory,
};

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::teams::TeamPorts;

/// Builds [`TeamPorts`] with every storage port backed by `pool`.
pub fn create_ports(pool: SqlitePool) -> TeamPorts {
    let coordinator = SqliteTransactionCoordinator::new(pool.clone());
    TeamPorts::new(
        Arc::new(SqliteTeamRepository::new(pool.clone())),
        Arc::new(SqliteMemberRepository::new(pool.clone())),
        Arc::new(SqliteInvitationRepository::new(pool.clone())),
        Arc::new(SqliteUserDirectory::new(pool)),
        Arc::new(coordinator),
    )
}
