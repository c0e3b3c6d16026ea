//! The bundle of ports every action is built from.

use std::sync::Arc;

use super::repository::{InvitationRepository, MemberRepository, TeamRepository, UserDirectory};
use super::transaction::TransactionCoordinator;
use crate::clock::{Clock, SystemClock};
use crate::config::TeamsConfig;
use crate::crypto::{OsRandomSource, SecureRandomSource};

/// Storage, time, randomness, and configuration shared by the actions.
///
/// Cheap to clone; every port is reference counted.
#[derive(Clone)]
pub struct TeamPorts {
    pub teams: Arc<dyn TeamRepository>,
    pub members: Arc<dyn MemberRepository>,
    pub invitations: Arc<dyn InvitationRepository>,
    pub users: Arc<dyn UserDirectory>,
    pub transactions: Arc<dyn TransactionCoordinator>,
    pub clock: Arc<dyn Clock>,
    pub random: Arc<dyn SecureRandomSource>,
    pub config: TeamsConfig,
}

impl TeamPorts {
    /// Builds ports with the system clock, OS randomness, and default
    /// configuration.
    pub fn new(
        teams: Arc<dyn TeamRepository>,
        members: Arc<dyn MemberRepository>,
        invitations: Arc<dyn InvitationRepository>,
        users: Arc<dyn UserDirectory>,
        transactions: Arc<dyn TransactionCoordinator>,
    ) -> Self {
        Self {
            teams,
            members,
            invitations,
            users,
            transactions,
            clock: Arc::new(SystemClock),
            random: Arc::new(OsRandomSource),
            config: TeamsConfig::default(),
        }
    }

    /// Uses one store for every storage port.
    pub fn from_store<S>(store: S) -> Self
    where
        S: TeamRepository
            + MemberRepository
            + InvitationRepository
            + UserDirectory
            + TransactionCoordinator
            + 'static,
    {
        let store = Arc::new(store);
        Self::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store,
        )
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_random(mut self, random: Arc<dyn SecureRandomSource>) -> Self {
        self.random = random;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: TeamsConfig) -> Self {
        self.config = config;
        self
    }
}
