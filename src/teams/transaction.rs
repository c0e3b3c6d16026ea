//! All-or-nothing execution of multi-entity writes.
//!
//! A [`TransactionScope`] exposes transaction-bound versions of the three
//! repositories. Dropping a scope without calling
//! [`commit`](TransactionScope::commit) rolls back everything written through
//! it, so an early `?` return can never leave half a unit of work behind.

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::repository::{InvitationRepository, MemberRepository, TeamRepository};
use crate::TeamError;

#[async_trait]
pub trait TransactionScope: Send + Sync {
    fn teams(&self) -> &dyn TeamRepository;
    fn members(&self) -> &dyn MemberRepository;
    fn invitations(&self) -> &dyn InvitationRepository;

    /// Makes every write performed through this scope durable.
    async fn commit(&mut self) -> Result<(), TeamError>;
}

#[async_trait]
pub trait TransactionCoordinator: Send + Sync {
    /// Opens a new transaction scope.
    ///
    /// Implementations must isolate the scope well enough that a count read
    /// inside it cannot be invalidated by a concurrent scope before commit.
    async fn begin(&self) -> Result<Box<dyn TransactionScope>, TeamError>;
}

/// Runs `work` inside a fresh transaction.
///
/// Commits when `work` returns `Ok`; any `Err` drops the scope, which rolls
/// back every write `work` made.
///
/// ```rust,ignore
/// let team = run_atomically(coordinator, move |tx| {
///     Box::pin(async move {
///         let team = tx.teams().create(data).await?;
///         tx.members().add(owner(team.id)).await?;
///         Ok(team)
///     })
/// })
/// .await?;
/// ```
pub async fn run_atomically<T, F>(
    coordinator: &dyn TransactionCoordinator,
    work: F,
) -> Result<T, TeamError>
where
    T: Send,
    F: for<'tx> FnOnce(&'tx dyn TransactionScope) -> BoxFuture<'tx, Result<T, TeamError>>
        + Send,
{
    let mut scope = coordinator.begin().await?;
    let value = work(scope.as_ref()).await?;
    scope.commit().await?;
    Ok(value)
}
