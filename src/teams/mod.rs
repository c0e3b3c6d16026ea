//! Teams, memberships, and the invitation lifecycle.

pub mod actions;
mod context;
mod invitations;
mod membership;
pub mod repository;
mod role;
mod slug;
pub mod transaction;
mod types;

pub use context::TeamPorts;
pub use invitations::{InvitationEngine, SentInvitation};
pub use membership::MembershipManager;
pub use repository::{
    CreateInvitation, CreateTeam, InvitationRepository, MemberRepository, NewMember, Page,
    TeamRepository, UserDirectory,
};
pub use role::{level_of, Permission, Role};
pub use slug::{slugify, MAX_SLUG_LENGTH};
pub use transaction::{run_atomically, TransactionCoordinator, TransactionScope};
pub use types::{
    DirectoryUser, Invitation, InvitationStatus, InvitationView, Member, MemberWithUser, Team,
    TeamStatus, Visibility,
};

#[cfg(any(test, feature = "mocks"))]
mod mocks;

#[cfg(any(test, feature = "mocks"))]
pub use mocks::{MemoryStore, MemoryTransaction};
