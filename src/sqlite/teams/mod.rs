mod handle;
mod invitation;
mod membership;
mod team;
mod transaction;
mod users;

pub use invitation::SqliteInvitationRepository;
pub use membership::SqliteMemberRepository;
pub use team::SqliteTeamRepository;
pub use transaction::{SqliteTransaction, SqliteTransactionCoordinator};
pub use users::SqliteUserDirectory;
