//! One action per exposed operation. Each is built from [`TeamPorts`] and
//! driven through `execute`.
//!
//! [`TeamPorts`]: crate::teams::TeamPorts

mod accept;
mod invite;
mod members;
mod team;

pub use accept::{AcceptInvitationAction, RejectInvitationAction};
pub use invite::{
    ExpireStaleInvitationsAction, ListMyInvitationsAction, ListTeamInvitationsAction,
    RevokeInvitationAction, SendInvitationAction, SendInvitationInput,
};
pub use members::{
    LeaveTeamAction, ListMembersAction, RemoveMemberAction, UpdateMemberRoleAction,
    UpdateMemberRoleInput,
};
pub use team::{
    CreateTeamAction, CreateTeamInput, DeleteTeamAction, GetTeamAction, ListMyTeamsAction,
    MyTeam, UpdateTeamAction, UpdateTeamInput,
};
