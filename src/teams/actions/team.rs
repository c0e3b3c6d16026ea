use crate::teams::membership::MembershipManager;
use crate::teams::repository::{CreateTeam, Page};
use crate::teams::role::{Permission, Role};
use crate::teams::slug::slugify;
use crate::teams::transaction::run_atomically;
use crate::teams::types::{Team, Visibility};
use crate::teams::{InvitationEngine, TeamPorts};
use crate::validators::validate_team_name;
use crate::TeamError;

/// Input for creating a team.
#[derive(Debug, Clone)]
pub struct CreateTeamInput {
    pub owner_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub visibility: Visibility,
    /// Falls back to the configured default when `None`.
    pub member_limit: Option<u32>,
}

impl CreateTeamInput {
    pub fn new(owner_id: i64, name: impl Into<String>) -> Self {
        Self {
            owner_id,
            name: name.into(),
            description: None,
            visibility: Visibility::default(),
            member_limit: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    #[must_use]
    pub fn member_limit(mut self, limit: u32) -> Self {
        self.member_limit = Some(limit);
        self
    }
}

/// Creates a team and its owner membership together.
pub struct CreateTeamAction {
    ports: TeamPorts,
}

impl CreateTeamAction {
    pub fn new(ports: TeamPorts) -> Self {
        Self { ports }
    }

    /// # Returns
    ///
    /// - `Ok(team)` - the team, with the creator recorded as owner
    /// - `Err(TeamError::Validation(_))` - bad name or a zero member limit
    /// - `Err(TeamError::SlugAlreadyExists(_))` - the owner already has an
    ///   active team with this slug
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "create_team", skip_all, err)
    )]
    pub async fn execute(&self, input: CreateTeamInput) -> Result<Team, TeamError> {
        let name = validate_team_name(&input.name)?.to_owned();
        let slug = slugify(&name);

        let member_limit = input
            .member_limit
            .unwrap_or(self.ports.config.default_member_limit);
        if member_limit == 0 {
            return Err(TeamError::Validation(
                "member limit must be at least 1".to_owned(),
            ));
        }

        // fast path; the store's unique constraint still decides races
        if self
            .ports
            .teams
            .find_by_owner_and_slug(input.owner_id, &slug)
            .await?
            .is_some()
        {
            return Err(TeamError::SlugAlreadyExists(slug));
        }

        let data = CreateTeam {
            owner_id: input.owner_id,
            name,
            slug,
            description: input.description,
            visibility: input.visibility,
            member_limit,
            created_at: self.ports.clock.now(),
        };
        let clock = self.ports.clock.clone();

        let team = run_atomically(self.ports.transactions.as_ref(), move |tx| {
            Box::pin(async move {
                let team = tx.teams().create(data).await?;
                MembershipManager::new(tx.members(), clock.as_ref())
                    .add_owner(&team)
                    .await?;
                Ok(team)
            })
        })
        .await?;

        log::info!(
            target: "teamgate",
            "msg=\"team created\", team_id={}, owner_id={}, slug=\"{}\"",
            team.id,
            team.owner_id,
            team.slug
        );

        Ok(team)
    }
}

/// Partial update of a team's settings. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateTeamInput {
    pub team_id: i64,
    pub requester_id: i64,
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub visibility: Option<Visibility>,
    pub member_limit: Option<u32>,
}

impl UpdateTeamInput {
    pub fn new(team_id: i64, requester_id: i64) -> Self {
        Self {
            team_id,
            requester_id,
            ..Self::default()
        }
    }
}

pub struct UpdateTeamAction {
    ports: TeamPorts,
}

impl UpdateTeamAction {
    pub fn new(ports: TeamPorts) -> Self {
        Self { ports }
    }

    /// Applies the patch after checking `UpdateTeam` permission.
    ///
    /// A rename re-derives the slug and must stay unique among the owner's
    /// active teams. A new member limit may not drop below the current member
    /// count.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "update_team", skip_all, err)
    )]
    pub async fn execute(&self, input: UpdateTeamInput) -> Result<Team, TeamError> {
        let mut team = self
            .ports
            .teams
            .find_by_id(input.team_id)
            .await?
            .ok_or(TeamError::TeamNotFound(input.team_id))?;

        let memberships =
            MembershipManager::new(self.ports.members.as_ref(), self.ports.clock.as_ref());
        memberships
            .require(team.id, input.requester_id, Permission::UpdateTeam)
            .await?;

        let now = self.ports.clock.now();

        if let Some(name) = &input.name {
            let name = validate_team_name(name)?;
            team.set_name(name, now);

            if let Some(other) = self
                .ports
                .teams
                .find_by_owner_and_slug(team.owner_id, &team.slug)
                .await?
            {
                if other.id != team.id {
                    return Err(TeamError::SlugAlreadyExists(team.slug));
                }
            }
        }

        if let Some(description) = input.description {
            team.set_description(description, now);
        }

        if let Some(visibility) = input.visibility {
            team.set_visibility(visibility, now);
        }

        if let Some(limit) = input.member_limit {
            let current = memberships.count(team.id).await?;
            if limit < current {
                return Err(TeamError::Validation(format!(
                    "member limit {limit} is below the current member count {current}"
                )));
            }
            team.set_member_limit(limit, now)?;
        }

        let team = self.ports.teams.update(&team).await?;

        log::info!(
            target: "teamgate",
            "msg=\"team updated\", team_id={}, requester_id={}",
            team.id,
            input.requester_id
        );

        Ok(team)
    }
}

/// Soft-deletes a team and cancels its pending invitations.
pub struct DeleteTeamAction {
    ports: TeamPorts,
}

impl DeleteTeamAction {
    pub fn new(ports: TeamPorts) -> Self {
        Self { ports }
    }

    /// # Returns
    ///
    /// - `Ok(cancelled)` - number of pending invitations revoked
    /// - `Err(TeamError::TeamNotFound(_))` - unknown or already deleted team
    /// - `Err(TeamError::PermissionDenied)` - requester is not a member
    /// - `Err(TeamError::OnlyOwnerCanDelete)` - requester is a non-owner member
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "delete_team", skip_all, err)
    )]
    pub async fn execute(&self, team_id: i64, requester_id: i64) -> Result<u64, TeamError> {
        let team = self
            .ports
            .teams
            .find_by_id(team_id)
            .await?
            .ok_or(TeamError::TeamNotFound(team_id))?;

        let requester = self
            .ports
            .members
            .find(team.id, requester_id)
            .await?
            .ok_or(TeamError::PermissionDenied)?;
        if !requester.role.has_permission(Permission::DeleteTeam) {
            return Err(TeamError::OnlyOwnerCanDelete);
        }

        let now = self.ports.clock.now();
        let cancelled = run_atomically(self.ports.transactions.as_ref(), move |tx| {
            Box::pin(async move {
                tx.teams().soft_delete(team_id, now).await?;
                InvitationEngine::cancel_all_pending(tx.invitations(), team_id).await
            })
        })
        .await?;

        log::info!(
            target: "teamgate",
            "msg=\"team deleted\", team_id={team_id}, cancelled_invitations={cancelled}"
        );

        Ok(cancelled)
    }
}

/// Reads one team on behalf of a member.
pub struct GetTeamAction {
    ports: TeamPorts,
}

impl GetTeamAction {
    pub fn new(ports: TeamPorts) -> Self {
        Self { ports }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "get_team", skip_all, err)
    )]
    pub async fn execute(&self, team_id: i64, requester_id: i64) -> Result<Team, TeamError> {
        let team = self
            .ports
            .teams
            .find_by_id(team_id)
            .await?
            .ok_or(TeamError::TeamNotFound(team_id))?;

        MembershipManager::new(self.ports.members.as_ref(), self.ports.clock.as_ref())
            .require(team.id, requester_id, Permission::View)
            .await?;

        Ok(team)
    }
}

/// A team listed for a user, with the user's role in it.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MyTeam {
    #[serde(flatten)]
    pub team: Team,
    pub role: Role,
}

pub struct ListMyTeamsAction {
    ports: TeamPorts,
}

impl ListMyTeamsAction {
    pub fn new(ports: TeamPorts) -> Self {
        Self { ports }
    }

    /// Active teams `user_id` belongs to, newest first.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "list_my_teams", skip_all, err)
    )]
    pub async fn execute(&self, user_id: i64, page: Page) -> Result<Vec<MyTeam>, TeamError> {
        let teams = self.ports.teams.list_by_user(user_id, page).await?;

        let mut listed = Vec::with_capacity(teams.len());
        for team in teams {
            // a membership removed between the two reads drops the team
            if let Some(member) = self.ports.members.find(team.id, user_id).await? {
                listed.push(MyTeam {
                    team,
                    role: member.role,
                });
            }
        }
        Ok(listed)
    }
}
