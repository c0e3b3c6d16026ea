//! `SQLite` implementation of [`TeamRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use super::handle::{db_error, decode, unique_violation, with_conn, Handle, SharedTransaction};
use crate::teams::{CreateTeam, Page, Team, TeamRepository, TeamStatus, Visibility};
use crate::TeamError;

const TEAM_COLUMNS: &str = "id, owner_id, name, slug, description, visibility, member_limit, status, created_at, updated_at";

/// `SQLite`-backed team repository.
#[derive(Clone)]
pub struct SqliteTeamRepository {
    handle: Handle,
}

impl SqliteTeamRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            handle: Handle::Pool(pool),
        }
    }

    pub(super) fn in_transaction(tx: SharedTransaction) -> Self {
        Self {
            handle: Handle::Tx(tx),
        }
    }
}

#[derive(FromRow)]
struct TeamRecord {
    id: i64,
    owner_id: i64,
    name: String,
    slug: String,
    description: Option<String>,
    visibility: String,
    member_limit: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TeamRecord> for Team {
    type Error = TeamError;

    fn try_from(row: TeamRecord) -> Result<Self, Self::Error> {
        Ok(Team {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            visibility: decode("visibility", &row.visibility, Visibility::parse)?,
            member_limit: u32::try_from(row.member_limit)
                .map_err(|_| TeamError::Database(format!("invalid member_limit {}", row.member_limit)))?,
            status: decode("status", &row.status, TeamStatus::parse)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn slug_conflict<'a>(slug: &'a str, operation: &'static str) -> impl FnOnce(sqlx::Error) -> TeamError + 'a {
    move |e| match unique_violation(&e) {
        Some(_) => TeamError::SlugAlreadyExists(slug.to_owned()),
        None => db_error(operation)(e),
    }
}

#[async_trait]
impl TeamRepository for SqliteTeamRepository {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn create(&self, data: CreateTeam) -> Result<Team, TeamError> {
        with_conn!(self.handle, |conn| {
            let row: TeamRecord = sqlx::query_as(&format!(
                r"
                INSERT INTO teams (owner_id, name, slug, description, visibility, member_limit, status, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, 'active', ?, ?)
                RETURNING {TEAM_COLUMNS}
                "
            ))
            .bind(data.owner_id)
            .bind(&data.name)
            .bind(&data.slug)
            .bind(&data.description)
            .bind(data.visibility.as_str())
            .bind(i64::from(data.member_limit))
            .bind(data.created_at)
            .bind(data.created_at)
            .fetch_one(conn)
            .await
            .map_err(slug_conflict(&data.slug, "create_team"))?;

            row.try_into()
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_by_id(&self, id: i64) -> Result<Option<Team>, TeamError> {
        with_conn!(self.handle, |conn| {
            let row: Option<TeamRecord> = sqlx::query_as(&format!(
                "SELECT {TEAM_COLUMNS} FROM teams WHERE id = ? AND status = 'active'"
            ))
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_err(db_error("find_team_by_id"))?;

            row.map(Team::try_from).transpose()
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_by_owner_and_slug(
        &self,
        owner_id: i64,
        slug: &str,
    ) -> Result<Option<Team>, TeamError> {
        with_conn!(self.handle, |conn| {
            let row: Option<TeamRecord> = sqlx::query_as(&format!(
                "SELECT {TEAM_COLUMNS} FROM teams WHERE owner_id = ? AND slug = ? AND status = 'active'"
            ))
            .bind(owner_id)
            .bind(slug)
            .fetch_optional(conn)
            .await
            .map_err(db_error("find_team_by_owner_and_slug"))?;

            row.map(Team::try_from).transpose()
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn list_by_user(&self, user_id: i64, page: Page) -> Result<Vec<Team>, TeamError> {
        with_conn!(self.handle, |conn| {
            let rows: Vec<TeamRecord> = sqlx::query_as(
                r"
                SELECT t.id, t.owner_id, t.name, t.slug, t.description, t.visibility,
                       t.member_limit, t.status, t.created_at, t.updated_at
                FROM teams t
                INNER JOIN team_members m ON m.team_id = t.id
                WHERE m.user_id = ? AND t.status = 'active'
                ORDER BY t.created_at DESC, t.id DESC
                LIMIT ? OFFSET ?
                ",
            )
            .bind(user_id)
            .bind(i64::from(page.limit()))
            .bind(i64::from(page.offset()))
            .fetch_all(conn)
            .await
            .map_err(db_error("list_teams_by_user"))?;

            rows.into_iter().map(Team::try_from).collect()
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn update(&self, team: &Team) -> Result<Team, TeamError> {
        with_conn!(self.handle, |conn| {
            let row: Option<TeamRecord> = sqlx::query_as(&format!(
                r"
                UPDATE teams
                SET name = ?, slug = ?, description = ?, visibility = ?, member_limit = ?, updated_at = ?
                WHERE id = ? AND status = 'active'
                RETURNING {TEAM_COLUMNS}
                "
            ))
            .bind(&team.name)
            .bind(&team.slug)
            .bind(&team.description)
            .bind(team.visibility.as_str())
            .bind(i64::from(team.member_limit))
            .bind(team.updated_at)
            .bind(team.id)
            .fetch_optional(conn)
            .await
            .map_err(slug_conflict(&team.slug, "update_team"))?;

            row.ok_or(TeamError::TeamNotFound(team.id))?.try_into()
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), TeamError> {
        with_conn!(self.handle, |conn| {
            let result = sqlx::query(
                "UPDATE teams SET status = 'deleted', updated_at = ? WHERE id = ? AND status = 'active'",
            )
            .bind(at)
            .bind(id)
            .execute(conn)
            .await
            .map_err(db_error("soft_delete_team"))?;

            if result.rows_affected() == 0 {
                return Err(TeamError::TeamNotFound(id));
            }
            Ok(())
        })
    }
}
