//! `SQLite` implementation of [`MemberRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use super::handle::{db_error, decode, unique_violation, with_conn, Handle, SharedTransaction};
use crate::teams::{Member, MemberRepository, MemberWithUser, NewMember, Role};
use crate::TeamError;

/// `SQLite`-backed member repository.
#[derive(Clone)]
pub struct SqliteMemberRepository {
    handle: Handle,
}

impl SqliteMemberRepository {
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
struct MemberRecord {
    team_id: i64,
    user_id: i64,
    role: String,
    joined_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MemberRecord> for Member {
    type Error = TeamError;

    fn try_from(row: MemberRecord) -> Result<Self, Self::Error> {
        Ok(Member {
            team_id: row.team_id,
            user_id: row.user_id,
            role: decode("role", &row.role, Role::parse)?,
            joined_at: row.joined_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct MemberWithUserRecord {
    #[sqlx(flatten)]
    member: MemberRecord,
    email: String,
    name: String,
}

#[async_trait]
impl MemberRepository for SqliteMemberRepository {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn add(&self, data: NewMember) -> Result<Member, TeamError> {
        with_conn!(self.handle, |conn| {
            let row: MemberRecord = sqlx::query_as(
                r"
                INSERT INTO team_members (team_id, user_id, role, joined_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                RETURNING team_id, user_id, role, joined_at, updated_at
                ",
            )
            .bind(data.team_id)
            .bind(data.user_id)
            .bind(data.role.as_str())
            .bind(data.joined_at)
            .bind(data.joined_at)
            .fetch_one(conn)
            .await
            .map_err(|e| match unique_violation(&e) {
                Some(_) => TeamError::AlreadyMember {
                    team_id: data.team_id,
                },
                None => db_error("add_member")(e),
            })?;

            row.try_into()
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find(&self, team_id: i64, user_id: i64) -> Result<Option<Member>, TeamError> {
        with_conn!(self.handle, |conn| {
            let row: Option<MemberRecord> = sqlx::query_as(
                "SELECT team_id, user_id, role, joined_at, updated_at FROM team_members WHERE team_id = ? AND user_id = ?",
            )
            .bind(team_id)
            .bind(user_id)
            .fetch_optional(conn)
            .await
            .map_err(db_error("find_member"))?;

            row.map(Member::try_from).transpose()
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn list(&self, team_id: i64) -> Result<Vec<Member>, TeamError> {
        with_conn!(self.handle, |conn| {
            let rows: Vec<MemberRecord> = sqlx::query_as(
                r"
                SELECT team_id, user_id, role, joined_at, updated_at
                FROM team_members
                WHERE team_id = ?
                ORDER BY joined_at ASC, user_id ASC
                ",
            )
            .bind(team_id)
            .fetch_all(conn)
            .await
            .map_err(db_error("list_members"))?;

            rows.into_iter().map(Member::try_from).collect()
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn list_with_users(&self, team_id: i64) -> Result<Vec<MemberWithUser>, TeamError> {
        with_conn!(self.handle, |conn| {
            let rows: Vec<MemberWithUserRecord> = sqlx::query_as(
                r"
                SELECT m.team_id, m.user_id, m.role, m.joined_at, m.updated_at, u.email, u.name
                FROM team_members m
                INNER JOIN users u ON u.id = m.user_id
                WHERE m.team_id = ?
                ORDER BY m.joined_at ASC, m.user_id ASC
                ",
            )
            .bind(team_id)
            .fetch_all(conn)
            .await
            .map_err(db_error("list_members_with_users"))?;

            rows.into_iter()
                .map(|row| {
                    Ok(MemberWithUser {
                        member: row.member.try_into()?,
                        email: row.email,
                        name: row.name,
                    })
                })
                .collect()
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn update_role(
        &self,
        team_id: i64,
        user_id: i64,
        role: Role,
        at: DateTime<Utc>,
    ) -> Result<Member, TeamError> {
        with_conn!(self.handle, |conn| {
            let row: Option<MemberRecord> = sqlx::query_as(
                r"
                UPDATE team_members SET role = ?, updated_at = ?
                WHERE team_id = ? AND user_id = ?
                RETURNING team_id, user_id, role, joined_at, updated_at
                ",
            )
            .bind(role.as_str())
            .bind(at)
            .bind(team_id)
            .bind(user_id)
            .fetch_optional(conn)
            .await
            .map_err(db_error("update_member_role"))?;

            row.ok_or(TeamError::MemberNotFound { team_id, user_id })?
                .try_into()
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn remove(&self, team_id: i64, user_id: i64) -> Result<(), TeamError> {
        with_conn!(self.handle, |conn| {
            let result = sqlx::query("DELETE FROM team_members WHERE team_id = ? AND user_id = ?")
                .bind(team_id)
                .bind(user_id)
                .execute(conn)
                .await
                .map_err(db_error("remove_member"))?;

            if result.rows_affected() == 0 {
                return Err(TeamError::MemberNotFound { team_id, user_id });
            }
            Ok(())
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn count(&self, team_id: i64) -> Result<u32, TeamError> {
        with_conn!(self.handle, |conn| {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM team_members WHERE team_id = ?")
                .bind(team_id)
                .fetch_one(conn)
                .await
                .map_err(db_error("count_members"))?;

            u32::try_from(count).map_err(|_| TeamError::Database(format!("invalid member count {count}")))
        })
    }
}
