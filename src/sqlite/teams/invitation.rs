//! `SQLite` implementation of [`InvitationRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use super::handle::{db_error, decode, unique_violation, with_conn, Handle, SharedTransaction};
use crate::teams::{
    CreateInvitation, Invitation, InvitationRepository, InvitationStatus, Page, Role,
};
use crate::TeamError;

const INVITATION_COLUMNS: &str = "id, team_id, invited_by, email, invitee_user_id, role, token_hash, status, expires_at, created_at, accepted_at";

/// `SQLite`-backed invitation repository.
#[derive(Clone)]
pub struct SqliteInvitationRepository {
    handle: Handle,
}

impl SqliteInvitationRepository {
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
struct InvitationRecord {
    id: i64,
    team_id: i64,
    invited_by: i64,
    email: String,
    invitee_user_id: Option<i64>,
    role: String,
    token_hash: String,
    status: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    accepted_at: Option<DateTime<Utc>>,
}

impl TryFrom<InvitationRecord> for Invitation {
    type Error = TeamError;

    fn try_from(row: InvitationRecord) -> Result<Self, Self::Error> {
        Ok(Invitation {
            id: row.id,
            team_id: row.team_id,
            invited_by: row.invited_by,
            email: row.email,
            invitee_user_id: row.invitee_user_id,
            role: decode("role", &row.role, Role::parse)?,
            token_hash: row.token_hash,
            status: decode("status", &row.status, InvitationStatus::parse)?,
            expires_at: row.expires_at,
            created_at: row.created_at,
            accepted_at: row.accepted_at,
        })
    }
}

fn decode_all(rows: Vec<InvitationRecord>) -> Result<Vec<Invitation>, TeamError> {
    rows.into_iter().map(Invitation::try_from).collect()
}

#[async_trait]
impl InvitationRepository for SqliteInvitationRepository {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn create(&self, data: CreateInvitation) -> Result<Invitation, TeamError> {
        with_conn!(self.handle, |conn| {
            let row: InvitationRecord = sqlx::query_as(&format!(
                r"
                INSERT INTO team_invitations
                    (team_id, invited_by, email, invitee_user_id, role, token_hash, status, expires_at, created_at)
                VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, ?)
                RETURNING {INVITATION_COLUMNS}
                "
            ))
            .bind(data.team_id)
            .bind(data.invited_by)
            .bind(&data.email)
            .bind(data.invitee_user_id)
            .bind(data.role.as_str())
            .bind(&data.token_hash)
            .bind(data.expires_at)
            .bind(data.created_at)
            .fetch_one(conn)
            .await
            .map_err(|e| match unique_violation(&e) {
                Some(message) if message.contains("token_hash") => {
                    TeamError::Internal("duplicate invitation token".to_owned())
                }
                Some(_) => TeamError::InvitationAlreadyPending {
                    team_id: data.team_id,
                },
                None => db_error("create_invitation")(e),
            })?;

            row.try_into()
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_by_id(&self, id: i64) -> Result<Option<Invitation>, TeamError> {
        with_conn!(self.handle, |conn| {
            let row: Option<InvitationRecord> = sqlx::query_as(&format!(
                "SELECT {INVITATION_COLUMNS} FROM team_invitations WHERE id = ?"
            ))
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_err(db_error("find_invitation_by_id"))?;

            row.map(Invitation::try_from).transpose()
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Invitation>, TeamError> {
        with_conn!(self.handle, |conn| {
            let row: Option<InvitationRecord> = sqlx::query_as(&format!(
                "SELECT {INVITATION_COLUMNS} FROM team_invitations WHERE token_hash = ?"
            ))
            .bind(token_hash)
            .fetch_optional(conn)
            .await
            .map_err(db_error("find_invitation_by_token_hash"))?;

            row.map(Invitation::try_from).transpose()
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn find_pending_by_email(
        &self,
        team_id: i64,
        email: &str,
    ) -> Result<Option<Invitation>, TeamError> {
        with_conn!(self.handle, |conn| {
            let row: Option<InvitationRecord> = sqlx::query_as(&format!(
                "SELECT {INVITATION_COLUMNS} FROM team_invitations WHERE team_id = ? AND email = ? AND status = 'pending'"
            ))
            .bind(team_id)
            .bind(email)
            .fetch_optional(conn)
            .await
            .map_err(db_error("find_pending_invitation_by_email"))?;

            row.map(Invitation::try_from).transpose()
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn list_by_team(
        &self,
        team_id: i64,
        status: Option<InvitationStatus>,
        page: Page,
    ) -> Result<Vec<Invitation>, TeamError> {
        with_conn!(self.handle, |conn| {
            let rows: Vec<InvitationRecord> = sqlx::query_as(&format!(
                r"
                SELECT {INVITATION_COLUMNS}
                FROM team_invitations
                WHERE team_id = ? AND (? IS NULL OR status = ?)
                ORDER BY created_at DESC, id DESC
                LIMIT ? OFFSET ?
                "
            ))
            .bind(team_id)
            .bind(status.map(|s| s.as_str()))
            .bind(status.map(|s| s.as_str()))
            .bind(i64::from(page.limit()))
            .bind(i64::from(page.offset()))
            .fetch_all(conn)
            .await
            .map_err(db_error("list_invitations_by_team"))?;

            decode_all(rows)
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn list_by_email(
        &self,
        email: &str,
        status: Option<InvitationStatus>,
        page: Page,
    ) -> Result<Vec<Invitation>, TeamError> {
        with_conn!(self.handle, |conn| {
            let rows: Vec<InvitationRecord> = sqlx::query_as(&format!(
                r"
                SELECT {INVITATION_COLUMNS}
                FROM team_invitations
                WHERE email = ? AND (? IS NULL OR status = ?)
                ORDER BY created_at DESC, id DESC
                LIMIT ? OFFSET ?
                "
            ))
            .bind(email)
            .bind(status.map(|s| s.as_str()))
            .bind(status.map(|s| s.as_str()))
            .bind(i64::from(page.limit()))
            .bind(i64::from(page.offset()))
            .fetch_all(conn)
            .await
            .map_err(db_error("list_invitations_by_email"))?;

            decode_all(rows)
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn update_status(
        &self,
        id: i64,
        status: InvitationStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Invitation>, TeamError> {
        let accepted_at = (status == InvitationStatus::Accepted).then_some(at);

        with_conn!(self.handle, |conn| {
            let row: Option<InvitationRecord> = sqlx::query_as(&format!(
                r"
                UPDATE team_invitations
                SET status = ?, accepted_at = COALESCE(?, accepted_at)
                WHERE id = ? AND status = 'pending'
                RETURNING {INVITATION_COLUMNS}
                "
            ))
            .bind(status.as_str())
            .bind(accepted_at)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_error("update_invitation_status"))?;

            if let Some(row) = row {
                return Invitation::try_from(row).map(Some);
            }

            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM team_invitations WHERE id = ?)")
                    .bind(id)
                    .fetch_one(conn)
                    .await
                    .map_err(db_error("update_invitation_status"))?;

            if exists {
                Ok(None)
            } else {
                Err(TeamError::InvitationNotFound)
            }
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn cancel_all_pending(&self, team_id: i64) -> Result<u64, TeamError> {
        with_conn!(self.handle, |conn| {
            let result = sqlx::query(
                "UPDATE team_invitations SET status = 'revoked' WHERE team_id = ? AND status = 'pending'",
            )
            .bind(team_id)
            .execute(conn)
            .await
            .map_err(db_error("cancel_pending_invitations"))?;

            Ok(result.rows_affected())
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn expire_stale(
        &self,
        team_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<u64, TeamError> {
        with_conn!(self.handle, |conn| {
            let result = sqlx::query(
                r"
                UPDATE team_invitations SET status = 'expired'
                WHERE status = 'pending' AND expires_at < ? AND (? IS NULL OR team_id = ?)
                ",
            )
            .bind(now)
            .bind(team_id)
            .bind(team_id)
            .execute(conn)
            .await
            .map_err(db_error("expire_stale_invitations"))?;

            Ok(result.rows_affected())
        })
    }
}
