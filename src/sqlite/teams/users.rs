//! `SQLite` implementation of [`UserDirectory`] over the `users` table.

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

use super::handle::db_error;
use crate::teams::{DirectoryUser, UserDirectory};
use crate::TeamError;

/// Read access to the host application's users.
#[derive(Clone)]
pub struct SqliteUserDirectory {
    pool: SqlitePool,
}

impl SqliteUserDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Registers a user. Emails are stored lowercased.
    pub async fn insert_user(&self, email: &str, name: &str) -> Result<DirectoryUser, TeamError> {
        let row: UserRecord = sqlx::query_as(
            "INSERT INTO users (email, name) VALUES (?, ?) RETURNING id, email, name",
        )
        .bind(email.trim().to_lowercase())
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("insert_user"))?;

        Ok(row.into())
    }
}

#[derive(FromRow)]
struct UserRecord {
    id: i64,
    email: String,
    name: String,
}

impl From<UserRecord> for DirectoryUser {
    fn from(row: UserRecord) -> Self {
        DirectoryUser {
            id: row.id,
            email: row.email,
            name: row.name,
        }
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn find_by_email(&self, email: &str) -> Result<Option<DirectoryUser>, TeamError> {
        let row: Option<UserRecord> =
            sqlx::query_as("SELECT id, email, name FROM users WHERE email = ?")
                .bind(email.trim().to_lowercase())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("find_user_by_email"))?;

        Ok(row.map(Into::into))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_by_id(&self, id: i64) -> Result<Option<DirectoryUser>, TeamError> {
        let row: Option<UserRecord> =
            sqlx::query_as("SELECT id, email, name FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("find_user_by_id"))?;

        Ok(row.map(Into::into))
    }
}
