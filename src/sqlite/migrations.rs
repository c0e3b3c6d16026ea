//! Embedded `SQLite` migrations.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlx::SqlitePool;
//! use teamgate::sqlite::{create_ports, migrations};
//!
//! let pool = SqlitePool::connect("sqlite://teams.db").await?;
//! migrations::run(&pool).await?;
//! let ports = create_ports(pool);
//! ```

use sqlx::{Executor, SqlitePool};

const TEAMS_MIGRATIONS: &[(&str, &str)] = &[
    (
        "20260101000001_create_users_table",
        include_str!("../../migrations_sqlite/teams/20260101000001_create_users_table.sql"),
    ),
    (
        "20260101000002_create_teams_table",
        include_str!("../../migrations_sqlite/teams/20260101000002_create_teams_table.sql"),
    ),
    (
        "20260101000003_create_team_members_table",
        include_str!(
            "../../migrations_sqlite/teams/20260101000003_create_team_members_table.sql"
        ),
    ),
    (
        "20260101000004_create_team_invitations_table",
        include_str!(
            "../../migrations_sqlite/teams/20260101000004_create_team_invitations_table.sql"
        ),
    ),
];

/// Applies every migration not yet recorded in `_teamgate_migrations`.
///
/// Safe to call on every startup.
pub async fn run(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    pool.execute(
        r"
        CREATE TABLE IF NOT EXISTS _teamgate_migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        ",
    )
    .await?;

    for (name, sql) in TEAMS_MIGRATIONS {
        let applied: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _teamgate_migrations WHERE name = ?)")
                .bind(*name)
                .fetch_one(pool)
                .await?;
        if applied {
            continue;
        }

        // statements are split on `;`, so migration SQL must not contain one
        // inside a string literal
        let mut tx = pool.begin().await?;
        for statement in sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed).execute(&mut *tx).await?;
            }
        }
        sqlx::query("INSERT INTO _teamgate_migrations (name) VALUES (?)")
            .bind(*name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        log::info!(target: "teamgate", "msg=\"migration applied\", name=\"{name}\"");
    }
    Ok(())
}
