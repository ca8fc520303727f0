//! Embedded database migrations for SQLite.
//!
//! Migrations are embedded at compile time and run programmatically, tracked
//! in a `_gatehouse_migrations` table so re-running is a no-op.
//!
//! # Example
//!
//! ```rust,ignore
//! use gatehouse::store::sqlite::migrations;
//! use sqlx::SqlitePool;
//!
//! async fn setup_database(pool: &SqlitePool) -> Result<(), sqlx::Error> {
//!     migrations::run(pool).await?;
//!     Ok(())
//! }
//! ```

use sqlx::SqlitePool;

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "20250801000001_create_users_table",
        include_str!("../../../migrations_sqlite/20250801000001_create_users_table.sql"),
    ),
    (
        "20250801000002_create_sessions_table",
        include_str!("../../../migrations_sqlite/20250801000002_create_sessions_table.sql"),
    ),
];

/// Runs all pending migrations.
pub async fn run(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(
        r"
        CREATE TABLE IF NOT EXISTS _gatehouse_migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        ",
    )
    .execute(pool)
    .await?;

    for &(name, sql) in MIGRATIONS {
        let applied: Option<(String,)> =
            sqlx::query_as("SELECT name FROM _gatehouse_migrations WHERE name = ?")
                .bind(name)
                .fetch_optional(pool)
                .await?;
        if applied.is_none() {
            sqlx::raw_sql(sql).execute(pool).await?;
            sqlx::query("INSERT INTO _gatehouse_migrations (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await?;
        }
    }

    Ok(())
}
