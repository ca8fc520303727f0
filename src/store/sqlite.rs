//! `sqlx`/SQLite implementations of the durable-tier traits.
//!
//! Timestamps are persisted as INTEGER epoch milliseconds, matching the
//! cache payload format, so a row and its cache entry always agree on the
//! instant they describe.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::session::{DeviceTelemetry, Session};
use crate::store::{SessionStore, User, UserStore};
use crate::SessionError;

pub mod migrations;

fn db_error(operation: &str, err: sqlx::Error) -> SessionError {
    log::error!(
        target: "gatehouse",
        "msg=\"database error\", operation=\"{operation}\", error=\"{err}\""
    );
    SessionError::StoreUnavailable(err.to_string())
}

fn from_millis(ts: i64) -> Result<DateTime<Utc>, SessionError> {
    DateTime::from_timestamp_millis(ts)
        .ok_or_else(|| SessionError::StoreUnavailable(format!("timestamp out of range: {ts}")))
}

const SESSION_COLUMNS: &str = "id, user_id, expires_at, user_agent, ip_address, country, city, \
     created_at, last_active, screen_resolution, device_memory, cpu_cores, connection_type";

#[derive(FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    expires_at: i64,
    user_agent: Option<String>,
    ip_address: Option<String>,
    country: Option<String>,
    city: Option<String>,
    created_at: i64,
    last_active: i64,
    screen_resolution: Option<String>,
    device_memory: Option<i64>,
    cpu_cores: Option<i64>,
    connection_type: Option<String>,
}

impl SessionRow {
    fn into_session(self) -> Result<Session, SessionError> {
        Ok(Session {
            id: self.id,
            user_id: self.user_id,
            expires_at: from_millis(self.expires_at)?,
            user_agent: self.user_agent,
            ip_address: self.ip_address,
            country: self.country,
            city: self.city,
            created_at: from_millis(self.created_at)?,
            last_active: from_millis(self.last_active)?,
            screen_resolution: self.screen_resolution,
            device_memory: self.device_memory,
            cpu_cores: self.cpu_cores,
            connection_type: self.connection_type,
        })
    }
}

/// Durable session table backed by SQLite.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn insert(&self, session: &Session) -> Result<(), SessionError> {
        sqlx::query(
            r"INSERT INTO sessions (id, user_id, expires_at, user_agent, ip_address, country,
               city, created_at, last_active, screen_resolution, device_memory, cpu_cores,
               connection_type)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(session.expires_at.timestamp_millis())
        .bind(&session.user_agent)
        .bind(&session.ip_address)
        .bind(&session.country)
        .bind(&session.city)
        .bind(session.created_at.timestamp_millis())
        .bind(session.last_active.timestamp_millis())
        .bind(&session.screen_resolution)
        .bind(session.device_memory)
        .bind(session.cpu_cores)
        .bind(&session.connection_type)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert_session", e))?;

        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn find(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find_session", e))?;

        row.map(SessionRow::into_session).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn find_with_user(
        &self,
        session_id: &str,
    ) -> Result<Option<(Session, User)>, SessionError> {
        #[derive(FromRow)]
        struct JoinedRow {
            #[sqlx(flatten)]
            session: SessionRow,
            username: String,
            avatar: Option<String>,
        }

        let row: Option<JoinedRow> = sqlx::query_as(
            r"SELECT s.id, s.user_id, s.expires_at, s.user_agent, s.ip_address, s.country,
               s.city, s.created_at, s.last_active, s.screen_resolution, s.device_memory,
               s.cpu_cores, s.connection_type, u.username, u.avatar
               FROM sessions s
               INNER JOIN users u ON u.id = s.user_id
               WHERE s.id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find_session_with_user", e))?;

        row.map(|joined| {
            let user = User {
                id: joined.session.user_id.clone(),
                username: joined.username,
                avatar: joined.avatar,
            };
            joined.session.into_session().map(|session| (session, user))
        })
        .transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn find_for_user(&self, user_id: &str) -> Result<Vec<Session>, SessionError> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = ? ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("find_sessions_for_user", e))?;

        rows.into_iter().map(SessionRow::into_session).collect()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn find_for_device(
        &self,
        user_id: &str,
        user_agent: &str,
        ip_address: &str,
    ) -> Result<Vec<Session>, SessionError> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
              WHERE user_id = ? AND user_agent = ? AND ip_address = ?"
        ))
        .bind(user_id)
        .bind(user_agent)
        .bind(ip_address)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("find_sessions_for_device", e))?;

        rows.into_iter().map(SessionRow::into_session).collect()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn update_expiry(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
        last_active: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        sqlx::query("UPDATE sessions SET expires_at = ?, last_active = ? WHERE id = ?")
            .bind(expires_at.timestamp_millis())
            .bind(last_active.timestamp_millis())
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("update_expiry", e))?;

        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn touch(
        &self,
        session_id: &str,
        last_active: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        sqlx::query("UPDATE sessions SET last_active = ? WHERE id = ?")
            .bind(last_active.timestamp_millis())
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("touch_session", e))?;

        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn update_device(
        &self,
        session_id: &str,
        user_agent: &str,
        ip_address: &str,
        last_active: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        sqlx::query(
            "UPDATE sessions SET user_agent = ?, ip_address = ?, last_active = ? WHERE id = ?",
        )
        .bind(user_agent)
        .bind(ip_address)
        .bind(last_active.timestamp_millis())
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update_device", e))?;

        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn update_telemetry(
        &self,
        session_id: &str,
        telemetry: &DeviceTelemetry,
    ) -> Result<(), SessionError> {
        sqlx::query(
            r"UPDATE sessions SET screen_resolution = ?, device_memory = ?, cpu_cores = ?,
               connection_type = ? WHERE id = ?",
        )
        .bind(&telemetry.screen_resolution)
        .bind(telemetry.device_memory)
        .bind(telemetry.cpu_cores)
        .bind(&telemetry.connection_type)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update_telemetry", e))?;

        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete_session", e))?;

        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn delete_for_user(&self, user_id: &str) -> Result<u64, SessionError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete_sessions_for_user", e))?;

        Ok(result.rows_affected())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn delete_all(&self) -> Result<u64, SessionError> {
        let result = sqlx::query("DELETE FROM sessions")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete_all_sessions", e))?;

        Ok(result.rows_affected())
    }
}

/// User table reads backed by SQLite.
#[derive(Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a user row. The account system owns this table in production;
    /// this helper exists for provisioning and tests.
    pub async fn insert_user(&self, user: &User) -> Result<(), SessionError> {
        sqlx::query("INSERT INTO users (id, username, avatar) VALUES (?, ?, ?)")
            .bind(&user.id)
            .bind(&user.username)
            .bind(&user.avatar)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("insert_user", e))?;

        Ok(())
    }

    /// Deletes a user row. Exists for tests exercising orphaned sessions.
    pub async fn delete_user(&self, user_id: &str) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete_user", e))?;

        Ok(())
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, SessionError> {
        let row: Option<User> = sqlx::query_as::<_, (String, String, Option<String>)>(
            "SELECT id, username, avatar FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find_user", e))?
        .map(|(id, username, avatar)| User {
            id,
            username,
            avatar,
        });

        Ok(row)
    }
}
