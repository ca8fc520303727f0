//! Durable session store trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::session::{DeviceTelemetry, Session};
use crate::store::User;
use crate::SessionError;

/// The durable tier: a relational table of sessions keyed by session id.
///
/// `id` has primary-key semantics; every method is a single atomic statement
/// against the backend, so the manager never needs a multi-statement
/// transaction. Updates are field-level on purpose: concurrent validations
/// of the same session may interleave, and last-write-wins on individual
/// columns is an accepted outcome.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts a new session row. Fails if the store is unreachable; a
    /// session without a durable row does not exist.
    async fn insert(&self, session: &Session) -> Result<(), SessionError>;

    /// Point lookup by session id.
    async fn find(&self, session_id: &str) -> Result<Option<Session>, SessionError>;

    /// Point lookup joined against the user table.
    ///
    /// Returns `None` when the session is missing *or* its user no longer
    /// resolves; a session referencing a deleted user is never valid.
    async fn find_with_user(
        &self,
        session_id: &str,
    ) -> Result<Option<(Session, User)>, SessionError>;

    /// All sessions belonging to a user.
    async fn find_for_user(&self, user_id: &str) -> Result<Vec<Session>, SessionError>;

    /// Sessions matching a `(user_id, user_agent, ip_address)` device triple.
    async fn find_for_device(
        &self,
        user_id: &str,
        user_agent: &str,
        ip_address: &str,
    ) -> Result<Vec<Session>, SessionError>;

    /// Slides the expiry window forward and records the activity timestamp.
    async fn update_expiry(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
        last_active: DateTime<Utc>,
    ) -> Result<(), SessionError>;

    /// Records an activity timestamp without touching the expiry.
    async fn touch(&self, session_id: &str, last_active: DateTime<Utc>)
        -> Result<(), SessionError>;

    /// Backfills device fields onto a legacy row.
    async fn update_device(
        &self,
        session_id: &str,
        user_agent: &str,
        ip_address: &str,
        last_active: DateTime<Utc>,
    ) -> Result<(), SessionError>;

    /// Overwrites the client-reported telemetry columns.
    async fn update_telemetry(
        &self,
        session_id: &str,
        telemetry: &DeviceTelemetry,
    ) -> Result<(), SessionError>;

    /// Deletes a session row. Deleting an absent row is not an error.
    async fn delete(&self, session_id: &str) -> Result<(), SessionError>;

    /// Deletes every session belonging to a user in one statement.
    ///
    /// Returns the number of rows removed.
    async fn delete_for_user(&self, user_id: &str) -> Result<u64, SessionError>;

    /// Deletes every session row. Returns the number of rows removed.
    async fn delete_all(&self) -> Result<u64, SessionError>;
}
