//! Two-tier session validation and lifecycle management.
//!
//! `gatehouse` keeps authenticated sessions in two places at once: a durable
//! relational store (the source of truth) and a fast key-value cache with
//! per-entry TTLs. The [`SessionManager`] orchestrates token issuance,
//! validation, sliding expiration, legacy-record migration, device-level
//! deduplication and revocation across both tiers, using a write-through
//! discipline on mutation and cache-aside hydration on read.
//!
//! The crate is storage-agnostic: implement [`SessionStore`],
//! [`SessionCache`] and [`UserStore`] for your backends, or use the bundled
//! in-memory implementations ([`InMemorySessionStore`],
//! [`InMemorySessionCache`], [`InMemoryUserStore`]) for development and
//! testing. A `sqlx`/SQLite pair is available behind the `sqlite` feature.

pub mod config;
pub mod crypto;
pub mod events;
pub mod session;
pub mod store;

pub use config::SessionConfig;
pub use crypto::{derive_session_id, generate_token, SecretString};
pub use events::register_event_listeners;
pub use session::{
    AuthenticatedSession, DeviceInfo, DeviceTelemetry, RequestMeta, RevokeOutcome, Session,
    SessionManager, SessionOverview, TerminateScope,
};
pub use store::{
    InMemorySessionCache, InMemorySessionStore, InMemoryUserStore, KeyPage, SessionCache,
    SessionStore, User, UserStore,
};

use std::fmt;

/// Failures surfaced by session operations.
///
/// A missing, expired or orphaned session is *not* an error: validation
/// normalizes those to an empty result so callers treat the request as
/// unauthenticated. Only infrastructure failures are represented here, so a
/// caller can distinguish "logged out" from "the store is down" and fail the
/// request instead of silently dropping the user's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The durable store call itself failed (network, timeout, SQL error).
    StoreUnavailable(String),
    /// The cache call itself failed.
    CacheUnavailable(String),
    /// A session payload could not be serialized for the cache tier.
    Serialization(String),
}

impl std::error::Error for SessionError {}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::StoreUnavailable(msg) => write!(f, "session store unavailable: {msg}"),
            SessionError::CacheUnavailable(msg) => write!(f, "session cache unavailable: {msg}"),
            SessionError::Serialization(msg) => write!(f, "session serialization failed: {msg}"),
        }
    }
}
