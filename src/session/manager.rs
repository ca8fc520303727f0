//! The session lifecycle manager: creation, validation, refresh, migration
//! and revocation across the two storage tiers.
//!
//! The manager owns the consistency discipline between the tiers:
//!
//! - **write-through on mutation** — every state change lands in the durable
//!   store and the cache before the call returns;
//! - **cache-aside on read** — a cache miss falls back to the durable store
//!   and re-hydrates the cache;
//! - **lazy expiry** — there is no background sweeper; expired rows are
//!   removed by the next validation that touches them.
//!
//! Store handles are constructor-injected so the whole protocol can run
//! against in-memory fakes in tests.

use chrono::{DateTime, Utc};

use crate::config::SessionConfig;
use crate::crypto::derive_session_id;
use crate::events::{dispatch, SessionEvent};
use crate::session::{DeviceInfo, DeviceSummary, DeviceTelemetry, RequestMeta, Session};
use crate::store::{SessionCache, SessionStore, User, UserStore};
use crate::SessionError;

/// A successfully validated session together with its user.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedSession {
    pub session: Session,
    pub user: User,
}

/// Scope for bulk termination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminateScope {
    /// Every session belonging to one user.
    User(String),
    /// Every session in the system.
    Global,
}

/// Outcome of a user-initiated single-session revocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    Revoked,
    /// Unknown id, or a session that belongs to someone else.
    NotFound,
    /// The caller tried to revoke the session backing the current request.
    CurrentSession,
}

/// One row of a per-user session listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOverview {
    pub id: String,
    pub browser: &'static str,
    pub os: &'static str,
    pub country: Option<String>,
    pub city: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub is_current: bool,
}

/// The current instant, truncated to millisecond precision.
///
/// Both tiers persist epoch milliseconds; working at the persisted
/// precision keeps an in-memory session identical to what a round trip
/// through either tier returns.
fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Orchestrates the session lifecycle across the durable store and the cache.
pub struct SessionManager<S, C, U> {
    store: S,
    cache: C,
    users: U,
    config: SessionConfig,
}

impl<S, C, U> SessionManager<S, C, U>
where
    S: SessionStore,
    C: SessionCache,
    U: UserStore,
{
    pub fn new(store: S, cache: C, users: U) -> Self {
        Self::with_config(store, cache, users, SessionConfig::default())
    }

    pub fn with_config(store: S, cache: C, users: U, config: SessionConfig) -> Self {
        Self {
            store,
            cache,
            users,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Creates a session for a freshly issued token.
    ///
    /// When the login carries both device fields, older sessions from the
    /// same `(user, user_agent, ip_address)` triple are revoked first, so
    /// repeated logins from one browser never accumulate rows. The durable
    /// insert happens before the cache write: a session without a durable
    /// row does not exist.
    ///
    /// The caller keeps the plaintext token for the client cookie; only its
    /// hash is persisted.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "create_session", skip_all, err)
    )]
    pub async fn create_session(
        &self,
        token: &str,
        user_id: &str,
        device: DeviceInfo,
    ) -> Result<Session, SessionError> {
        let session_id = derive_session_id(token);
        let now = now_millis();

        let mut revoked = 0u64;
        if let (Some(user_agent), Some(ip_address)) = (&device.user_agent, &device.ip_address) {
            let duplicates = self
                .store
                .find_for_device(user_id, user_agent, ip_address)
                .await?;
            for duplicate in &duplicates {
                self.store.delete(&duplicate.id).await?;
                self.cache
                    .delete(&self.config.cache_key(&duplicate.id))
                    .await?;
            }
            revoked = duplicates.len() as u64;
            if revoked > 0 {
                dispatch(SessionEvent::Deduplicated {
                    user_id: user_id.to_owned(),
                    revoked,
                    at: now,
                })
                .await;
            }
        }

        let session = Session {
            id: session_id,
            user_id: user_id.to_owned(),
            expires_at: now + self.config.session_lifetime,
            user_agent: device.user_agent,
            ip_address: device.ip_address,
            country: device.country,
            city: device.city,
            created_at: now,
            last_active: now,
            screen_resolution: None,
            device_memory: None,
            cpu_cores: None,
            connection_type: None,
        };

        self.store.insert(&session).await?;
        self.write_cache(&session, now).await?;

        log::info!(
            target: "gatehouse",
            "msg=\"session created\", session_id={}, user_id={user_id}, duplicates_revoked={revoked}",
            session.id
        );
        dispatch(SessionEvent::Created {
            session_id: session.id.clone(),
            user_id: user_id.to_owned(),
            at: now,
        })
        .await;

        Ok(session)
    }

    /// Validates a bearer token: the hot path.
    ///
    /// Returns `Ok(None)` for anything that should read as "not logged in":
    /// unknown token, expired session, untrusted legacy session, or a
    /// session whose user no longer exists. Store and cache failures
    /// propagate as errors instead, so callers can fail the request rather
    /// than silently log the user out.
    ///
    /// State order is fixed: expiry always precedes legacy migration, which
    /// precedes refresh and heartbeat. An expired session is never
    /// backfilled or refreshed.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "validate_session", skip_all, err)
    )]
    pub async fn validate_session_token(
        &self,
        token: &str,
        meta: Option<&RequestMeta>,
    ) -> Result<Option<AuthenticatedSession>, SessionError> {
        let session_id = derive_session_id(token);
        let cache_key = self.config.cache_key(&session_id);
        let now = now_millis();

        if let Some(bytes) = self.cache.get(&cache_key).await? {
            match serde_json::from_slice::<Session>(&bytes) {
                Ok(session) => {
                    return self.validate_cached(session, &cache_key, meta, now).await;
                }
                Err(err) => {
                    // stale schema or corrupt payload: degrade to the durable tier
                    log::warn!(
                        target: "gatehouse",
                        "msg=\"cache payload rejected\", session_id={session_id}, error=\"{err}\""
                    );
                }
            }
        }

        self.validate_durable(&session_id, meta, now).await
    }

    /// Cache-hit arm of validation. The cached payload is trusted as current
    /// until its own `expires_at` says otherwise.
    async fn validate_cached(
        &self,
        mut session: Session,
        cache_key: &str,
        meta: Option<&RequestMeta>,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthenticatedSession>, SessionError> {
        if session.is_expired(now) {
            self.cache.delete(cache_key).await?;
            self.store.delete(&session.id).await?;
            dispatch(SessionEvent::Expired {
                session_id: session.id,
                at: now,
            })
            .await;
            return Ok(None);
        }

        if session.is_legacy() {
            match meta.and_then(RequestMeta::device_pair) {
                Some((user_agent, ip_address)) => {
                    session.user_agent = Some(user_agent.to_owned());
                    session.ip_address = Some(ip_address.to_owned());
                    session.last_active = now;
                    self.store
                        .update_device(&session.id, user_agent, ip_address, now)
                        .await?;
                    self.write_cache(&session, now).await?;
                    dispatch(SessionEvent::Migrated {
                        session_id: session.id.clone(),
                        at: now,
                    })
                    .await;
                }
                None => {
                    // a legacy session we cannot re-anchor to a device is
                    // not trusted going forward
                    self.cache.delete(cache_key).await?;
                    self.store.delete(&session.id).await?;
                    return Ok(None);
                }
            }
        }

        if session.needs_refresh(now, self.config.refresh_threshold) {
            session.expires_at = now + self.config.session_lifetime;
            session.last_active = now;
            self.write_cache(&session, now).await?;
            self.store
                .update_expiry(&session.id, session.expires_at, now)
                .await?;
            dispatch(SessionEvent::Refreshed {
                session_id: session.id.clone(),
                expires_at: session.expires_at,
                at: now,
            })
            .await;
        } else if now - session.last_active > self.config.heartbeat_interval {
            session.last_active = now;
            self.write_cache(&session, now).await?;
            self.store.touch(&session.id, now).await?;
        }

        let Some(user) = self.users.find_by_id(&session.user_id).await? else {
            // the user was deleted out from under the session; drop the
            // stale pair instead of waiting for the TTL
            self.cache.delete(cache_key).await?;
            self.store.delete(&session.id).await?;
            return Ok(None);
        };

        Ok(Some(AuthenticatedSession { session, user }))
    }

    /// Cache-miss arm of validation: consult the durable join, then restore
    /// the fast path for subsequent requests.
    async fn validate_durable(
        &self,
        session_id: &str,
        meta: Option<&RequestMeta>,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthenticatedSession>, SessionError> {
        let Some((mut session, user)) = self.store.find_with_user(session_id).await? else {
            return Ok(None);
        };

        if session.is_expired(now) {
            self.store.delete(&session.id).await?;
            dispatch(SessionEvent::Expired {
                session_id: session.id,
                at: now,
            })
            .await;
            return Ok(None);
        }

        if session.is_legacy() {
            match meta.and_then(RequestMeta::device_pair) {
                Some((user_agent, ip_address)) => {
                    session.user_agent = Some(user_agent.to_owned());
                    session.ip_address = Some(ip_address.to_owned());
                    session.last_active = now;
                    self.store
                        .update_device(&session.id, user_agent, ip_address, now)
                        .await?;
                    dispatch(SessionEvent::Migrated {
                        session_id: session.id.clone(),
                        at: now,
                    })
                    .await;
                }
                None => {
                    self.store.delete(&session.id).await?;
                    return Ok(None);
                }
            }
        }

        if session.needs_refresh(now, self.config.refresh_threshold) {
            session.expires_at = now + self.config.session_lifetime;
            session.last_active = now;
            self.store
                .update_expiry(&session.id, session.expires_at, now)
                .await?;
            dispatch(SessionEvent::Refreshed {
                session_id: session.id.clone(),
                expires_at: session.expires_at,
                at: now,
            })
            .await;
        } else if now - session.last_active > self.config.heartbeat_interval {
            session.last_active = now;
            self.store.touch(&session.id, now).await?;
        }

        // hydrate the cache with whatever we just persisted
        self.write_cache(&session, now).await?;

        Ok(Some(AuthenticatedSession { session, user }))
    }

    /// Removes a session from both tiers. Idempotent: revoking an already
    /// absent id succeeds.
    ///
    /// The cache entry goes first, so a failure part-way never leaves a
    /// fast-path entry for a deleted row. The inverse partial state (cache
    /// cleared, durable delete failed) surfaces as an error: the session is
    /// then still valid via the durable tier and the caller should retry.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "invalidate_session", skip_all, err)
    )]
    pub async fn invalidate_session(&self, session_id: &str) -> Result<(), SessionError> {
        self.cache
            .delete(&self.config.cache_key(session_id))
            .await?;
        self.store.delete(session_id).await?;

        log::info!(
            target: "gatehouse",
            "msg=\"session revoked\", session_id={session_id}"
        );
        dispatch(SessionEvent::Revoked {
            session_id: session_id.to_owned(),
            at: Utc::now(),
        })
        .await;

        Ok(())
    }

    /// Bulk termination. The durable tier is deleted in one statement and is
    /// authoritative; the cache tier is cleared best-effort (its listing is
    /// only eventually consistent), which is acceptable because every cache
    /// entry dies with its TTL and a cache hit still re-checks the user row.
    ///
    /// Returns the number of durable rows removed.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "terminate_sessions", skip_all, err)
    )]
    pub async fn terminate_sessions(&self, scope: TerminateScope) -> Result<u64, SessionError> {
        let now = now_millis();
        let revoked = match &scope {
            TerminateScope::User(user_id) => {
                // enumerate first: the cache keys are only derivable from
                // the rows about to disappear
                let sessions = self.store.find_for_user(user_id).await?;
                let revoked = self.store.delete_for_user(user_id).await?;
                for session in &sessions {
                    self.cache
                        .delete(&self.config.cache_key(&session.id))
                        .await?;
                }
                revoked
            }
            TerminateScope::Global => {
                let revoked = self.store.delete_all().await?;
                let mut cursor: Option<String> = None;
                loop {
                    let page = self
                        .cache
                        .list(&self.config.cache_key_prefix, cursor.as_deref())
                        .await?;
                    for key in &page.keys {
                        self.cache.delete(key).await?;
                    }
                    if page.complete {
                        break;
                    }
                    match page.cursor {
                        Some(next) => cursor = Some(next),
                        None => break,
                    }
                }
                revoked
            }
        };

        let user_id = match scope {
            TerminateScope::User(user_id) => Some(user_id),
            TerminateScope::Global => None,
        };
        log::info!(
            target: "gatehouse",
            "msg=\"sessions terminated\", scope={}, revoked={revoked}",
            user_id.as_deref().unwrap_or("global")
        );
        dispatch(SessionEvent::AllRevoked {
            user_id,
            revoked,
            at: now,
        })
        .await;

        Ok(revoked)
    }

    /// Attaches client-reported telemetry to the session behind a token.
    ///
    /// Returns `Ok(false)` when the token no longer resolves to a live
    /// session. The expiry window is left untouched: telemetry is
    /// descriptive and must never extend a session's life.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "update_device_telemetry", skip_all, err)
    )]
    pub async fn update_device_telemetry(
        &self,
        token: &str,
        telemetry: DeviceTelemetry,
    ) -> Result<bool, SessionError> {
        let session_id = derive_session_id(token);
        let cache_key = self.config.cache_key(&session_id);
        let now = now_millis();

        let mut session = match self.load_session(&session_id, &cache_key).await? {
            Some(session) if !session.is_expired(now) => session,
            _ => return Ok(false),
        };

        self.store.update_telemetry(&session_id, &telemetry).await?;

        session.screen_resolution = telemetry.screen_resolution;
        session.device_memory = telemetry.device_memory;
        session.cpu_cores = telemetry.cpu_cores;
        session.connection_type = telemetry.connection_type;
        self.write_cache(&session, now).await?;

        Ok(true)
    }

    /// Lists a user's sessions with a coarse device summary per row.
    ///
    /// `current_token` marks the session backing the caller's own request,
    /// so UIs can label it and refuse to revoke it.
    pub async fn list_user_sessions(
        &self,
        user_id: &str,
        current_token: Option<&str>,
    ) -> Result<Vec<SessionOverview>, SessionError> {
        let current_id = current_token.map(derive_session_id);
        let sessions = self.store.find_for_user(user_id).await?;

        Ok(sessions
            .into_iter()
            .map(|session| {
                let summary = DeviceSummary::parse(session.user_agent.as_deref().unwrap_or(""));
                SessionOverview {
                    is_current: current_id.as_deref() == Some(session.id.as_str()),
                    browser: summary.browser,
                    os: summary.os,
                    country: session.country,
                    city: session.city,
                    created_at: session.created_at,
                    last_active: session.last_active,
                    id: session.id,
                }
            })
            .collect())
    }

    /// Revokes one of `user_id`'s sessions by id, refusing ids that belong
    /// to someone else (reported as [`RevokeOutcome::NotFound`] so the
    /// existence of foreign sessions leaks nothing) and refusing the
    /// session backing the current request.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "revoke_user_session", skip_all, err)
    )]
    pub async fn revoke_user_session(
        &self,
        user_id: &str,
        session_id: &str,
        current_token: Option<&str>,
    ) -> Result<RevokeOutcome, SessionError> {
        let Some(session) = self.store.find(session_id).await? else {
            return Ok(RevokeOutcome::NotFound);
        };
        if session.user_id != user_id {
            return Ok(RevokeOutcome::NotFound);
        }
        if let Some(token) = current_token {
            if derive_session_id(token) == session_id {
                return Ok(RevokeOutcome::CurrentSession);
            }
        }

        self.invalidate_session(session_id).await?;
        Ok(RevokeOutcome::Revoked)
    }

    /// Reads a session preferring the cache, without any lifecycle side
    /// effects. Used by operations that only need the current state.
    async fn load_session(
        &self,
        session_id: &str,
        cache_key: &str,
    ) -> Result<Option<Session>, SessionError> {
        if let Some(bytes) = self.cache.get(cache_key).await? {
            if let Ok(session) = serde_json::from_slice::<Session>(&bytes) {
                return Ok(Some(session));
            }
        }
        self.store.find(session_id).await
    }

    /// Serializes a session into its cache slot with a TTL clamped to the
    /// session's remaining validity, so the fast tier can never outlive the
    /// durable window.
    async fn write_cache(&self, session: &Session, now: DateTime<Utc>) -> Result<(), SessionError> {
        let bytes = serde_json::to_vec(session)
            .map_err(|err| SessionError::Serialization(err.to_string()))?;
        self.cache
            .put(
                &self.config.cache_key(&session.id),
                &bytes,
                session.remaining_ttl_seconds(now),
            )
            .await
    }
}
