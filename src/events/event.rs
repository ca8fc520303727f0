use chrono::{DateTime, Utc};

/// Session lifecycle events emitted by the manager.
///
/// Events are always fired from mutating operations. If no listeners are
/// registered, they are silently ignored (no-op). Register listeners via
/// [`register_event_listeners`](crate::register_event_listeners).
///
/// Only session ids (token hashes) appear in events, never tokens.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A login created a new session.
    Created {
        session_id: String,
        user_id: String,
        at: DateTime<Utc>,
    },
    /// Creating a session revoked older sessions from the same device.
    Deduplicated {
        user_id: String,
        revoked: u64,
        at: DateTime<Utc>,
    },
    /// Validation slid the expiry window forward.
    Refreshed {
        session_id: String,
        expires_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// A legacy session was backfilled with device fields.
    Migrated {
        session_id: String,
        at: DateTime<Utc>,
    },
    /// Lazy expiry removed a session during validation.
    Expired {
        session_id: String,
        at: DateTime<Utc>,
    },
    /// A session was explicitly revoked (logout or admin).
    Revoked {
        session_id: String,
        at: DateTime<Utc>,
    },
    /// Bulk termination removed every session in scope.
    AllRevoked {
        /// `None` for a global purge.
        user_id: Option<String>,
        revoked: u64,
        at: DateTime<Utc>,
    },
}

impl SessionEvent {
    /// Returns a dot-separated event name for logging/tracing.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "session.created",
            Self::Deduplicated { .. } => "session.deduplicated",
            Self::Refreshed { .. } => "session.refreshed",
            Self::Migrated { .. } => "session.migrated",
            Self::Expired { .. } => "session.expired",
            Self::Revoked { .. } => "session.revoked",
            Self::AllRevoked { .. } => "session.all_revoked",
        }
    }

    /// Returns the timestamp when this event occurred.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Created { at, .. }
            | Self::Deduplicated { at, .. }
            | Self::Refreshed { at, .. }
            | Self::Migrated { at, .. }
            | Self::Expired { at, .. }
            | Self::Revoked { at, .. }
            | Self::AllRevoked { at, .. } => *at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        let now = Utc::now();

        assert_eq!(
            SessionEvent::Created {
                session_id: "s1".to_owned(),
                user_id: "u1".to_owned(),
                at: now
            }
            .name(),
            "session.created"
        );
        assert_eq!(
            SessionEvent::Deduplicated {
                user_id: "u1".to_owned(),
                revoked: 1,
                at: now
            }
            .name(),
            "session.deduplicated"
        );
        assert_eq!(
            SessionEvent::Refreshed {
                session_id: "s1".to_owned(),
                expires_at: now,
                at: now
            }
            .name(),
            "session.refreshed"
        );
        assert_eq!(
            SessionEvent::Migrated {
                session_id: "s1".to_owned(),
                at: now
            }
            .name(),
            "session.migrated"
        );
        assert_eq!(
            SessionEvent::Expired {
                session_id: "s1".to_owned(),
                at: now
            }
            .name(),
            "session.expired"
        );
        assert_eq!(
            SessionEvent::Revoked {
                session_id: "s1".to_owned(),
                at: now
            }
            .name(),
            "session.revoked"
        );
        assert_eq!(
            SessionEvent::AllRevoked {
                user_id: None,
                revoked: 3,
                at: now
            }
            .name(),
            "session.all_revoked"
        );
    }

    #[test]
    fn test_event_timestamp() {
        let now = Utc::now();
        let event = SessionEvent::Expired {
            session_id: "s1".to_owned(),
            at: now,
        };
        assert_eq!(event.timestamp(), now);
    }
}
