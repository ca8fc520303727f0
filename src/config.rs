//! Session lifecycle configuration.

use chrono::Duration;

/// Tunable knobs for the session lifecycle.
///
/// The defaults match a long-lived browser session: 30 days of validity,
/// slid forward once the session crosses the halfway point, with
/// `last_active` touches throttled to one write per minute.
///
/// # Example
///
/// ```rust
/// use chrono::Duration;
/// use gatehouse::SessionConfig;
///
/// let config = SessionConfig {
///     session_lifetime: Duration::days(7),
///     refresh_threshold: Duration::days(3),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a freshly created or refreshed session stays valid.
    pub session_lifetime: Duration,
    /// Once a session is within this much of its expiry, validation slides
    /// `expires_at` forward by a full lifetime.
    pub refresh_threshold: Duration,
    /// Minimum gap between `last_active` writes on the hot path.
    pub heartbeat_interval: Duration,
    /// Prefix for cache keys. Versioned so a payload schema change can
    /// invalidate every stale entry by bumping the prefix.
    pub cache_key_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_lifetime: Duration::days(30),
            refresh_threshold: Duration::days(15),
            heartbeat_interval: Duration::seconds(60),
            cache_key_prefix: "session:v2:".to_owned(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.session_lifetime <= Duration::zero() {
            return Err("session_lifetime must be positive");
        }
        if self.refresh_threshold <= Duration::zero() {
            return Err("refresh_threshold must be positive");
        }
        if self.refresh_threshold >= self.session_lifetime {
            return Err("refresh_threshold must be shorter than session_lifetime");
        }
        if self.cache_key_prefix.is_empty() {
            return Err("cache_key_prefix must not be empty");
        }
        Ok(())
    }

    /// Cache key for a session id.
    pub fn cache_key(&self, session_id: &str) -> String {
        format!("{}{}", self.cache_key_prefix, session_id)
    }
}
