//! Session records and request-scoped metadata.

mod device;
mod manager;

pub use device::DeviceSummary;
pub use manager::{
    AuthenticatedSession, RevokeOutcome, SessionManager, SessionOverview, TerminateScope,
};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One authenticated device/browser binding.
///
/// This struct doubles as the cache payload contract: it serializes to JSON
/// with epoch-millisecond timestamps, and the telemetry fields default on
/// read so entries written before telemetry existed still deserialize.
/// The `id` is always the SHA-256 digest of the bearer token
/// ([`derive_session_id`](crate::derive_session_id)); the token itself is
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_active: DateTime<Utc>,
    // client-reported, descriptive only; never consulted by validation
    #[serde(default)]
    pub screen_resolution: Option<String>,
    #[serde(default)]
    pub device_memory: Option<i64>,
    #[serde(default)]
    pub cpu_cores: Option<i64>,
    #[serde(default)]
    pub connection_type: Option<String>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// A legacy row predates device tracking: it is missing the user agent,
    /// the IP address, or both.
    pub fn is_legacy(&self) -> bool {
        self.user_agent.is_none() || self.ip_address.is_none()
    }

    pub fn needs_refresh(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        now >= self.expires_at - threshold
    }

    /// Seconds until expiry, floored at zero. Used as the cache entry TTL so
    /// the fast tier never outlives the durable validity window.
    pub fn remaining_ttl_seconds(&self, now: DateTime<Utc>) -> u64 {
        let remaining = (self.expires_at - now).num_seconds();
        u64::try_from(remaining).unwrap_or(0)
    }
}

/// Device fingerprint captured when a login creates the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

/// Per-request metadata handed to validation by the request binder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl RequestMeta {
    /// Both device fields, when the request supplies both.
    pub(crate) fn device_pair(&self) -> Option<(&str, &str)> {
        match (self.user_agent.as_deref(), self.ip_address.as_deref()) {
            (Some(ua), Some(ip)) => Some((ua, ip)),
            _ => None,
        }
    }
}

/// Client-reported device telemetry, attached to a session after creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTelemetry {
    pub screen_resolution: Option<String>,
    pub device_memory: Option<i64>,
    pub cpu_cores: Option<i64>,
    pub connection_type: Option<String>,
}
