//! In-memory storage for both tiers.
//!
//! Suitable for development, testing, and single-instance deployments.
//! Internals are public so tests can seed timestamps and inspect state
//! without going through the lifecycle manager.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::session::{DeviceTelemetry, Session};
use crate::store::{KeyPage, SessionCache, SessionStore, User, UserStore};
use crate::SessionError;

fn poisoned() -> SessionError {
    SessionError::StoreUnavailable("lock poisoned".to_owned())
}

/// In-memory user table.
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    pub users: Arc<RwLock<HashMap<String, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        if let Ok(mut users) = self.users.write() {
            users.insert(user.id.clone(), user);
        }
    }

    pub fn remove(&self, user_id: &str) {
        if let Ok(mut users) = self.users.write() {
            users.remove(user_id);
        }
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, SessionError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.get(user_id).cloned())
    }
}

/// In-memory session table.
///
/// Shares the user map with an [`InMemoryUserStore`] so `find_with_user`
/// behaves like the SQL inner join it stands in for.
#[derive(Clone)]
pub struct InMemorySessionStore {
    pub sessions: Arc<RwLock<HashMap<String, Session>>>,
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl InMemorySessionStore {
    pub fn new(users: &InMemoryUserStore) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            users: Arc::clone(&users.users),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: &Session) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn find(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        Ok(sessions.get(session_id).cloned())
    }

    async fn find_with_user(
        &self,
        session_id: &str,
    ) -> Result<Option<(Session, User)>, SessionError> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        let Some(session) = sessions.get(session_id).cloned() else {
            return Ok(None);
        };
        drop(sessions);

        let users = self.users.read().map_err(|_| poisoned())?;
        // inner-join semantics: no user row, no result
        Ok(users
            .get(&session.user_id)
            .cloned()
            .map(|user| (session, user)))
    }

    async fn find_for_user(&self, user_id: &str) -> Result<Vec<Session>, SessionError> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        let mut matches: Vec<Session> = sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matches)
    }

    async fn find_for_device(
        &self,
        user_id: &str,
        user_agent: &str,
        ip_address: &str,
    ) -> Result<Vec<Session>, SessionError> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        Ok(sessions
            .values()
            .filter(|s| {
                s.user_id == user_id
                    && s.user_agent.as_deref() == Some(user_agent)
                    && s.ip_address.as_deref() == Some(ip_address)
            })
            .cloned()
            .collect())
    }

    async fn update_expiry(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
        last_active: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        if let Some(session) = sessions.get_mut(session_id) {
            session.expires_at = expires_at;
            session.last_active = last_active;
        }
        Ok(())
    }

    async fn touch(
        &self,
        session_id: &str,
        last_active: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        if let Some(session) = sessions.get_mut(session_id) {
            session.last_active = last_active;
        }
        Ok(())
    }

    async fn update_device(
        &self,
        session_id: &str,
        user_agent: &str,
        ip_address: &str,
        last_active: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        if let Some(session) = sessions.get_mut(session_id) {
            session.user_agent = Some(user_agent.to_owned());
            session.ip_address = Some(ip_address.to_owned());
            session.last_active = last_active;
        }
        Ok(())
    }

    async fn update_telemetry(
        &self,
        session_id: &str,
        telemetry: &DeviceTelemetry,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        if let Some(session) = sessions.get_mut(session_id) {
            session.screen_resolution = telemetry.screen_resolution.clone();
            session.device_memory = telemetry.device_memory;
            session.cpu_cores = telemetry.cpu_cores;
            session.connection_type = telemetry.connection_type.clone();
        }
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        sessions.remove(session_id);
        Ok(())
    }

    async fn delete_for_user(&self, user_id: &str) -> Result<u64, SessionError> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn delete_all(&self) -> Result<u64, SessionError> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        let removed = sessions.len();
        sessions.clear();
        Ok(removed as u64)
    }
}

/// One cached value plus the expiry bookkeeping tests assert against.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Vec<u8>,
    pub ttl_seconds: u64,
    pub expires_at: DateTime<Utc>,
}

/// In-memory key-value cache with per-entry TTLs.
///
/// Keys are kept ordered so prefix listings paginate deterministically; the
/// page size is configurable so tests can exercise the multi-page path of
/// bulk termination.
#[derive(Clone)]
pub struct InMemorySessionCache {
    pub entries: Arc<Mutex<BTreeMap<String, CacheEntry>>>,
    page_size: usize,
}

impl Default for InMemorySessionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionCache {
    pub fn new() -> Self {
        Self::with_page_size(1000)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(BTreeMap::new())),
            page_size: page_size.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cache_poisoned() -> SessionError {
    SessionError::CacheUnavailable("lock poisoned".to_owned())
}

#[async_trait]
impl SessionCache for InMemorySessionCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SessionError> {
        let mut entries = self.entries.lock().map_err(|_| cache_poisoned())?;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Utc::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<(), SessionError> {
        let mut entries = self.entries.lock().map_err(|_| cache_poisoned())?;
        let ttl = Duration::seconds(i64::try_from(ttl_seconds).unwrap_or(i64::MAX / 1000));
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        entries.insert(
            key.to_owned(),
            CacheEntry {
                value: value.to_vec(),
                ttl_seconds,
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SessionError> {
        let mut entries = self.entries.lock().map_err(|_| cache_poisoned())?;
        entries.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str, cursor: Option<&str>) -> Result<KeyPage, SessionError> {
        let entries = self.entries.lock().map_err(|_| cache_poisoned())?;
        let now = Utc::now();

        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.expires_at > now)
            .filter(|(key, _)| cursor.map_or(true, |c| key.as_str() > c))
            .map(|(key, _)| key.clone())
            .take(self.page_size + 1)
            .collect();

        let complete = keys.len() <= self.page_size;
        keys.truncate(self.page_size);
        let cursor = if complete { None } else { keys.last().cloned() };

        Ok(KeyPage {
            keys,
            cursor,
            complete,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_session(id: &str, user_id: &str) -> Session {
        let now = Utc::now();
        Session {
            id: id.to_owned(),
            user_id: user_id.to_owned(),
            expires_at: now + Duration::days(30),
            user_agent: Some("UA".to_owned()),
            ip_address: Some("10.0.0.1".to_owned()),
            country: None,
            city: None,
            created_at: now,
            last_active: now,
            screen_resolution: None,
            device_memory: None,
            cpu_cores: None,
            connection_type: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let users = InMemoryUserStore::new();
        let store = InMemorySessionStore::new(&users);

        store.insert(&sample_session("s1", "u1")).await.unwrap();
        let found = store.find("s1").await.unwrap().unwrap();
        assert_eq!(found.user_id, "u1");
        assert!(store.find("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_with_user_requires_user_row() {
        let users = InMemoryUserStore::new();
        let store = InMemorySessionStore::new(&users);
        store.insert(&sample_session("s1", "u1")).await.unwrap();

        assert!(store.find_with_user("s1").await.unwrap().is_none());

        users.insert(User {
            id: "u1".to_owned(),
            username: "gin".to_owned(),
            avatar: None,
        });
        let (session, user) = store.find_with_user("s1").await.unwrap().unwrap();
        assert_eq!(session.id, "s1");
        assert_eq!(user.username, "gin");
    }

    #[tokio::test]
    async fn test_find_for_device_matches_exact_triple() {
        let users = InMemoryUserStore::new();
        let store = InMemorySessionStore::new(&users);
        store.insert(&sample_session("s1", "u1")).await.unwrap();

        let hits = store.find_for_device("u1", "UA", "10.0.0.1").await.unwrap();
        assert_eq!(hits.len(), 1);

        assert!(store
            .find_for_device("u1", "UA", "10.0.0.2")
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .find_for_device("u2", "UA", "10.0.0.1")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delete_for_user_counts_rows() {
        let users = InMemoryUserStore::new();
        let store = InMemorySessionStore::new(&users);
        store.insert(&sample_session("s1", "u1")).await.unwrap();
        store.insert(&sample_session("s2", "u1")).await.unwrap();
        store.insert(&sample_session("s3", "u2")).await.unwrap();

        assert_eq!(store.delete_for_user("u1").await.unwrap(), 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_put_get_delete() {
        let cache = InMemorySessionCache::new();
        cache.put("k1", b"v1", 60).await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), Some(b"v1".to_vec()));

        cache.delete("k1").await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), None);
        // deleting again is fine
        cache.delete("k1").await.unwrap();
    }

    #[tokio::test]
    async fn test_cache_entry_expires() {
        let cache = InMemorySessionCache::new();
        cache.put("k1", b"v1", 0).await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_paginates_in_key_order() {
        let cache = InMemorySessionCache::with_page_size(2);
        for key in ["session:v2:a", "session:v2:b", "session:v2:c", "other:x"] {
            cache.put(key, b"v", 60).await.unwrap();
        }

        let first = cache.list("session:v2:", None).await.unwrap();
        assert_eq!(first.keys, vec!["session:v2:a", "session:v2:b"]);
        assert!(!first.complete);

        let second = cache
            .list("session:v2:", first.cursor.as_deref())
            .await
            .unwrap();
        assert_eq!(second.keys, vec!["session:v2:c"]);
        assert!(second.complete);
        assert!(second.cursor.is_none());
    }
}
