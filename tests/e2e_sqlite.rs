//! End-to-end tests for the SQLite durable tier.
//!
//! These tests use an in-memory SQLite database.
//! Run with: `cargo test --features sqlite --test e2e_sqlite`

#![cfg(feature = "sqlite")]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{Duration, Utc};
use gatehouse::store::sqlite::{migrations, SqliteSessionStore, SqliteUserStore};
use gatehouse::{
    derive_session_id, generate_token, DeviceInfo, DeviceTelemetry, InMemorySessionCache,
    RequestMeta, Session, SessionCache, SessionManager, SessionStore, TerminateScope, User,
    UserStore,
};
use serial_test::serial;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

async fn setup_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory SQLite database");

    migrations::run(&pool).await.expect("Failed to run migrations");

    pool
}

async fn seed_user(pool: &SqlitePool, id: &str, username: &str) -> SqliteUserStore {
    let users = SqliteUserStore::new(pool.clone());
    users
        .insert_user(&User {
            id: id.to_owned(),
            username: username.to_owned(),
            avatar: None,
        })
        .await
        .unwrap();
    users
}

fn sample_session(token: &str, user_id: &str) -> Session {
    let now = Utc::now();
    Session {
        id: derive_session_id(token),
        user_id: user_id.to_owned(),
        expires_at: now + Duration::days(30),
        user_agent: Some("Mozilla/5.0 Chrome/126".to_owned()),
        ip_address: Some("203.0.113.7".to_owned()),
        country: Some("SG".to_owned()),
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
#[serial]
async fn test_session_store_crud() {
    let pool = setup_db().await;
    seed_user(&pool, "u1", "gin").await;
    let store = SqliteSessionStore::new(pool);

    let session = sample_session("tok-crud", "u1");
    store.insert(&session).await.unwrap();

    let found = store.find(&session.id).await.unwrap().unwrap();
    // millisecond precision survives the round trip
    assert_eq!(found.id, session.id);
    assert_eq!(
        found.expires_at.timestamp_millis(),
        session.expires_at.timestamp_millis()
    );
    assert_eq!(
        found.created_at.timestamp_millis(),
        session.created_at.timestamp_millis()
    );
    assert_eq!(found.user_agent, session.user_agent);
    assert!(store.find("missing").await.unwrap().is_none());

    store.delete(&session.id).await.unwrap();
    assert!(store.find(&session.id).await.unwrap().is_none());
    // deleting again is a no-op
    store.delete(&session.id).await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_join_fails_closed_without_user_row() {
    let pool = setup_db().await;
    let users = seed_user(&pool, "u1", "gin").await;
    let store = SqliteSessionStore::new(pool);

    let session = sample_session("tok-join", "u1");
    store.insert(&session).await.unwrap();

    let (joined, user) = store.find_with_user(&session.id).await.unwrap().unwrap();
    assert_eq!(joined.id, session.id);
    assert_eq!(user.username, "gin");

    users.delete_user("u1").await.unwrap();
    assert!(store.find_with_user(&session.id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_device_lookup_and_bulk_deletes() {
    let pool = setup_db().await;
    seed_user(&pool, "u1", "gin").await;
    seed_user(&pool, "u2", "rangiku").await;
    let store = SqliteSessionStore::new(pool);

    store.insert(&sample_session("t1", "u1")).await.unwrap();
    store.insert(&sample_session("t2", "u1")).await.unwrap();
    let mut other_device = sample_session("t3", "u1");
    other_device.ip_address = Some("198.51.100.4".to_owned());
    store.insert(&other_device).await.unwrap();
    store.insert(&sample_session("t4", "u2")).await.unwrap();

    let same_device = store
        .find_for_device("u1", "Mozilla/5.0 Chrome/126", "203.0.113.7")
        .await
        .unwrap();
    assert_eq!(same_device.len(), 2);

    assert_eq!(store.find_for_user("u1").await.unwrap().len(), 3);
    assert_eq!(store.delete_for_user("u1").await.unwrap(), 3);
    assert_eq!(store.delete_all().await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn test_field_level_updates() {
    let pool = setup_db().await;
    seed_user(&pool, "u1", "gin").await;
    let store = SqliteSessionStore::new(pool);

    let mut session = sample_session("tok-updates", "u1");
    session.user_agent = None;
    session.ip_address = None;
    store.insert(&session).await.unwrap();

    let now = Utc::now();
    store
        .update_device(&session.id, "Mozilla/5.0 Firefox/127", "198.51.100.4", now)
        .await
        .unwrap();
    let updated = store.find(&session.id).await.unwrap().unwrap();
    assert_eq!(updated.user_agent.as_deref(), Some("Mozilla/5.0 Firefox/127"));
    assert_eq!(updated.last_active.timestamp_millis(), now.timestamp_millis());

    let later = now + Duration::days(30);
    store.update_expiry(&session.id, later, now).await.unwrap();
    let updated = store.find(&session.id).await.unwrap().unwrap();
    assert_eq!(updated.expires_at.timestamp_millis(), later.timestamp_millis());

    store
        .update_telemetry(
            &session.id,
            &DeviceTelemetry {
                screen_resolution: Some("2560x1440".to_owned()),
                device_memory: Some(16),
                cpu_cores: Some(8),
                connection_type: Some("4g".to_owned()),
            },
        )
        .await
        .unwrap();
    let updated = store.find(&session.id).await.unwrap().unwrap();
    assert_eq!(updated.device_memory, Some(16));
    assert_eq!(updated.connection_type.as_deref(), Some("4g"));
}

#[tokio::test]
#[serial]
async fn test_user_store_lookup() {
    let pool = setup_db().await;
    let users = seed_user(&pool, "u1", "gin").await;

    let found = users.find_by_id("u1").await.unwrap().unwrap();
    assert_eq!(found.username, "gin");
    assert!(users.find_by_id("missing").await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_manager_full_lifecycle_over_sqlite() {
    let pool = setup_db().await;
    let users = seed_user(&pool, "u1", "gin").await;
    let store = SqliteSessionStore::new(pool);
    let cache = InMemorySessionCache::new();
    let manager = SessionManager::new(store.clone(), cache.clone(), users);

    let device = DeviceInfo {
        user_agent: Some("Mozilla/5.0 Chrome/126".to_owned()),
        ip_address: Some("203.0.113.7".to_owned()),
        country: Some("SG".to_owned()),
        city: Some("Singapore".to_owned()),
    };
    let meta = RequestMeta {
        user_agent: Some("Mozilla/5.0 Chrome/126".to_owned()),
        ip_address: Some("203.0.113.7".to_owned()),
    };

    // create, validate via the cache, then via the durable tier
    let token = generate_token();
    let token = token.expose_secret();
    let session = manager.create_session(token, "u1", device.clone()).await.unwrap();

    let validated = manager
        .validate_session_token(token, Some(&meta))
        .await
        .unwrap()
        .expect("cache-path validation");
    assert_eq!(validated.session.id, session.id);

    cache.delete(&manager.config().cache_key(&session.id)).await.unwrap();
    let validated = manager
        .validate_session_token(token, Some(&meta))
        .await
        .unwrap()
        .expect("durable-path validation");
    assert_eq!(validated.user.username, "gin");
    assert!(!cache.is_empty());

    // a second login from the same device replaces the session
    let second = generate_token();
    let second = second.expose_secret();
    let replacement = manager.create_session(second, "u1", device).await.unwrap();
    assert!(manager
        .validate_session_token(token, Some(&meta))
        .await
        .unwrap()
        .is_none());
    assert_eq!(store.find_for_user("u1").await.unwrap().len(), 1);

    // and a global purge clears both tiers
    let revoked = manager.terminate_sessions(TerminateScope::Global).await.unwrap();
    assert_eq!(revoked, 1);
    assert!(store.find(&replacement.id).await.unwrap().is_none());
    assert!(cache.is_empty());
}
