//! Storage abstractions for the two session tiers.
//!
//! The lifecycle manager never talks to a database or cache directly; it
//! goes through these traits so the two-tier protocol can be tested against
//! in-memory fakes without a network dependency.
//!
//! # Traits
//!
//! | Trait | Tier |
//! |-------|------|
//! | [`SessionStore`] | Durable relational store (source of truth) |
//! | [`SessionCache`] | Key-value cache with per-entry TTLs (fast path) |
//! | [`UserStore`] | Point lookups into the user table |
//!
//! # Implementations
//!
//! In-memory versions of all three ship with the crate:
//! [`InMemorySessionStore`], [`InMemorySessionCache`], [`InMemoryUserStore`].
//! Their internals are public so tests can seed and inspect state directly.
//!
//! Enable the `sqlite` feature for `sqlx`-backed
//! [`SqliteSessionStore`](sqlite::SqliteSessionStore) and
//! [`SqliteUserStore`](sqlite::SqliteUserStore).

mod cache;
mod memory;
mod session;
mod user;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use cache::{KeyPage, SessionCache};
pub use memory::{CacheEntry, InMemorySessionCache, InMemorySessionStore, InMemoryUserStore};
pub use session::SessionStore;
pub use user::{User, UserStore};
