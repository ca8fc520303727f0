//! Fast-path cache trait.

use async_trait::async_trait;

use crate::SessionError;

/// One page of a prefix listing.
#[derive(Debug, Clone, Default)]
pub struct KeyPage {
    /// Keys in this page, in listing order.
    pub keys: Vec<String>,
    /// Opaque cursor for the next page, when `complete` is false.
    pub cursor: Option<String>,
    /// True when this page is the last one.
    pub complete: bool,
}

/// The fast tier: a key-value store with per-entry expiration.
///
/// Values are opaque bytes; the manager owns the serialization contract.
/// Listing is eventually consistent under concurrent writes, which is why
/// bulk termination treats the cache tier as best-effort and the durable
/// tier as authoritative.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Fetches a value. An expired entry reads as absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SessionError>;

    /// Stores a value that expires after `ttl_seconds`.
    async fn put(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<(), SessionError>;

    /// Removes a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), SessionError>;

    /// Lists keys under a prefix, one page at a time.
    ///
    /// Pass the cursor from the previous page to continue; `None` starts
    /// from the beginning.
    async fn list(&self, prefix: &str, cursor: Option<&str>) -> Result<KeyPage, SessionError>;
}
