//! User lookups.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::SessionError;

/// The slice of a user record the session layer needs.
///
/// Users are owned by the account system; this crate only ever reads them to
/// confirm a session still points at a live account and to hand display
/// fields back to the request layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub avatar: Option<String>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Primary-key lookup.
    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, SessionError>;
}
