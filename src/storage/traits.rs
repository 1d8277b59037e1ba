use async_trait::async_trait;

use crate::Result;
use crate::auth::AuthSession;

/// Persistence for authorization sessions suspended at the redirect.
///
/// Sessions are keyed by their state nonce, which is the only value the
/// authorization server hands back on the callback.
#[async_trait]
pub trait AuthSessionStore: Send + Sync {
    async fn get(&self, nonce: &str) -> Result<Option<AuthSession>>;
    async fn put(&self, session: AuthSession) -> Result<()>;
    async fn remove(&self, nonce: &str) -> Result<bool>;
    /// Removes and returns the session; of two concurrent callers only one gets it
    async fn take(&self, nonce: &str) -> Result<Option<AuthSession>>;
    async fn list(&self) -> Result<Vec<String>>;
}
