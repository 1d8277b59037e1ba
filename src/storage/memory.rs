use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::auth::AuthSession;
use crate::error::Result;
use crate::storage::AuthSessionStore;

#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, AuthSession>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl AuthSessionStore for MemorySessionStore {
    async fn get(&self, nonce: &str) -> Result<Option<AuthSession>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(nonce).cloned())
    }

    async fn put(&self, session: AuthSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.nonce().to_string(), session);
        Ok(())
    }

    async fn remove(&self, nonce: &str) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(nonce).is_some())
    }

    async fn take(&self, nonce: &str) -> Result<Option<AuthSession>> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(nonce))
    }

    async fn list(&self) -> Result<Vec<String>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.keys().cloned().collect())
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemorySessionStore {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
        }
    }
}
