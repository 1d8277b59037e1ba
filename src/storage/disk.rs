use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::auth::AuthSession;
use crate::error::{ConformanceError, Result};
use crate::storage::AuthSessionStore;

/// One JSON file per session under a directory
#[derive(Debug, Clone)]
pub struct DiskSessionStore {
    root: PathBuf,
}

impl DiskSessionStore {
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn session_path(&self, nonce: &str) -> Result<PathBuf> {
        if nonce.is_empty() || !nonce.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConformanceError::session(format!("invalid session key '{nonce}'")));
        }
        Ok(self.root.join(format!("{nonce}.json")))
    }
}

#[async_trait]
impl AuthSessionStore for DiskSessionStore {
    async fn get(&self, nonce: &str) -> Result<Option<AuthSession>> {
        let path = self.session_path(nonce)?;
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn put(&self, session: AuthSession) -> Result<()> {
        let path = self.session_path(session.nonce())?;
        let raw = serde_json::to_string_pretty(&session)?;
        fs::write(&path, raw).await?;
        tracing::debug!("Stored session at {}", path.display());
        Ok(())
    }

    async fn remove(&self, nonce: &str) -> Result<bool> {
        let path = self.session_path(nonce)?;
        if !fs::try_exists(&path).await? {
            return Ok(false);
        }
        fs::remove_file(&path).await?;
        Ok(true)
    }

    /// Only the caller whose `remove_file` succeeds gets the session
    async fn take(&self, nonce: &str) -> Result<Option<AuthSession>> {
        let path = self.session_path(nonce)?;
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match fs::remove_file(&path).await {
            Ok(()) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut nonces = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    nonces.push(stem.to_string());
                }
            }
        }
        nonces.sort();
        Ok(nonces)
    }
}

