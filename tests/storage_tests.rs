use octofhir_conformance::*;

fn config() -> AuthConfig {
    AuthConfig {
        authorize_endpoint: "http://oauth.example.com/authorize".into(),
        token_endpoint: "http://oauth.example.com/token".into(),
        redirect_uri: "http://localhost:4567/redirect".into(),
        scopes: "launch/patient openid patient/*.read".into(),
        audience: "http://www.example.com/fhir".into(),
        client: ClientRegistration::public("client-1"),
    }
}

fn session() -> AuthSession {
    AuthSession::start(&config()).0
}

mod memory_storage_tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_remove() {
        let store = MemorySessionStore::new();
        let session = session();
        let nonce = session.nonce().to_string();

        store.put(session).await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec![nonce.clone()]);
        assert_eq!(store.get(&nonce).await.unwrap().unwrap().nonce(), nonce);

        assert!(store.remove(&nonce).await.unwrap());
        assert!(!store.remove(&nonce).await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_take_hands_out_a_session_once() {
        let store = MemorySessionStore::new();
        let session = session();
        let nonce = session.nonce().to_string();
        store.put(session).await.unwrap();

        assert!(store.take(&nonce).await.unwrap().is_some());
        assert!(store.take(&nonce).await.unwrap().is_none());
        assert!(store.get(&nonce).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clones_share_sessions() {
        let store = MemorySessionStore::new();
        let other = store.clone();
        store.put(session()).await.unwrap();

        assert_eq!(other.len().await, 1);
    }
}

#[cfg(feature = "disk-storage")]
mod disk_storage_tests {
    use super::*;
    use octofhir_conformance::storage::DiskSessionStore;

    #[tokio::test]
    async fn test_sessions_survive_a_new_store() {
        let dir = tempfile::tempdir().unwrap();
        let session = session();
        let nonce = session.nonce().to_string();

        DiskSessionStore::new(dir.path()).await.unwrap().put(session).await.unwrap();

        let reopened = DiskSessionStore::new(dir.path()).await.unwrap();
        assert_eq!(reopened.list().await.unwrap(), vec![nonce.clone()]);
        let loaded = reopened.get(&nonce).await.unwrap().unwrap();
        assert_eq!(loaded.nonce(), nonce);
        assert!(reopened.remove(&nonce).await.unwrap());
        assert!(reopened.get(&nonce).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_take_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskSessionStore::new(dir.path()).await.unwrap();
        let session = session();
        let nonce = session.nonce().to_string();
        store.put(session).await.unwrap();

        assert_eq!(store.take(&nonce).await.unwrap().unwrap().nonce(), nonce);
        assert!(store.take(&nonce).await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskSessionStore::new(dir.path()).await.unwrap();
        assert!(store.get("../etc/passwd").await.is_err());
        assert!(store.take("../etc/passwd").await.is_err());
    }
}
