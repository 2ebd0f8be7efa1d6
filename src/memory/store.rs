use super::{ConversationMemory, SessionKey};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Exclusive access to one session's memory for the duration of a turn.
pub type SessionGuard = OwnedMutexGuard<ConversationMemory>;

/// Key-value store of conversation memory, injected into request handlers.
///
/// `checkout` hands out an exclusive guard per session: two requests for the
/// same session are serialised, requests for different sessions are not.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Lock a session, creating empty memory on first use.
    async fn checkout(&self, key: &SessionKey) -> SessionGuard;

    /// Lock a session only if it already exists.
    async fn checkout_existing(&self, key: &SessionKey) -> Option<SessionGuard>;

    /// Copy of a session's memory.
    async fn snapshot(&self, key: &SessionKey) -> Option<ConversationMemory> {
        self.checkout_existing(key).await.map(|guard| (*guard).clone())
    }

    /// Copy of a session's memory without waiting. `None` when the session
    /// is unknown or a turn currently holds it.
    fn try_snapshot(&self, key: &SessionKey) -> Option<ConversationMemory>;

    /// All known session keys, sorted.
    async fn keys(&self) -> Vec<SessionKey>;

    /// Forget a session; returns whether it existed.
    async fn remove(&self, key: &SessionKey) -> bool;
}

/// Sessions held in process memory; lost on restart.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionKey, Arc<Mutex<ConversationMemory>>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &SessionKey) -> Arc<Mutex<ConversationMemory>> {
        if let Some(slot) = self.sessions.read().get(key) {
            return Arc::clone(slot);
        }
        let mut sessions = self.sessions.write();
        Arc::clone(sessions.entry(key.clone()).or_insert_with(|| {
            debug!("Creating session memory for {}", key);
            Arc::new(Mutex::new(ConversationMemory::new(key.clone())))
        }))
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn checkout(&self, key: &SessionKey) -> SessionGuard {
        self.slot(key).lock_owned().await
    }

    async fn checkout_existing(&self, key: &SessionKey) -> Option<SessionGuard> {
        let slot = self.sessions.read().get(key).cloned();
        match slot {
            Some(slot) => Some(slot.lock_owned().await),
            None => None,
        }
    }

    fn try_snapshot(&self, key: &SessionKey) -> Option<ConversationMemory> {
        let slot = self.sessions.read().get(key).cloned()?;
        let guard = slot.try_lock().ok()?;
        Some((*guard).clone())
    }

    async fn keys(&self) -> Vec<SessionKey> {
        let mut keys: Vec<SessionKey> = self.sessions.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    async fn remove(&self, key: &SessionKey) -> bool {
        self.sessions.write().remove(key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageRole;
    use std::time::Duration;

    #[tokio::test]
    async fn test_checkout_creates_and_persists() {
        let store = InMemorySessionStore::new();
        let key = SessionKey::new("nurse-1", "s1");

        assert!(store.snapshot(&key).await.is_none());
        {
            let mut memory = store.checkout(&key).await;
            memory.push(MessageRole::User, "hello");
        }
        let snapshot = store.snapshot(&key).await.unwrap();
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(store.keys().await, vec![key.clone()]);

        assert!(store.remove(&key).await);
        assert!(!store.remove(&key).await);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated_by_user() {
        let store = InMemorySessionStore::new();
        let a = SessionKey::new("alice", "shared");
        let b = SessionKey::new("bob", "shared");

        store.checkout(&a).await.push(MessageRole::User, "a");
        assert!(store.snapshot(&b).await.is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_same_session_turns_are_serialised() {
        let store = Arc::new(InMemorySessionStore::new());
        let key = SessionKey::new("u", "s");

        let first = store.checkout(&key).await;

        let contender = {
            let store = Arc::clone(&store);
            let key = key.clone();
            tokio::spawn(async move {
                let mut memory = store.checkout(&key).await;
                memory.push(MessageRole::User, "second");
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(first);
        contender.await.unwrap();
        assert_eq!(store.snapshot(&key).await.unwrap().history.len(), 1);
    }

    #[tokio::test]
    async fn test_try_snapshot_skips_busy_session() {
        let store = InMemorySessionStore::new();
        let key = SessionKey::new("u", "s");
        assert!(store.try_snapshot(&key).is_none());

        let mut guard = store.checkout(&key).await;
        guard.push(MessageRole::User, "in progress");
        assert!(store.try_snapshot(&key).is_none());

        drop(guard);
        let memory = store.try_snapshot(&key).unwrap();
        assert_eq!(memory.history.len(), 1);
    }
}
