//! In-memory store backends.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    FederatedUserStore, LocalSessionStore, LocalUserStore, SloRegistry, StoreError,
};
use crate::models::{FederateSlo, FederatedUser, LocalUser};

/// In-memory federated-identity cache.
#[derive(Debug, Default)]
pub struct InMemoryFederatedUserStore {
    users: Arc<RwLock<HashMap<(String, String), FederatedUser>>>,
}

impl InMemoryFederatedUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached identities.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl FederatedUserStore for InMemoryFederatedUserStore {
    async fn upsert(&self, mut user: FederatedUser) -> Result<FederatedUser, StoreError> {
        user.last_update = Utc::now();
        let key = (user.username.clone(), user.provider.clone());
        // The write lock serializes per-key read-then-write; the map entry
        // is replaced wholesale, so two racing upserts leave one row.
        let mut users = self.users.write().await;
        users.insert(key, user.clone());
        Ok(user)
    }

    async fn find(
        &self,
        username: &str,
        provider: &str,
    ) -> Result<Option<FederatedUser>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .get(&(username.to_string(), provider.to_string()))
            .cloned())
    }
}

/// In-memory SLO obligation registry.
#[derive(Debug, Default)]
pub struct InMemorySloRegistry {
    rows: Arc<RwLock<Vec<FederateSlo>>>,
}

impl InMemorySloRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outstanding obligations.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl SloRegistry for InMemorySloRegistry {
    async fn register(
        &self,
        username: &str,
        session_key: &str,
        ticket: &str,
    ) -> Result<FederateSlo, StoreError> {
        let row = FederateSlo::new(username, session_key, ticket);
        self.rows.write().await.push(row.clone());
        tracing::debug!(
            username = %username,
            ticket = %ticket,
            "registered SLO obligation"
        );
        Ok(row)
    }

    async fn find_by_ticket(&self, ticket: &str) -> Result<Vec<FederateSlo>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|r| r.ticket == ticket).cloned().collect())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut rows = self.rows.write().await;
        match rows.iter().position(|r| r.id == id) {
            Some(index) => {
                rows.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// In-memory local session store: a set of live session keys.
#[derive(Debug, Default)]
pub struct InMemoryLocalSessionStore {
    sessions: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryLocalSessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a session as live.
    pub async fn open(&self, session_key: &str) {
        self.sessions.write().await.insert(session_key.to_string());
    }

    /// Whether the session is still live.
    pub async fn is_live(&self, session_key: &str) -> bool {
        self.sessions.read().await.contains(session_key)
    }
}

#[async_trait]
impl LocalSessionStore for InMemoryLocalSessionStore {
    async fn flush(&self, session_key: &str) -> Result<(), StoreError> {
        self.sessions.write().await.remove(session_key);
        Ok(())
    }
}

/// In-memory local user store.
#[derive(Debug, Default)]
pub struct InMemoryLocalUserStore {
    users: Arc<RwLock<Vec<LocalUser>>>,
}

impl InMemoryLocalUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an authenticated login.
    pub async fn insert(&self, username: &str, session_key: &str) {
        self.users.write().await.push(LocalUser {
            username: username.to_string(),
            session_key: session_key.to_string(),
        });
    }

    /// Number of authenticated logins.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl LocalUserStore for InMemoryLocalUserStore {
    async fn find(
        &self,
        username: &str,
        session_key: &str,
    ) -> Result<Option<LocalUser>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|u| u.username == username && u.session_key == session_key)
            .cloned())
    }

    async fn logout_and_remove(&self, user: &LocalUser) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        users.retain(|u| u != user);
        tracing::debug!(username = %user.username, "local user logged out and removed");
        Ok(())
    }
}
