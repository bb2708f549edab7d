//! Backing stores for the federation bridge.
//!
//! Three concerns, each behind a trait so deployments choose the backend:
//! the federated-identity cache and the SLO registry (owned by this crate,
//! in-memory and Postgres backends provided) and the local session/user
//! stores (owned by the embedding server, in-memory forms provided for
//! tests and simple deployments).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{FederateSlo, FederatedUser, LocalUser};

pub use memory::{
    InMemoryFederatedUserStore, InMemoryLocalSessionStore, InMemoryLocalUserStore,
    InMemorySloRegistry,
};
pub use postgres::{PgFederatedUserStore, PgSloRegistry};

/// Store backend errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database-level failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Any other backend failure.
    #[error("storage error: {0}")]
    Backend(String),
}

/// Cache of federated identities, unique on (username, provider).
#[async_trait]
pub trait FederatedUserStore: Send + Sync {
    /// Insert the record, or overwrite `attributes`, `ticket` and
    /// `last_update` in place when the (username, provider) pair already
    /// exists. Atomic with respect to the uniqueness constraint: two
    /// concurrent upserts for one pair never produce two rows.
    async fn upsert(&self, user: FederatedUser) -> Result<FederatedUser, StoreError>;

    /// Fetch the record for a (username, provider) pair.
    async fn find(&self, username: &str, provider: &str)
        -> Result<Option<FederatedUser>, StoreError>;
}

/// Registry of pending single-logout obligations.
#[async_trait]
pub trait SloRegistry: Send + Sync {
    /// Record that `ticket` being logged out must terminate `session_key`
    /// of `username`. Pure insert; duplicates are legal and all fire
    /// together.
    async fn register(
        &self,
        username: &str,
        session_key: &str,
        ticket: &str,
    ) -> Result<FederateSlo, StoreError>;

    /// All obligations registered under `ticket`. The caller deletes each
    /// row as it is processed.
    async fn find_by_ticket(&self, ticket: &str) -> Result<Vec<FederateSlo>, StoreError>;

    /// Delete one obligation row. Returns whether the row still existed;
    /// a concurrent resolver that lost the race sees `false` and must not
    /// act on the row again.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// The local server's session store, at its interface boundary.
#[async_trait]
pub trait LocalSessionStore: Send + Sync {
    /// Invalidate the session in place; subsequent use of `session_key`
    /// behaves as a fresh, unauthenticated session. Unknown keys are a
    /// no-op.
    async fn flush(&self, session_key: &str) -> Result<(), StoreError>;
}

/// The local server's authenticated-login records, at their interface
/// boundary.
#[async_trait]
pub trait LocalUserStore: Send + Sync {
    /// Fetch the login record for (username, session_key).
    async fn find(&self, username: &str, session_key: &str)
        -> Result<Option<LocalUser>, StoreError>;

    /// Log the user out and delete the record, as one unit.
    async fn logout_and_remove(&self, user: &LocalUser) -> Result<(), StoreError>;
}
