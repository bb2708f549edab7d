//! Federation data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A remote identity cached after a successful upstream validation.
///
/// Unique on (username, provider); repeated validations for the same pair
/// overwrite `attributes` and `ticket` in place.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FederatedUser {
    pub username: String,
    pub provider: String,
    /// Attribute set released by the provider, always a JSON object. The
    /// bridge stamps `"provider"` into it before storage.
    pub attributes: serde_json::Value,
    /// Ticket that last validated this identity.
    pub ticket: String,
    pub last_update: DateTime<Utc>,
}

impl FederatedUser {
    /// `username@provider`, the form the local server uses for display.
    #[must_use]
    pub fn federated_username(&self) -> String {
        format!("{}@{}", self.username, self.provider)
    }
}

/// A pending single-logout obligation: if `ticket` is ever reported logged
/// out by the provider, the session `session_key` of `username` must be
/// terminated.
///
/// Several rows may share one ticket (multiple tabs or re-logins under the
/// same upstream ticket); `id` gives each obligation its own identity so
/// discharge is exactly-once per row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FederateSlo {
    pub id: Uuid,
    pub username: String,
    pub session_key: String,
    pub ticket: String,
    pub created_at: DateTime<Utc>,
}

impl FederateSlo {
    /// Build a new obligation row.
    #[must_use]
    pub fn new(username: &str, session_key: &str, ticket: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            session_key: session_key.to_string(),
            ticket: ticket.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// An authenticated local login, at the external user store's boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    pub username: String,
    pub session_key: String,
}
