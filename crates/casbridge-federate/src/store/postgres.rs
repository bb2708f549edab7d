//! PostgreSQL store backends.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE federated_users (
//!     username    TEXT NOT NULL,
//!     provider    TEXT NOT NULL,
//!     attributes  JSONB NOT NULL,
//!     ticket      TEXT NOT NULL,
//!     last_update TIMESTAMPTZ NOT NULL,
//!     PRIMARY KEY (username, provider)
//! );
//!
//! CREATE TABLE federate_slo (
//!     id          UUID PRIMARY KEY,
//!     username    TEXT NOT NULL,
//!     session_key TEXT NOT NULL,
//!     ticket      TEXT NOT NULL,
//!     created_at  TIMESTAMPTZ NOT NULL
//! );
//! CREATE INDEX federate_slo_ticket_idx ON federate_slo (ticket);
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{FederatedUserStore, SloRegistry, StoreError};
use crate::models::{FederateSlo, FederatedUser};

/// Postgres-backed federated-identity cache.
pub struct PgFederatedUserStore {
    pool: PgPool,
}

impl PgFederatedUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FederatedUserStore for PgFederatedUserStore {
    async fn upsert(&self, mut user: FederatedUser) -> Result<FederatedUser, StoreError> {
        user.last_update = Utc::now();
        // ON CONFLICT carries the uniqueness invariant: two concurrent
        // validations for one (username, provider) both land on the same
        // row, last writer wins.
        sqlx::query(
            r"
            INSERT INTO federated_users (username, provider, attributes, ticket, last_update)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (username, provider) DO UPDATE
            SET attributes = EXCLUDED.attributes,
                ticket = EXCLUDED.ticket,
                last_update = EXCLUDED.last_update
            ",
        )
        .bind(&user.username)
        .bind(&user.provider)
        .bind(&user.attributes)
        .bind(&user.ticket)
        .bind(user.last_update)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            username = %user.username,
            provider = %user.provider,
            "federated user upserted"
        );
        Ok(user)
    }

    async fn find(
        &self,
        username: &str,
        provider: &str,
    ) -> Result<Option<FederatedUser>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT username, provider, attributes, ticket, last_update
            FROM federated_users
            WHERE username = $1 AND provider = $2
            ",
        )
        .bind(username)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| FederatedUser {
            username: r.get("username"),
            provider: r.get("provider"),
            attributes: r.get("attributes"),
            ticket: r.get("ticket"),
            last_update: r.get("last_update"),
        }))
    }
}

/// Postgres-backed SLO obligation registry.
pub struct PgSloRegistry {
    pool: PgPool,
}

impl PgSloRegistry {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SloRegistry for PgSloRegistry {
    async fn register(
        &self,
        username: &str,
        session_key: &str,
        ticket: &str,
    ) -> Result<FederateSlo, StoreError> {
        let row = FederateSlo::new(username, session_key, ticket);
        sqlx::query(
            r"
            INSERT INTO federate_slo (id, username, session_key, ticket, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(row.id)
        .bind(&row.username)
        .bind(&row.session_key)
        .bind(&row.ticket)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            username = %row.username,
            ticket = %row.ticket,
            "registered SLO obligation"
        );
        Ok(row)
    }

    async fn find_by_ticket(&self, ticket: &str) -> Result<Vec<FederateSlo>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id, username, session_key, ticket, created_at
            FROM federate_slo
            WHERE ticket = $1
            ORDER BY created_at
            ",
        )
        .bind(ticket)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| FederateSlo {
                id: r.get("id"),
                username: r.get("username"),
                session_key: r.get("session_key"),
                ticket: r.get("ticket"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        // rows_affected disambiguates "deleted" from "already gone" so a
        // concurrent resolver that lost the race backs off.
        let result = sqlx::query("DELETE FROM federate_slo WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
