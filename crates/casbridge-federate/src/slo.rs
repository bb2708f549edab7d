//! Single-logout fan-in: translate a provider's logout push into local
//! session termination.

use std::sync::Arc;

use serde::Serialize;

use crate::config::ProviderRegistry;
use crate::session::ClientFactory;
use crate::store::{LocalSessionStore, LocalUserStore, SloRegistry};

/// Counters from one logout push.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SloReport {
    /// Ticket identifiers parsed from the payload.
    pub tickets: usize,
    /// Local sessions flushed.
    pub sessions_flushed: usize,
    /// Local user records logged out and removed.
    pub users_removed: usize,
    /// SLO obligation rows discharged.
    pub rows_discharged: usize,
}

/// Consumes provider logout pushes and terminates the matching local
/// sessions.
///
/// The push is fire-and-forget: the provider cannot act on an error, so
/// every degraded state (unknown provider, unparseable payload, missing
/// rows, store faults) is logged and skipped, never raised.
pub struct SloProcessor {
    registry: ProviderRegistry,
    factory: Arc<dyn ClientFactory>,
    /// Local service URL the upstream clients are parameterized with.
    service_url: String,
    slo: Arc<dyn SloRegistry>,
    sessions: Arc<dyn LocalSessionStore>,
    users: Arc<dyn LocalUserStore>,
}

impl SloProcessor {
    pub fn new(
        registry: ProviderRegistry,
        factory: Arc<dyn ClientFactory>,
        service_url: impl Into<String>,
        slo: Arc<dyn SloRegistry>,
        sessions: Arc<dyn LocalSessionStore>,
        users: Arc<dyn LocalUserStore>,
    ) -> Self {
        Self {
            registry,
            factory,
            service_url: service_url.into(),
            slo,
            sessions,
            users,
        }
    }

    /// Process one logout push from `provider_id` carrying `body`.
    ///
    /// Each obligation row is discharged as it is processed, so an
    /// interruption mid-batch leaves only the unprocessed tail outstanding.
    pub async fn process(&self, provider_id: &str, body: &str) -> SloReport {
        let mut report = SloReport::default();

        let Some(config) = self.registry.lookup(provider_id) else {
            // Fail open: a push for an unconfigured provider is dropped,
            // surfacing it cannot help the remote caller.
            tracing::debug!(
                provider = %provider_id,
                "SLO push for unconfigured provider dropped"
            );
            return report;
        };

        let client = self.factory.client(config, &self.service_url);
        let tickets = client.parse_slo(body);
        report.tickets = tickets.len();

        if tickets.is_empty() {
            tracing::debug!(provider = %provider_id, "SLO payload carried no tickets");
            return report;
        }

        for ticket in &tickets {
            let rows = match self.slo.find_by_ticket(ticket).await {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::warn!(
                        provider = %provider_id,
                        ticket = %ticket,
                        error = %e,
                        "SLO registry lookup failed, skipping ticket"
                    );
                    continue;
                }
            };

            for row in rows {
                if let Err(e) = self.sessions.flush(&row.session_key).await {
                    tracing::warn!(
                        provider = %provider_id,
                        session_key = %row.session_key,
                        error = %e,
                        "session flush failed, leaving obligation outstanding"
                    );
                    continue;
                }
                report.sessions_flushed += 1;

                match self.users.find(&row.username, &row.session_key).await {
                    Ok(Some(user)) => match self.users.logout_and_remove(&user).await {
                        Ok(()) => report.users_removed += 1,
                        Err(e) => {
                            tracing::warn!(
                                username = %row.username,
                                error = %e,
                                "local user removal failed"
                            );
                        }
                    },
                    // Already logged out through another path; not an error.
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(
                            username = %row.username,
                            error = %e,
                            "local user lookup failed"
                        );
                    }
                }

                match self.slo.delete(row.id).await {
                    Ok(true) => report.rows_discharged += 1,
                    // A concurrent resolver got there first.
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(
                            ticket = %ticket,
                            error = %e,
                            "SLO obligation delete failed"
                        );
                    }
                }
            }
        }

        tracing::info!(
            provider = %provider_id,
            tickets = report.tickets,
            sessions_flushed = report.sessions_flushed,
            users_removed = report.users_removed,
            rows_discharged = report.rows_discharged,
            "SLO push processed"
        );
        report
    }
}
