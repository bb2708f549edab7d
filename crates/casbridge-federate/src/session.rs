//! Federation session: one user's authentication attempt against one
//! upstream provider.

use std::sync::Arc;

use casbridge_client::{CasClient, TicketValidation};
use chrono::Utc;
use serde_json::{Map, Value};

use crate::config::{ProviderConfig, ProviderRegistry};
use crate::error::FederateResult;
use crate::models::FederatedUser;
use crate::store::FederatedUserStore;

/// Builds the upstream client for a provider, selected once per session.
///
/// The production factory constructs HTTP clients; tests inject stubs
/// through the same seam.
pub trait ClientFactory: Send + Sync {
    fn client(&self, config: &ProviderConfig, service_url: &str) -> Arc<dyn CasClient>;
}

/// Factory building real HTTP clients per protocol version.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpClientFactory;

impl ClientFactory for HttpClientFactory {
    fn client(&self, config: &ProviderConfig, service_url: &str) -> Arc<dyn CasClient> {
        casbridge_client::build_client(config.protocol, &config.server_url, service_url)
    }
}

/// Outcome of a federated ticket validation.
#[derive(Debug, Clone)]
pub enum TicketOutcome {
    /// Upstream validated the ticket; the federated identity was upserted.
    Accepted(FederatedUser),
    /// Upstream rejected the ticket, returned no principal, or the
    /// exchange failed. Nothing was written.
    Rejected,
    /// The provider is not configured; upstream was never called.
    Unavailable,
}

impl TicketOutcome {
    /// Whether the validation produced an authenticated identity.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, TicketOutcome::Accepted(_))
    }
}

/// Orchestrates one federation attempt: redirect URL construction, ticket
/// validation, and the federated-identity upsert.
///
/// An unknown provider yields a *disabled* session: every operation
/// returns its unavailable branch and the upstream is never contacted.
/// A misconfigured deployment degrades instead of crashing the caller.
pub struct FederationSession {
    provider_id: String,
    client: Option<Arc<dyn CasClient>>,
    users: Arc<dyn FederatedUserStore>,
    username: Option<String>,
    attributes: Option<Value>,
}

impl FederationSession {
    /// Resolve `provider_id` against the registry and select the upstream
    /// client for its protocol version.
    pub fn new(
        registry: &ProviderRegistry,
        factory: &dyn ClientFactory,
        users: Arc<dyn FederatedUserStore>,
        provider_id: &str,
        service_url: &str,
    ) -> Self {
        let client = match registry.lookup(provider_id) {
            Some(config) => Some(factory.client(config, service_url)),
            None => {
                tracing::warn!(
                    provider = %provider_id,
                    "federation requested for unconfigured provider, session disabled"
                );
                None
            }
        };

        Self {
            provider_id: provider_id.to_string(),
            client,
            users,
            username: None,
            attributes: None,
        }
    }

    /// Whether the provider resolved at construction.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    #[must_use]
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Provider login redirect URL; `None` when the session is disabled.
    #[must_use]
    pub fn login_url(&self) -> Option<String> {
        self.client.as_ref().map(|c| c.login_url())
    }

    /// Provider logout redirect URL; `None` when the session is disabled.
    #[must_use]
    pub fn logout_url(&self, redirect_url: Option<&str>) -> Option<String> {
        self.client.as_ref().map(|c| c.logout_url(redirect_url))
    }

    /// Principal resolved by the last accepted validation.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Attributes resolved by the last accepted validation, provider stamp
    /// included.
    #[must_use]
    pub fn attributes(&self) -> Option<&Value> {
        self.attributes.as_ref()
    }

    /// Validate `ticket` against the provider and upsert the federated
    /// identity.
    ///
    /// Upstream failure and "no principal" answers are [`TicketOutcome::Rejected`],
    /// not errors; the caller may retry the whole federation attempt. `Err`
    /// is reserved for the identity store failing.
    pub async fn verify_ticket(&mut self, ticket: &str) -> FederateResult<TicketOutcome> {
        let Some(client) = self.client.clone() else {
            return Ok(TicketOutcome::Unavailable);
        };

        let validation = match client.verify_ticket(ticket).await {
            Ok(validation) => validation,
            Err(e) => {
                tracing::warn!(
                    provider = %self.provider_id,
                    error = %e,
                    "upstream ticket validation failed"
                );
                return Ok(TicketOutcome::Rejected);
            }
        };

        let TicketValidation {
            username, attributes, ..
        } = validation;

        let Some(username) = username.filter(|u| !u.is_empty()) else {
            tracing::info!(
                provider = %self.provider_id,
                "upstream validated the ticket but returned no principal"
            );
            return Ok(TicketOutcome::Rejected);
        };

        // Normalize to an object and stamp the provider so merged
        // attribute sets stay attributable downstream.
        let mut attributes = match attributes {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        attributes.insert(
            "provider".to_string(),
            Value::String(self.provider_id.clone()),
        );
        let attributes = Value::Object(attributes);

        let user = self
            .users
            .upsert(FederatedUser {
                username: username.clone(),
                provider: self.provider_id.clone(),
                attributes: attributes.clone(),
                ticket: ticket.to_string(),
                last_update: Utc::now(),
            })
            .await?;

        tracing::info!(
            provider = %self.provider_id,
            username = %username,
            "federated ticket accepted"
        );

        self.username = Some(username);
        self.attributes = Some(attributes);
        Ok(TicketOutcome::Accepted(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryFederatedUserStore;
    use casbridge_client::{
        async_trait, CasClientError, CasClientResult, CasProtocol,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// What the stub upstream answers to `verify_ticket`.
    #[derive(Clone)]
    enum StubAnswer {
        Accept {
            username: &'static str,
            attributes: Option<Value>,
        },
        NoPrincipal,
        TransportFailure,
    }

    struct StubClient {
        answer: StubAnswer,
        verify_calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CasClient for StubClient {
        fn protocol(&self) -> CasProtocol {
            CasProtocol::V3
        }

        fn login_url(&self) -> String {
            "https://cas.example.org/login?service=local".to_string()
        }

        fn logout_url(&self, _redirect_url: Option<&str>) -> String {
            "https://cas.example.org/logout".to_string()
        }

        async fn verify_ticket(&self, _ticket: &str) -> CasClientResult<TicketValidation> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            match &self.answer {
                StubAnswer::Accept {
                    username,
                    attributes,
                } => Ok(TicketValidation {
                    username: Some((*username).to_string()),
                    attributes: attributes.clone(),
                    pgtiou: None,
                }),
                StubAnswer::NoPrincipal => Ok(TicketValidation::default()),
                StubAnswer::TransportFailure => Err(CasClientError::InvalidResponse(
                    "connection reset".to_string(),
                )),
            }
        }

        fn parse_slo(&self, body: &str) -> Vec<String> {
            casbridge_client::parse_session_indexes(body)
        }
    }

    struct StubFactory {
        answer: StubAnswer,
        built: AtomicUsize,
        verify_calls: Arc<AtomicUsize>,
    }

    impl StubFactory {
        fn new(answer: StubAnswer) -> Self {
            Self {
                answer,
                built: AtomicUsize::new(0),
                verify_calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl ClientFactory for StubFactory {
        fn client(&self, _config: &ProviderConfig, _service_url: &str) -> Arc<dyn CasClient> {
            self.built.fetch_add(1, Ordering::SeqCst);
            Arc::new(StubClient {
                answer: self.answer.clone(),
                verify_calls: self.verify_calls.clone(),
            })
        }
    }

    fn registry() -> ProviderRegistry {
        ProviderRegistry::from_providers([ProviderConfig {
            provider_id: "idp1".to_string(),
            server_url: "https://cas.example.org".to_string(),
            protocol: CasProtocol::V3,
        }])
    }

    fn session(
        factory: &StubFactory,
        users: Arc<InMemoryFederatedUserStore>,
        provider_id: &str,
    ) -> FederationSession {
        FederationSession::new(
            &registry(),
            factory,
            users,
            provider_id,
            "https://local.example.org/federate/idp1",
        )
    }

    #[tokio::test]
    async fn test_unknown_provider_disables_session() {
        let factory = StubFactory::new(StubAnswer::NoPrincipal);
        let users = Arc::new(InMemoryFederatedUserStore::new());
        let mut s = session(&factory, users.clone(), "nope");

        assert!(!s.is_enabled());
        assert!(s.login_url().is_none());
        assert!(s.logout_url(Some("https://local/bye")).is_none());
        assert!(matches!(
            s.verify_ticket("ST-1").await.unwrap(),
            TicketOutcome::Unavailable
        ));
        // Upstream never constructed, never called.
        assert_eq!(factory.built.load(Ordering::SeqCst), 0);
        assert_eq!(factory.verify_calls.load(Ordering::SeqCst), 0);
        assert!(users.is_empty().await);
    }

    #[tokio::test]
    async fn test_accepted_ticket_upserts_and_records_identity() {
        let factory = StubFactory::new(StubAnswer::Accept {
            username: "alice",
            attributes: Some(json!({"mail": "alice@example.com"})),
        });
        let users = Arc::new(InMemoryFederatedUserStore::new());
        let mut s = session(&factory, users.clone(), "idp1");

        let outcome = s.verify_ticket("ST-1").await.unwrap();
        assert!(outcome.is_accepted());
        assert_eq!(s.username(), Some("alice"));
        assert_eq!(s.attributes().unwrap()["provider"], json!("idp1"));

        let row = users.find("alice", "idp1").await.unwrap().unwrap();
        assert_eq!(row.ticket, "ST-1");
        assert_eq!(row.attributes["mail"], json!("alice@example.com"));
        assert_eq!(row.attributes["provider"], json!("idp1"));
    }

    #[tokio::test]
    async fn test_attribute_stamp_on_empty_upstream_attributes() {
        let factory = StubFactory::new(StubAnswer::Accept {
            username: "alice",
            attributes: None,
        });
        let users = Arc::new(InMemoryFederatedUserStore::new());
        let mut s = session(&factory, users.clone(), "idp1");

        s.verify_ticket("ST-1").await.unwrap();
        let row = users.find("alice", "idp1").await.unwrap().unwrap();
        assert_eq!(row.attributes, json!({"provider": "idp1"}));
    }

    #[tokio::test]
    async fn test_revalidation_overwrites_in_place() {
        let users = Arc::new(InMemoryFederatedUserStore::new());

        let first = StubFactory::new(StubAnswer::Accept {
            username: "alice",
            attributes: Some(json!({"mail": "old@example.com"})),
        });
        session(&first, users.clone(), "idp1")
            .verify_ticket("ST-1")
            .await
            .unwrap();

        let second = StubFactory::new(StubAnswer::Accept {
            username: "alice",
            attributes: Some(json!({"mail": "new@example.com"})),
        });
        session(&second, users.clone(), "idp1")
            .verify_ticket("ST-2")
            .await
            .unwrap();

        assert_eq!(users.len().await, 1);
        let row = users.find("alice", "idp1").await.unwrap().unwrap();
        assert_eq!(row.ticket, "ST-2");
        assert_eq!(row.attributes["mail"], json!("new@example.com"));
    }

    #[tokio::test]
    async fn test_transport_failure_rejects_without_writing() {
        let factory = StubFactory::new(StubAnswer::TransportFailure);
        let users = Arc::new(InMemoryFederatedUserStore::new());
        let mut s = session(&factory, users.clone(), "idp1");

        assert!(matches!(
            s.verify_ticket("ST-1").await.unwrap(),
            TicketOutcome::Rejected
        ));
        assert!(s.username().is_none());
        assert!(users.is_empty().await);
    }

    #[tokio::test]
    async fn test_no_principal_rejects_without_writing() {
        let factory = StubFactory::new(StubAnswer::NoPrincipal);
        let users = Arc::new(InMemoryFederatedUserStore::new());
        let mut s = session(&factory, users.clone(), "idp1");

        assert!(matches!(
            s.verify_ticket("ST-1").await.unwrap(),
            TicketOutcome::Rejected
        ));
        assert!(users.is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_username_counts_as_no_principal() {
        let factory = StubFactory::new(StubAnswer::Accept {
            username: "",
            attributes: None,
        });
        let users = Arc::new(InMemoryFederatedUserStore::new());
        let mut s = session(&factory, users.clone(), "idp1");

        assert!(matches!(
            s.verify_ticket("ST-1").await.unwrap(),
            TicketOutcome::Rejected
        ));
        assert!(users.is_empty().await);
    }

    /// Identity store that fails every operation.
    struct FailingUserStore;

    #[async_trait]
    impl crate::store::FederatedUserStore for FailingUserStore {
        async fn upsert(
            &self,
            _user: FederatedUser,
        ) -> Result<FederatedUser, crate::store::StoreError> {
            Err(crate::store::StoreError::Backend(
                "connection pool exhausted".to_string(),
            ))
        }

        async fn find(
            &self,
            _username: &str,
            _provider: &str,
        ) -> Result<Option<FederatedUser>, crate::store::StoreError> {
            Err(crate::store::StoreError::Backend(
                "connection pool exhausted".to_string(),
            ))
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_the_only_error_surface() {
        let factory = StubFactory::new(StubAnswer::Accept {
            username: "alice",
            attributes: None,
        });
        let mut s = FederationSession::new(
            &registry(),
            &factory,
            Arc::new(FailingUserStore),
            "idp1",
            "https://local.example.org/federate/idp1",
        );

        let err = s.verify_ticket("ST-1").await.unwrap_err();
        assert!(matches!(err, crate::error::FederateError::Store(_)));
        // The identity is not recorded on the session when the upsert fails.
        assert!(s.username().is_none());
    }

    #[tokio::test]
    async fn test_enabled_session_builds_urls() {
        let factory = StubFactory::new(StubAnswer::NoPrincipal);
        let users = Arc::new(InMemoryFederatedUserStore::new());
        let s = session(&factory, users, "idp1");

        assert!(s.is_enabled());
        assert_eq!(
            s.login_url().unwrap(),
            "https://cas.example.org/login?service=local"
        );
        assert_eq!(s.logout_url(None).unwrap(), "https://cas.example.org/logout");
    }
}
