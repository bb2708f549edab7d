//! CAS federation bridge.
//!
//! Lets a CAS server act as a *client* to upstream CAS identity providers:
//! a user authenticating locally is redirected to a remote provider, the
//! returned ticket is validated there, the remote identity is cached as a
//! [`models::FederatedUser`], and the validation ticket is enrolled for
//! single-logout fan-in so a provider-initiated logout tears down the
//! matching local sessions.
//!
//! The crate is a library invoked by a web-facing front end; it has no HTTP
//! surface of its own. Collaborators are injected at construction:
//! the provider registry, the upstream client factory, and the four backing
//! stores (federated identities, SLO obligations, local sessions, local
//! users).

pub mod config;
pub mod error;
pub mod models;
pub mod session;
pub mod slo;
pub mod store;

pub use config::{ProviderConfig, ProviderRegistry};
pub use error::{FederateError, FederateResult};
pub use models::{FederateSlo, FederatedUser, LocalUser};
pub use session::{ClientFactory, FederationSession, HttpClientFactory, TicketOutcome};
pub use slo::{SloProcessor, SloReport};
pub use store::{
    FederatedUserStore, LocalSessionStore, LocalUserStore, SloRegistry, StoreError,
};
