//! Upstream provider configuration.

use std::collections::HashMap;
use std::sync::Arc;

use casbridge_client::CasProtocol;
use serde::{Deserialize, Serialize};

/// Configuration of one upstream CAS provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Identifier the local server uses for this provider (URL segment,
    /// attribute stamp, FederatedUser.provider value).
    pub provider_id: String,
    /// Base URL of the provider's CAS endpoint.
    pub server_url: String,
    /// Protocol version the provider speaks.
    pub protocol: CasProtocol,
}

/// Immutable map of provider_id to [`ProviderConfig`], loaded once at
/// process start.
///
/// Cloning is cheap; every federation component holds its own handle
/// instead of reaching for process-global settings.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: Arc<HashMap<String, ProviderConfig>>,
}

impl ProviderRegistry {
    /// Build a registry from configured providers. A repeated provider_id
    /// keeps the first entry and logs the duplicate.
    pub fn from_providers(providers: impl IntoIterator<Item = ProviderConfig>) -> Self {
        let mut map = HashMap::new();
        for provider in providers {
            if map.contains_key(&provider.provider_id) {
                tracing::warn!(
                    provider = %provider.provider_id,
                    "duplicate provider configuration ignored"
                );
                continue;
            }
            map.insert(provider.provider_id.clone(), provider);
        }
        Self {
            providers: Arc::new(map),
        }
    }

    /// Look up a provider. `None` means federation is unavailable for this
    /// provider; callers degrade rather than fail.
    #[must_use]
    pub fn lookup(&self, provider_id: &str) -> Option<&ProviderConfig> {
        self.providers.get(provider_id)
    }

    /// Configured provider ids, for diagnostics and login page rendering.
    pub fn provider_ids(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
