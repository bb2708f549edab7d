//! HTTP clients for each CAS protocol version.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use uuid::Uuid;

use crate::error::CasClientResult;
use crate::slo::parse_session_indexes;
use crate::validation::{
    parse_saml_response, parse_service_response, parse_v1_response, TicketValidation,
};
use crate::{CasClient, CasProtocol};

/// Endpoint configuration shared by every protocol version.
#[derive(Clone)]
struct CasEndpoint {
    server_url: String,
    service_url: String,
    renew: bool,
    http: Client,
}

impl CasEndpoint {
    fn new(server_url: &str, service_url: &str, renew: bool) -> Self {
        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            service_url: service_url.to_string(),
            renew,
            // Client construction only fails when the TLS backend cannot
            // initialize, which no request would survive either; clients are
            // built once at session construction, so fail loudly there.
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("failed to build HTTP client"),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.server_url)
    }

    fn login_url(&self) -> String {
        let mut url = format!(
            "{}?service={}",
            self.url("login"),
            urlencoding::encode(&self.service_url)
        );
        if self.renew {
            url.push_str("&renew=true");
        }
        url
    }

    fn logout_url(&self, redirect_url: Option<&str>) -> String {
        match redirect_url {
            Some(redirect) => format!(
                "{}?service={}",
                self.url("logout"),
                urlencoding::encode(redirect)
            ),
            None => self.url("logout"),
        }
    }

    fn validate_url(&self, path: &str, ticket: &str) -> String {
        let mut url = format!(
            "{}?ticket={}&service={}",
            self.url(path),
            urlencoding::encode(ticket),
            urlencoding::encode(&self.service_url)
        );
        if self.renew {
            url.push_str("&renew=true");
        }
        url
    }

    async fn fetch_validation(&self, path: &str, ticket: &str) -> CasClientResult<String> {
        let response = self
            .http
            .get(self.validate_url(path, ticket))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

/// CAS protocol v1 client: plaintext `/validate`, no attributes, no SLO.
pub struct CasClientV1 {
    endpoint: CasEndpoint,
}

/// CAS protocol v2 client: XML `/serviceValidate`.
pub struct CasClientV2 {
    endpoint: CasEndpoint,
}

/// CAS protocol v3 client: XML `/p3/serviceValidate` with attribute release.
pub struct CasClientV3 {
    endpoint: CasEndpoint,
}

/// CAS_2_SAML_1_0 client: SAML 1.0 `samlValidate` exchange.
pub struct CasClientSaml {
    endpoint: CasEndpoint,
}

macro_rules! endpoint_constructors {
    ($name:ident) => {
        impl $name {
            /// Build a client for `server_url`, validating tickets issued for
            /// `service_url`.
            #[must_use]
            pub fn new(server_url: &str, service_url: &str) -> Self {
                Self {
                    endpoint: CasEndpoint::new(server_url, service_url, false),
                }
            }

            /// Request fresh authentication from the provider (`renew=true`).
            #[must_use]
            pub fn with_renew(mut self) -> Self {
                self.endpoint.renew = true;
                self
            }
        }
    };
}

endpoint_constructors!(CasClientV1);
endpoint_constructors!(CasClientV2);
endpoint_constructors!(CasClientV3);
endpoint_constructors!(CasClientSaml);

#[async_trait]
impl CasClient for CasClientV1 {
    fn protocol(&self) -> CasProtocol {
        CasProtocol::V1
    }

    fn login_url(&self) -> String {
        self.endpoint.login_url()
    }

    fn logout_url(&self, redirect_url: Option<&str>) -> String {
        self.endpoint.logout_url(redirect_url)
    }

    async fn verify_ticket(&self, ticket: &str) -> CasClientResult<TicketValidation> {
        let body = self.endpoint.fetch_validation("validate", ticket).await?;
        parse_v1_response(&body)
    }

    // v1 has no SLO payload format.
    fn parse_slo(&self, _body: &str) -> Vec<String> {
        Vec::new()
    }
}

#[async_trait]
impl CasClient for CasClientV2 {
    fn protocol(&self) -> CasProtocol {
        CasProtocol::V2
    }

    fn login_url(&self) -> String {
        self.endpoint.login_url()
    }

    fn logout_url(&self, redirect_url: Option<&str>) -> String {
        self.endpoint.logout_url(redirect_url)
    }

    async fn verify_ticket(&self, ticket: &str) -> CasClientResult<TicketValidation> {
        let body = self
            .endpoint
            .fetch_validation("serviceValidate", ticket)
            .await?;
        parse_service_response(&body)
    }

    fn parse_slo(&self, body: &str) -> Vec<String> {
        parse_session_indexes(body)
    }
}

#[async_trait]
impl CasClient for CasClientV3 {
    fn protocol(&self) -> CasProtocol {
        CasProtocol::V3
    }

    fn login_url(&self) -> String {
        self.endpoint.login_url()
    }

    fn logout_url(&self, redirect_url: Option<&str>) -> String {
        self.endpoint.logout_url(redirect_url)
    }

    async fn verify_ticket(&self, ticket: &str) -> CasClientResult<TicketValidation> {
        let body = self
            .endpoint
            .fetch_validation("p3/serviceValidate", ticket)
            .await?;
        parse_service_response(&body)
    }

    fn parse_slo(&self, body: &str) -> Vec<String> {
        parse_session_indexes(body)
    }
}

#[async_trait]
impl CasClient for CasClientSaml {
    fn protocol(&self) -> CasProtocol {
        CasProtocol::Cas2Saml10
    }

    fn login_url(&self) -> String {
        self.endpoint.login_url()
    }

    fn logout_url(&self, redirect_url: Option<&str>) -> String {
        self.endpoint.logout_url(redirect_url)
    }

    async fn verify_ticket(&self, ticket: &str) -> CasClientResult<TicketValidation> {
        let url = format!(
            "{}?TARGET={}",
            self.endpoint.url("samlValidate"),
            urlencoding::encode(&self.endpoint.service_url)
        );
        let response = self
            .endpoint
            .http
            .post(url)
            .header("Content-Type", "text/xml; charset=utf-8")
            .body(saml_validate_request(ticket))
            .send()
            .await?
            .error_for_status()?;
        parse_saml_response(&response.text().await?)
    }

    fn parse_slo(&self, body: &str) -> Vec<String> {
        parse_session_indexes(body)
    }
}

/// Build the SOAP envelope for a `samlValidate` request.
fn saml_validate_request(ticket: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
  <SOAP-ENV:Header/>
  <SOAP-ENV:Body>
    <samlp:Request xmlns:samlp="urn:oasis:names:tc:SAML:1.0:protocol"
        MajorVersion="1" MinorVersion="1"
        RequestID="_{}" IssueInstant="{}">
      <samlp:AssertionArtifact>{}</samlp:AssertionArtifact>
    </samlp:Request>
  </SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#,
        Uuid::new_v4().simple(),
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        ticket
    )
}

/// Build the client for a protocol version, selected once at session
/// construction.
pub fn build_client(
    protocol: CasProtocol,
    server_url: &str,
    service_url: &str,
) -> Arc<dyn CasClient> {
    match protocol {
        CasProtocol::V1 => Arc::new(CasClientV1::new(server_url, service_url)),
        CasProtocol::V2 => Arc::new(CasClientV2::new(server_url, service_url)),
        CasProtocol::V3 => Arc::new(CasClientV3::new(server_url, service_url)),
        CasProtocol::Cas2Saml10 => Arc::new(CasClientSaml::new(server_url, service_url)),
    }
}
