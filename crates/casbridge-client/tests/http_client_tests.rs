//! HTTP client tests against a mock CAS provider.

use casbridge_client::{CasClient, CasClientError, CasClientSaml, CasClientV1, CasClientV2};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SERVICE_URL: &str = "https://local.example.org/federate/provider1";

#[tokio::test]
async fn v2_verify_ticket_success() {
    let server = MockServer::start().await;
    let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
        <cas:authenticationSuccess>
            <cas:user>alice</cas:user>
            <cas:attributes><cas:mail>alice@example.com</cas:mail></cas:attributes>
        </cas:authenticationSuccess>
    </cas:serviceResponse>"#;

    Mock::given(method("GET"))
        .and(path("/serviceValidate"))
        .and(query_param("ticket", "ST-1"))
        .and(query_param("service", SERVICE_URL))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let client = CasClientV2::new(&server.uri(), SERVICE_URL);
    let validation = client.verify_ticket("ST-1").await.unwrap();
    assert_eq!(validation.username.as_deref(), Some("alice"));
    assert_eq!(
        validation.attributes.unwrap()["mail"],
        serde_json::json!("alice@example.com")
    );
}

#[tokio::test]
async fn v2_verify_ticket_authentication_failure() {
    let server = MockServer::start().await;
    let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
        <cas:authenticationFailure code="INVALID_TICKET">unknown ticket</cas:authenticationFailure>
    </cas:serviceResponse>"#;

    Mock::given(method("GET"))
        .and(path("/serviceValidate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let client = CasClientV2::new(&server.uri(), SERVICE_URL);
    let validation = client.verify_ticket("ST-bogus").await.unwrap();
    assert!(validation.username.is_none());
}

#[tokio::test]
async fn v2_verify_ticket_server_error_is_transport() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/serviceValidate"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = CasClientV2::new(&server.uri(), SERVICE_URL);
    let err = client.verify_ticket("ST-1").await.unwrap_err();
    assert!(matches!(err, CasClientError::Transport(_)));
}

#[tokio::test]
async fn v1_verify_ticket_plaintext() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("yes\nbob\n"))
        .mount(&server)
        .await;

    let client = CasClientV1::new(&server.uri(), SERVICE_URL);
    let validation = client.verify_ticket("ST-2").await.unwrap();
    assert_eq!(validation.username.as_deref(), Some("bob"));
    assert!(validation.attributes.is_none());
}

#[tokio::test]
async fn saml_verify_ticket_posts_envelope() {
    let server = MockServer::start().await;
    let body = r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
      <SOAP-ENV:Body>
        <Response xmlns="urn:oasis:names:tc:SAML:1.0:protocol">
          <Assertion xmlns="urn:oasis:names:tc:SAML:1.0:assertion">
            <AttributeStatement>
              <Subject><NameIdentifier>carol</NameIdentifier></Subject>
              <Attribute AttributeName="role" AttributeNamespace="http://www.ja-sig.org/products/cas/">
                <AttributeValue>auditor</AttributeValue>
              </Attribute>
            </AttributeStatement>
          </Assertion>
        </Response>
      </SOAP-ENV:Body>
    </SOAP-ENV:Envelope>"#;

    Mock::given(method("POST"))
        .and(path("/samlValidate"))
        .and(query_param("TARGET", SERVICE_URL))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let client = CasClientSaml::new(&server.uri(), SERVICE_URL);
    let validation = client.verify_ticket("ST-3").await.unwrap();
    assert_eq!(validation.username.as_deref(), Some("carol"));
    assert_eq!(
        validation.attributes.unwrap()["role"],
        serde_json::json!("auditor")
    );
}

#[tokio::test]
async fn unreachable_provider_is_transport_error() {
    // Port 9 (discard) refuses connections on the loopback.
    let client = CasClientV2::new("http://127.0.0.1:9", SERVICE_URL);
    let err = client.verify_ticket("ST-1").await.unwrap_err();
    assert!(matches!(err, CasClientError::Transport(_)));
}
