//! Parse upstream ticket-validation responses.
//!
//! CAS v1 answers in plain text, v2/v3 in `<cas:serviceResponse>` XML, and
//! the SAML 1.0 flavor in a SOAP envelope carrying an assertion. All three
//! decode into the same [`TicketValidation`].

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde_json::{Map, Value};

use crate::error::{CasClientError, CasClientResult};

/// Outcome of a ticket-validation exchange with the provider.
///
/// `username: None` means the provider processed the request but did not
/// authenticate a principal (rejected ticket, failed validation). That is a
/// normal answer, not an error.
#[derive(Debug, Clone, Default)]
pub struct TicketValidation {
    /// Authenticated principal, if any.
    pub username: Option<String>,
    /// Attribute set released by the provider, if any. Always a JSON object
    /// when present.
    pub attributes: Option<Value>,
    /// Proxy-granting ticket IOU, if the provider issued one.
    pub pgtiou: Option<String>,
}

impl TicketValidation {
    fn rejected() -> Self {
        Self::default()
    }
}

/// Parse a CAS v1 `/validate` body: `yes\n<username>\n` or `no\n`.
pub fn parse_v1_response(body: &str) -> CasClientResult<TicketValidation> {
    let mut lines = body.lines();
    match lines.next() {
        Some("yes") => {
            let username = lines
                .next()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from);
            if username.is_none() {
                return Err(CasClientError::InvalidResponse(
                    "v1 response said yes but carried no username".to_string(),
                ));
            }
            Ok(TicketValidation {
                username,
                attributes: None,
                pgtiou: None,
            })
        }
        Some("no") => Ok(TicketValidation::rejected()),
        _ => Err(CasClientError::InvalidResponse(
            "v1 response is neither yes nor no".to_string(),
        )),
    }
}

/// Parse a CAS v2/v3 `<cas:serviceResponse>` body.
pub fn parse_service_response(xml: &str) -> CasClientResult<TicketValidation> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut username = None;
    let mut pgtiou = None;
    let mut attributes = Map::new();
    let mut saw_success = false;
    let mut saw_failure = false;
    let mut in_attributes = false;
    let mut current_element = String::new();

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().into_inner()).to_string();
                match local.as_str() {
                    "authenticationSuccess" => saw_success = true,
                    "authenticationFailure" => saw_failure = true,
                    "attributes" => in_attributes = true,
                    _ => {}
                }
                current_element = local;
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                match current_element.as_str() {
                    "user" if saw_success => username = Some(text),
                    "proxyGrantingTicket" if saw_success => pgtiou = Some(text),
                    _ if in_attributes && !current_element.is_empty() => {
                        insert_attribute(&mut attributes, &current_element, text);
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().into_inner()).to_string();
                if local == "attributes" {
                    in_attributes = false;
                }
                current_element.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CasClientError::InvalidResponse(format!(
                    "serviceResponse XML parse error: {e}"
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_success {
        if saw_failure {
            return Ok(TicketValidation::rejected());
        }
        return Err(CasClientError::InvalidResponse(
            "serviceResponse carried neither success nor failure".to_string(),
        ));
    }

    Ok(TicketValidation {
        username,
        attributes: if attributes.is_empty() {
            None
        } else {
            Some(Value::Object(attributes))
        },
        pgtiou,
    })
}

/// Parse a `samlValidate` SOAP response body (CAS_2_SAML_1_0).
///
/// The principal is the `NameIdentifier` text; attributes come from
/// `Attribute AttributeName="..."` / `AttributeValue` pairs in the
/// assertion's `AttributeStatement`.
pub fn parse_saml_response(xml: &str) -> CasClientResult<TicketValidation> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut username = None;
    let mut attributes = Map::new();
    let mut current_attribute: Option<String> = None;
    let mut in_value = false;
    let mut in_name_identifier = false;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().into_inner()).to_string();
                match local.as_str() {
                    "NameIdentifier" => in_name_identifier = true,
                    "Attribute" => {
                        current_attribute = None;
                        for attr in e.attributes().flatten() {
                            let key = String::from_utf8_lossy(attr.key.local_name().into_inner())
                                .to_string();
                            if key == "AttributeName" {
                                current_attribute =
                                    Some(String::from_utf8_lossy(&attr.value).to_string());
                            }
                        }
                    }
                    "AttributeValue" => in_value = true,
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if in_name_identifier {
                    username = Some(text);
                } else if in_value {
                    if let Some(ref name) = current_attribute {
                        insert_attribute(&mut attributes, name, text);
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().into_inner()).to_string();
                match local.as_str() {
                    "NameIdentifier" => in_name_identifier = false,
                    "AttributeValue" => in_value = false,
                    "Attribute" => current_attribute = None,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CasClientError::InvalidResponse(format!(
                    "samlValidate XML parse error: {e}"
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(TicketValidation {
        username,
        attributes: if attributes.is_empty() {
            None
        } else {
            Some(Value::Object(attributes))
        },
        pgtiou: None,
    })
}

/// Insert an attribute, collecting repeated names into a JSON array.
fn insert_attribute(map: &mut Map<String, Value>, name: &str, value: String) {
    let value = Value::String(value);
    match map.get_mut(name) {
        None => {
            map.insert(name.to_string(), value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}
