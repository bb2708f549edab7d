//! Parse provider-initiated SAML `LogoutRequest` payloads.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// Extract the `SessionIndex` values from a SAML `LogoutRequest` body.
///
/// CAS providers put the service ticket being logged out in each
/// `samlp:SessionIndex` element. A malformed or unrelated payload yields an
/// empty vec; the push is fire-and-forget so there is nobody to report a
/// parse error to.
pub fn parse_session_indexes(body: &str) -> Vec<String> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut indexes = Vec::new();
    let mut in_session_index = false;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                in_session_index = e.local_name().into_inner() == b"SessionIndex";
            }
            Ok(Event::Text(ref e)) if in_session_index => {
                let text = e.unescape().unwrap_or_default().trim().to_string();
                if !text.is_empty() {
                    indexes.push(text);
                }
            }
            Ok(Event::End(_)) => in_session_index = false,
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!(error = %e, "malformed SLO payload, treating as empty");
                return Vec::new();
            }
            _ => {}
        }
        buf.clear();
    }

    indexes
}
