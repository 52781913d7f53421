//! # Policy Id Extraction
//!
//! Reads the `PolicyId` attribute from the root element of a rendered policy.

use crate::constants::POLICY_ID_ATTRIBUTE;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

/// Return the `PolicyId` of the first element in `xml`, if any
///
/// Only the first start (or self-closing) element is inspected. Malformed
/// input ends the scan and yields `None`; it never fails.
pub fn extract_policy_id(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                return policy_id_attribute(&element);
            }
            Ok(Event::Eof) => return None,
            Ok(_) => continue,
            Err(e) => {
                debug!(
                    position = reader.buffer_position(),
                    error = %e,
                    "Stopped scanning policy XML"
                );
                return None;
            }
        }
    }
}

fn policy_id_attribute(element: &BytesStart<'_>) -> Option<String> {
    element
        .attributes()
        .filter_map(Result::ok)
        .find(|attr| attr.key.local_name().as_ref() == POLICY_ID_ATTRIBUTE.as_bytes())
        .and_then(|attr| attr.unescape_value().ok().map(|value| value.into_owned()))
        .filter(|value| !value.is_empty())
}
