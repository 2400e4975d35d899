// Error body decoding
//
// Failed responses come in several dialects: the classic
// `SIMPLE_RETURN` envelope, the QPS `ServiceResponse` (XML or JSON), an
// HTML or XHTML page from a proxy or load balancer, or something else
// entirely. The decoder sniffs the body rather than trusting the
// endpoint's declared media, because error pages rarely match it.

use serde_json::Value;

use crate::error::ErrorTag;
use crate::registry::MediaType;
use crate::xml::{self, at_path, text_at};

/// Maximum number of characters of an unrecognised body kept in messages.
pub const PREVIEW_CHARS: usize = 500;

const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// A human-readable failure reason and the shape it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedError {
    pub message: String,
    pub tag: ErrorTag,
}

impl DecodedError {
    fn new(message: impl Into<String>, tag: ErrorTag) -> Self {
        Self {
            message: message.into(),
            tag,
        }
    }
}

/// Decode an error body. Never fails; unrecognised bodies come back
/// truncated with [`ErrorTag::Unknown`].
pub fn decode_error(body: &[u8], media: MediaType) -> DecodedError {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim_start();

    let decoded = if trimmed.starts_with('<') {
        decode_xml(trimmed)
    } else if trimmed.starts_with('{') || media == MediaType::Json {
        decode_json(trimmed)
    } else {
        None
    };

    decoded.unwrap_or_else(|| DecodedError::new(preview(&text), ErrorTag::Unknown))
}

fn decode_xml(body: &str) -> Option<DecodedError> {
    let view = xml::xml_to_json(body).ok()?;

    if let Some(text) = text_at(&view, "SIMPLE_RETURN/RESPONSE/TEXT") {
        return Some(DecodedError::new(text, ErrorTag::VendorSimple));
    }

    if let Some(response) = at_path(&view, "ServiceResponse") {
        return service_response(response);
    }

    let html = view.get("html").or_else(|| view.get("HTML"))?;

    if xml::root_namespace(body).as_deref() == Some(XHTML_NS) {
        // Load-balancer pages: the only stable element is the first heading.
        let heading = first_heading(html)?;
        return Some(DecodedError::new(heading, ErrorTag::Xhtml));
    }

    let heading = text_at(html, "body/h1")?;
    let detail = text_at(html, "body/p");
    let message = match detail {
        Some(p) => format!("{heading}: {p}"),
        None => heading,
    };
    Some(DecodedError::new(message, ErrorTag::Html))
}

// Depth-first search for the first `h1`, wherever the page nests it.
fn first_heading(node: &Value) -> Option<String> {
    match node {
        Value::Object(map) => {
            if let Some(h1) = map.get("h1") {
                return xml::scalar_text(h1);
            }
            map.values().find_map(first_heading)
        }
        Value::Array(items) => items.iter().find_map(first_heading),
        _ => None,
    }
}

fn decode_json(body: &str) -> Option<DecodedError> {
    let value: Value = serde_json::from_str(body).ok()?;
    let envelope = value.get("ServiceResponse").unwrap_or(&value);
    service_response(envelope)
}

// `responseCode` + `responseErrorDetails/{errorMessage,errorResolution}`,
// shared by the XML view and native JSON.
fn service_response(envelope: &Value) -> Option<DecodedError> {
    let code = xml::scalar_text(envelope.get("responseCode")?)?;
    if code == "SUCCESS" {
        return None;
    }

    let details = envelope.get("responseErrorDetails").unwrap_or(envelope);
    let field = |name: &str| {
        details
            .get(name)
            .or_else(|| envelope.get(name))
            .and_then(xml::scalar_text)
    };

    let message = match (field("errorMessage"), field("errorResolution")) {
        (Some(msg), Some(resolution)) => format!("{msg} {resolution}"),
        (Some(msg), None) => msg,
        (None, Some(resolution)) => format!("{code}: {resolution}"),
        (None, None) => code,
    };
    Some(DecodedError::new(message, ErrorTag::ServiceResponse))
}

/// The first [`PREVIEW_CHARS`] characters of `body`, on a char boundary.
pub fn preview(body: &str) -> String {
    match body.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_owned(),
    }
}

/// The envelope text when `body` says a request "cannot be run again"
/// yet -- the recoverable 409 case.
pub(crate) fn conflict_text(body: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(body);
    let view = xml::xml_to_json(text.trim_start()).ok()?;
    let message = text_at(&view, "SIMPLE_RETURN/RESPONSE/TEXT")?;
    message
        .to_ascii_lowercase()
        .contains("cannot be run again")
        .then_some(message)
}
