// Envelope fields that steer pagination: the `hasMoreRecords` flag, the
// server-side cursor (`lastId` / `lastSeenAssetId`), and next-page links.

use serde_json::Value;

use crate::response::CallResponse;
use crate::xml::{at_path, scalar_text};

const HAS_MORE_KEYS: &[&str] = &["hasMoreRecords", "hasMore"];
const CURSOR_KEYS: &[&str] = &["lastId", "lastSeenAssetId"];

/// Parse the body as JSON or the XML view, whichever it looks like.
fn view(response: &CallResponse) -> Option<Value> {
    let text = response.text();
    let trimmed = text.trim_start();
    if trimmed.starts_with('<') {
        response.xml_view().ok()
    } else if trimmed.starts_with('{') {
        response.json().ok()
    } else {
        None
    }
}

/// The envelope object: `ServiceResponse` when present, else the root.
fn envelope_field<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    root.get("ServiceResponse")
        .and_then(|sr| sr.get(key))
        .or_else(|| root.get(key))
}

fn first_field(root: &Value, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .find_map(|key| envelope_field(root, key))
        .cloned()
}

/// The server's "more records" flag, if the envelope carries one.
pub fn has_more_flag(response: &CallResponse) -> Option<bool> {
    let root = view(response)?;
    match first_field(&root, HAS_MORE_KEYS)? {
        Value::Bool(b) => Some(b),
        Value::Number(n) => Some(n.as_i64() != Some(0)),
        Value::String(s) => {
            let s = s.trim();
            Some(s.eq_ignore_ascii_case("true") || s == "1")
        }
        _ => None,
    }
}

/// The server-supplied cursor for the next page.
pub fn cursor_id(response: &CallResponse) -> Option<String> {
    let root = view(response)?;
    scalar_text(&first_field(&root, CURSOR_KEYS)?)
}

/// The next-page URL: an HTTP `Link: <...>; rel="next"` header, or the
/// vendor's `RESPONSE/WARNING/URL` element under the document root.
pub fn next_page_url(response: &CallResponse) -> Option<String> {
    if let Some(link) = response.header("Link").and_then(link_next) {
        return Some(link);
    }
    let root = view(response)?;
    let document = root.as_object()?.values().next()?;
    at_path(document, "RESPONSE/WARNING/URL").and_then(scalar_text)
}

fn link_next(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| {
            let p = p.trim().replace(' ', "");
            p == "rel=\"next\"" || p == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_owned)
    })
}
