// XML → JSON view
//
// The classic API speaks XML. Rather than binding every document shape,
// the crate converts bodies into a `serde_json::Value` tree and walks it
// by slash-separated paths. Element names lose their namespace prefix;
// repeated siblings become arrays; attributes are dropped; text mixed
// with child elements lands under `#text`.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

use crate::error::Error;

/// Key holding text that appears alongside child elements.
pub const TEXT_KEY: &str = "#text";

/// Parse an XML document into a JSON tree rooted at `{root_name: ...}`.
pub fn xml_to_json(xml: &str) -> Result<Value, Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root = Map::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                let child = parse_element(&mut reader, xml)?;
                insert_child(&mut root, name, child);
            }
            Ok(Event::Empty(e)) => insert_child(&mut root, local_name(&e), Value::Null),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(parse_error(&e, xml)),
        }
    }
    Ok(Value::Object(root))
}

fn parse_element(reader: &mut Reader<&[u8]>, xml: &str) -> Result<Value, Error> {
    let mut map = Map::new();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                let child = parse_element(reader, xml)?;
                insert_child(&mut map, name, child);
            }
            Ok(Event::Empty(e)) => insert_child(&mut map, local_name(&e), Value::Null),
            Ok(Event::Text(e)) => {
                let chunk = e.unescape().map_err(|err| parse_error(&err, xml))?;
                push_text(&mut text, &chunk);
            }
            Ok(Event::CData(e)) => {
                push_text(&mut text, &String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::End(_) | Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(parse_error(&e, xml)),
        }
    }

    if map.is_empty() {
        return Ok(if text.is_empty() {
            Value::Null
        } else {
            Value::String(text)
        });
    }
    if !text.is_empty() {
        map.insert(TEXT_KEY.to_owned(), Value::String(text));
    }
    Ok(Value::Object(map))
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn push_text(buf: &mut String, chunk: &str) {
    let chunk = chunk.trim();
    if chunk.is_empty() {
        return;
    }
    if !buf.is_empty() {
        buf.push(' ');
    }
    buf.push_str(chunk);
}

// Repeated siblings collapse into an array in document order.
fn insert_child(map: &mut Map<String, Value>, name: String, child: Value) {
    match map.get_mut(&name) {
        Some(Value::Array(items)) => items.push(child),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, child]);
        }
        None => {
            map.insert(name, child);
        }
    }
}

fn parse_error(err: &impl std::fmt::Display, xml: &str) -> Error {
    Error::Deserialization {
        message: format!("XML parse error: {err}"),
        body: xml.to_owned(),
    }
}

/// Default namespace declared on the document's root element, if any.
pub fn root_namespace(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) => {
                return e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.as_ref() == b"xmlns")
                    .map(|a| String::from_utf8_lossy(&a.value).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Walk a slash-separated element path (`"SIMPLE_RETURN/RESPONSE/TEXT"`).
///
/// When a segment lands on an array, the walk continues into its first
/// element. Returns `None` if any segment is missing.
pub fn at_path<'a>(view: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .try_fold(view, |node, segment| {
            let node = match node {
                Value::Array(items) => items.first()?,
                other => other,
            };
            node.get(segment)
        })
}

/// Text content at `path`: strings as-is, numbers and bools rendered,
/// elements with mixed content yield their `#text`.
pub fn text_at(view: &Value, path: &str) -> Option<String> {
    scalar_text(at_path(view, path)?)
}

pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => items.first().and_then(scalar_text),
        Value::Object(map) => map.get(TEXT_KEY).and_then(scalar_text),
        Value::Null => None,
    }
}

/// Treat a node as a list: arrays yield their items, a single element
/// yields itself, an absent or empty node yields nothing.
pub fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}
