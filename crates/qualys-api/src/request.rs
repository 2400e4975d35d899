// Call requests
//
// A `CallRequest` names an endpoint and carries the caller's parameters.
// It is plain data: validation against the descriptor happens inside the
// dispatcher, so a request can be built once and cloned per page.

use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;

use crate::registry::HttpMethod;

/// Reserved key whose value becomes the raw XML request body.
pub const XML_DATA_KEY: &str = "_xml_data";

/// Ordered parameter map. Order is preserved on the wire.
pub type Params = IndexMap<String, ParamValue>;

/// A parameter value as the caller supplies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<ParamValue>),
    /// Nested JSON for endpoints that take structured bodies.
    Json(Value),
}

impl ParamValue {
    /// Wire rendering without normalization: lists comma-joined, JSON compact.
    pub fn to_query_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::Text(s) => s.clone(),
            Self::List(items) => items
                .iter()
                .map(Self::to_query_string)
                .collect::<Vec<_>>()
                .join(","),
            Self::Json(v) => v.to_string(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to a JSON value for JSON-encoded bodies.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(n) => Value::from(*n),
            Self::Text(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Json(v) => v.clone(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<u32> for ParamValue {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Value> for ParamValue {
    fn from(v: Value) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// One call against one endpoint.
#[derive(Debug, Clone, Default)]
pub struct CallRequest {
    pub module: String,
    pub endpoint: String,
    pub path_params: IndexMap<String, String>,
    pub query_params: Params,
    pub body_fields: Params,
    /// Replaces `body_fields` as the body of JSON-encoded endpoints.
    pub json_body: Option<Value>,
    pub method_override: Option<HttpMethod>,
    pub headers_override: IndexMap<String, String>,
    /// Abort with [`Error::Timeout`](crate::Error::Timeout) rather than
    /// sleep past this instant.
    pub deadline: Option<Instant>,
}

impl CallRequest {
    pub fn new(module: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Value for a `{placeholder}` token in the path template.
    pub fn path(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(key.into(), value.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.body_fields.insert(key.into(), value.into());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json_body = Some(body);
        self
    }

    /// Send `xml` verbatim as a `text/xml` body.
    pub fn xml_body(mut self, xml: impl Into<String>) -> Self {
        self.body_fields
            .insert(XML_DATA_KEY.to_owned(), ParamValue::Text(xml.into()));
        self
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method_override = Some(method);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers_override.insert(name.into(), value.into());
        self
    }

    pub fn deadline(mut self, at: Instant) -> Self {
        self.deadline = Some(at);
        self
    }

    /// Deadline relative to now.
    pub fn timeout(self, after: Duration) -> Self {
        self.deadline(Instant::now() + after)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_maps_in_order() {
        let req = CallRequest::new("vmdr", "get_host_list")
            .param("action", "list")
            .param("truncation_limit", 100_i64)
            .param("show_tags", true)
            .body("ids", vec!["1", "2"]);
        let keys: Vec<_> = req.query_params.keys().cloned().collect();
        assert_eq!(keys, ["action", "truncation_limit", "show_tags"]);
        assert_eq!(req.body_fields["ids"].to_query_string(), "1,2");
    }

    #[test]
    fn option_maps_to_null() {
        assert_eq!(ParamValue::from(None::<String>), ParamValue::Null);
        assert_eq!(ParamValue::from(Some("x")), ParamValue::Text("x".into()));
    }

    #[test]
    fn untagged_deserialization() {
        let parsed: Params =
            serde_json::from_str(r#"{"a":true,"b":null,"c":3,"d":"x","e":[1,"y"],"f":{"k":1}}"#)
                .unwrap();
        assert_eq!(parsed["a"], ParamValue::Bool(true));
        assert_eq!(parsed["b"], ParamValue::Null);
        assert_eq!(parsed["c"], ParamValue::Int(3));
        assert_eq!(
            parsed["e"],
            ParamValue::List(vec![ParamValue::Int(1), ParamValue::Text("y".into())])
        );
        assert_eq!(parsed["f"].to_query_string(), r#"{"k":1}"#);
    }
}
