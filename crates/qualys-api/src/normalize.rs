// Parameter normalization
//
// The classic backend parses form values as text and has quirks: booleans
// must be `1`/`0`, an absent value is the literal string `None`, and
// `host_metadata` is matched case-sensitively in lower case. The
// normalizer rewrites a parameter map into that wire form. It is
// idempotent, so drivers may re-normalize a request between pages.

use crate::request::{ParamValue, Params, XML_DATA_KEY};

/// The literal the backend expects for an absent value.
pub const NONE_LITERAL: &str = "None";

const HOST_METADATA: &str = "host_metadata";

/// Rewrite every value into its wire text.
pub fn normalize(params: &Params) -> Params {
    params
        .iter()
        .map(|(key, value)| (key.clone(), normalize_value(key, value)))
        .collect()
}

fn normalize_value(key: &str, value: &ParamValue) -> ParamValue {
    match value {
        ParamValue::Text(s) if key == HOST_METADATA && s != "all" => {
            ParamValue::Text(s.to_lowercase())
        }
        ParamValue::Json(_) | ParamValue::Text(_) => value.clone(),
        scalar_or_list => ParamValue::Text(wire_text(scalar_or_list)),
    }
}

fn wire_text(value: &ParamValue) -> String {
    match value {
        ParamValue::Null => NONE_LITERAL.to_owned(),
        ParamValue::Bool(true) => "1".to_owned(),
        ParamValue::Bool(false) => "0".to_owned(),
        ParamValue::List(items) => items.iter().map(wire_text).collect::<Vec<_>>().join(","),
        other => other.to_query_string(),
    }
}

/// Remove the reserved XML payload key, returning the raw document.
pub fn take_xml_body(params: &mut Params) -> Option<String> {
    params.shift_remove(XML_DATA_KEY).map(|v| match v {
        ParamValue::Text(s) => s,
        other => other.to_query_string(),
    })
}
