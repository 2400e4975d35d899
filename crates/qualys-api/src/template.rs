// Path template expansion
//
// Templates carry `{name}` tokens drawn from a closed set. Each token is
// filled from the path parameters first, then the query parameters, then
// the body fields. The token is removed from all three maps so no copy is
// sent on the wire.

use indexmap::IndexMap;

use crate::error::Error;
use crate::request::Params;

/// The closed set of placeholder names a template may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum Placeholder {
    Placeholder,
    Cloudprovider,
    Connectorid,
    Controlid,
    WebappId,
    FindingId,
    ScanId,
    TagId,
    Resourceid,
    WebappAuthRecordId,
}

/// Tokens appearing in `template`, in order, without braces.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            break;
        };
        tokens.push(&after[..close]);
        rest = &after[close + 1..];
    }
    tokens
}

/// Substitute every token in `template`, consuming the values used.
pub fn expand(
    template: &str,
    path_params: &mut IndexMap<String, String>,
    query_params: &mut Params,
    body_fields: &mut Params,
) -> Result<String, Error> {
    let mut path = template.to_owned();
    for token in placeholders(template) {
        token
            .parse::<Placeholder>()
            .map_err(|_| Error::UnknownPlaceholder {
                token: token.to_owned(),
            })?;

        let pattern = format!("{{{token}}}");
        if !path.contains(&pattern) {
            // Repeated token, already substituted.
            continue;
        }

        // Every copy is consumed; the first source in precedence order wins.
        let from_path = path_params.shift_remove(token);
        let from_query = query_params.shift_remove(token).map(|v| v.to_query_string());
        let from_body = body_fields.shift_remove(token).map(|v| v.to_query_string());
        let value = from_path
            .or(from_query)
            .or(from_body)
            .ok_or_else(|| Error::MissingPathParam {
                token: token.to_owned(),
            })?;

        path = path.replace(&pattern, &value);
    }
    Ok(path)
}
