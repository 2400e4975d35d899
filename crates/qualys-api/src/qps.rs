// QPS ServiceRequest bodies
//
// QPS search and count endpoints take an XML document describing
// filters and result limits. The hasMore pagination driver rebuilds it
// per page with an extra `id GREATER <lastId>` criterion.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// One `<Criteria field=".." operator="..">value</Criteria>` filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    pub field: String,
    pub operator: String,
    pub value: String,
}

impl Criterion {
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, "EQUALS", value)
    }

    /// The cursor criterion appended by the hasMore driver.
    pub fn id_greater(last_id: impl Into<String>) -> Self {
        Self::new("id", "GREATER", last_id)
    }
}

/// Render a `ServiceRequest` with the given filters and optional
/// `limitResults`. With neither, the body is a bare `<ServiceRequest/>`.
pub fn service_request_xml(criteria: &[Criterion], limit: Option<u32>) -> String {
    if criteria.is_empty() && limit.is_none() {
        return "<ServiceRequest/>".to_owned();
    }

    let mut xml = String::from("<ServiceRequest>");
    if let Some(limit) = limit {
        let _ = write!(
            xml,
            "<preferences><limitResults>{limit}</limitResults></preferences>"
        );
    }
    if !criteria.is_empty() {
        xml.push_str("<filters>");
        for c in criteria {
            let _ = write!(
                xml,
                r#"<Criteria field="{}" operator="{}">{}</Criteria>"#,
                escape(&c.field),
                escape(&c.operator),
                escape(&c.value)
            );
        }
        xml.push_str("</filters>");
    }
    xml.push_str("</ServiceRequest>");
    xml
}

fn escape(raw: &str) -> String {
    quick_xml::escape::escape(raw).into_owned()
}
