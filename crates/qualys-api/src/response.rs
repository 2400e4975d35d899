use std::borrow::Cow;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::decode::preview;
use crate::error::Error;
use crate::rate_limit::RateLimitView;
use crate::registry::MediaType;
use crate::xml;

/// A successful (or recoverable) response, exactly as the server sent it.
///
/// Structured errors never reach this type: the dispatcher has already
/// turned them into [`Error::Api`]. The one exception is the 409
/// "cannot be run again" condition, carried as data in
/// [`transient_conflict`](Self::transient_conflict).
#[derive(Debug, Clone)]
pub struct CallResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Media type declared by the endpoint descriptor.
    pub media: MediaType,
    pub(crate) conflict: Option<String>,
}

impl CallResponse {
    pub(crate) fn new(status: u16, headers: HeaderMap, body: Bytes, media: MediaType) -> Self {
        Self {
            status,
            headers,
            body,
            media,
            conflict: None,
        }
    }

    /// Body as text, lossily decoded.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// `true` when the body is empty or only whitespace.
    pub fn is_empty(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }

    /// Deserialize a JSON body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&self.text())),
            body: self.text().into_owned(),
        })
    }

    /// Parse an XML body into the JSON view (see [`xml::xml_to_json`]).
    pub fn xml_view(&self) -> Result<Value, Error> {
        xml::xml_to_json(&self.text())
    }

    /// The rate-limit headers carried by this response.
    pub fn rate_limit(&self) -> RateLimitView {
        RateLimitView::from_headers(&self.headers)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The vendor message when the server answered 409 "cannot be run again".
    pub fn transient_conflict(&self) -> Option<&str> {
        self.conflict.as_deref()
    }

    /// Raise the 409 conflict as [`Error::TransientConflict`] for callers
    /// that would rather propagate it.
    pub fn into_result(self) -> Result<Self, Error> {
        match self.conflict {
            Some(message) => Err(Error::TransientConflict { message }),
            None => Ok(self),
        }
    }
}
