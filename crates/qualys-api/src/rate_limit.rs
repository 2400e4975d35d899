// Rate-limit header parsing
//
// Every classic API response advertises the caller's remaining budget.
// The gateway services and patch management omit the headers entirely,
// so every field is optional and an empty view is normal.

use reqwest::header::HeaderMap;
use serde::Serialize;
use tracing::trace;

pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
pub const HEADER_CONCURRENCY: &str = "X-Concurrency-Limit-Limit";
pub const HEADER_TO_WAIT: &str = "X-RateLimit-ToWait-Sec";

/// Budget advertised by a single response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RateLimitView {
    pub remaining: Option<u32>,
    pub limit: Option<u32>,
    pub concurrency_limit: Option<u32>,
    /// `X-RateLimit-ToWait-Sec`: seconds until the window reopens.
    pub retry_after_seconds: Option<u64>,
}

impl RateLimitView {
    /// Parse the four rate-limit headers. Unparseable values are ignored.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let view = Self {
            remaining: header_number(headers, HEADER_REMAINING),
            limit: header_number(headers, HEADER_LIMIT),
            concurrency_limit: header_number(headers, HEADER_CONCURRENCY),
            retry_after_seconds: header_number(headers, HEADER_TO_WAIT),
        };
        trace!(?view, "parsed rate-limit headers");
        view
    }

    /// `true` when no rate-limit header was present.
    pub fn is_empty(&self) -> bool {
        self.remaining.is_none()
            && self.limit.is_none()
            && self.concurrency_limit.is_none()
            && self.retry_after_seconds.is_none()
    }

    /// The window is used up: the next call would be refused.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
