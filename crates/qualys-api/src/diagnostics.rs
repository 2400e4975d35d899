// User-visible diagnostics and injectable sleeping
//
// Rate-limit sleeps can last an hour, so the dispatcher announces them
// loudly. Everything user-facing goes through a `DiagnosticSink`; internal
// tracing stays on `tracing`. The `Sleeper` seam lets tests observe the
// requested wait without actually waiting.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tracing::{info, warn};

/// A user-facing event raised by the dispatcher or a pagination driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// About to sleep because the rate-limit window is used up.
    RateLimitSleep { endpoint: String, seconds: u64 },
    /// Few calls remain in the current window.
    RateLimitApproaching { endpoint: String, remaining: u32 },
    /// A pagination driver finished a page.
    PageRetrieved {
        endpoint: String,
        page: u32,
        max_pages: Option<u32>,
        records: usize,
        total: usize,
    },
    /// A stale bearer token was re-issued.
    TokenRefreshed { username: String },
}

impl Diagnostic {
    /// Warnings deserve more attention than progress lines.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::RateLimitSleep { .. } | Self::RateLimitApproaching { .. }
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimitSleep { endpoint, seconds } => write!(
                f,
                "Rate limit reached on {endpoint}; sleeping for {seconds} seconds"
            ),
            Self::RateLimitApproaching {
                endpoint,
                remaining,
            } => write!(
                f,
                "Approaching rate limit on {endpoint}: {remaining} calls remaining"
            ),
            Self::PageRetrieved {
                endpoint,
                page,
                max_pages,
                records,
                total,
            } => {
                write!(f, "{endpoint}: page {page}")?;
                if let Some(max) = max_pages {
                    write!(f, " of {max}")?;
                }
                write!(f, " retrieved ({records} records, {total} total)")
            }
            Self::TokenRefreshed { username } => {
                write!(f, "Bearer token refreshed for {username}")
            }
        }
    }
}

/// Destination for [`Diagnostic`]s.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, diagnostic: &Diagnostic);
}

/// Prints one line per diagnostic to standard output. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl DiagnosticSink for StdoutSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        println!("{diagnostic}");
    }
}

/// Forwards diagnostics to `tracing` (warnings at WARN, progress at INFO).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        if diagnostic.is_warning() {
            warn!("{diagnostic}");
        } else {
            info!("{diagnostic}");
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&self, _diagnostic: &Diagnostic) {}
}

/// Keeps diagnostics in memory for later inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything emitted so far, in order.
    pub fn events(&self) -> Vec<Diagnostic> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, diagnostic: &Diagnostic) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(diagnostic.clone());
    }
}

// ── Sleeping ─────────────────────────────────────────────────────────

/// Performs the rate-limit wait.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Real sleeping on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}
