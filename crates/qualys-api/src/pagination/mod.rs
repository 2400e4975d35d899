// Pagination drivers
//
// Each driver repeatedly dispatches a base request, advancing its own
// cursor, and appends materialized records to one ordered sequence.
// Drivers share the stopping rules in `PageLoop`: a caller page cap, a
// cancellation token checked between pages, and a guard against servers
// that hand back a cursor already used.

mod envelope;
mod has_more;
mod last_id;
mod next_link;
mod offset;

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::credential::Credential;
use crate::diagnostics::Diagnostic;
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::materialize::Materializer;
use crate::qps::Criterion;
use crate::registry::{PaginationStyle, describe};
use crate::request::CallRequest;

pub use envelope::{cursor_id, has_more_flag, next_page_url};
pub use has_more::has_more_pages;
pub use last_id::{LastIdKeys, last_id_pages};
pub use next_link::next_link_pages;
pub use offset::{OffsetKeys, offset_pages};

/// Records in server order. Duplicates are kept.
pub type BaseSequence<R> = Vec<R>;

/// Caller controls shared by every driver.
#[derive(Debug, Clone, Default)]
pub struct PageOptions {
    /// Stop after this many pages.
    pub max_pages: Option<u32>,
    /// Page size sent to the server, where the endpoint has a size parameter.
    pub page_size: Option<u32>,
    /// Checked before each page; a cancelled token returns what was
    /// gathered so far.
    pub cancel: Option<CancellationToken>,
    /// Base filters for QPS search bodies.
    pub criteria: Vec<Criterion>,
}

impl PageOptions {
    pub fn max_pages(mut self, max: u32) -> Self {
        self.max_pages = Some(max);
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn criterion(mut self, criterion: Criterion) -> Self {
        self.criteria.push(criterion);
        self
    }
}

/// Paginate with the driver the endpoint's descriptor names.
///
/// Endpoints without a pagination style get a single dispatch.
pub async fn paginate<M: Materializer>(
    dispatcher: &Dispatcher,
    credential: &Credential,
    request: CallRequest,
    options: &PageOptions,
    materializer: &M,
) -> Result<BaseSequence<M::Record>, Error> {
    let desc = describe(&request.module, &request.endpoint)?;
    debug!(endpoint = %desc.qualified_name(), style = %desc.pagination, "paginating");

    match desc.pagination {
        PaginationStyle::None => {
            let mut progress = PageLoop::new(desc.qualified_name(), options);
            if !progress.should_fetch() {
                return Ok(Vec::new());
            }
            let response = dispatcher.dispatch(credential, request).await?;
            let records = materializer.materialize(&response)?;
            progress.page_done(dispatcher, records.len());
            Ok(records)
        }
        PaginationStyle::Offset {
            page_param,
            size_param,
            first_page,
            placement,
        } => {
            let keys = OffsetKeys {
                page_param,
                size_param,
                first_page,
                placement,
                stop_on_empty_body: false,
            };
            offset_pages(dispatcher, credential, request, keys, options, materializer).await
        }
        PaginationStyle::EmptyBody {
            page_param,
            size_param,
            first_page,
            placement,
        } => {
            let keys = OffsetKeys {
                page_param,
                size_param,
                first_page,
                placement,
                stop_on_empty_body: true,
            };
            offset_pages(dispatcher, credential, request, keys, options, materializer).await
        }
        PaginationStyle::LastId {
            cursor_param,
            size_param,
            default_size,
        } => {
            let keys = LastIdKeys {
                cursor_param,
                size_param,
                default_size,
            };
            last_id_pages(dispatcher, credential, request, keys, options, materializer).await
        }
        PaginationStyle::HasMore => {
            has_more_pages(dispatcher, credential, request, options, materializer).await
        }
        PaginationStyle::NextLink => {
            next_link_pages(dispatcher, credential, request, options, materializer).await
        }
    }
}

// ── Shared loop state ────────────────────────────────────────────────

/// Page counting, progress diagnostics, and the stop rules common to
/// every driver.
pub(crate) struct PageLoop {
    endpoint: String,
    page: u32,
    total: usize,
    max_pages: Option<u32>,
    cancel: Option<CancellationToken>,
    seen_cursors: HashSet<String>,
}

impl PageLoop {
    pub(crate) fn new(endpoint: String, options: &PageOptions) -> Self {
        Self {
            endpoint,
            page: 0,
            total: 0,
            max_pages: options.max_pages,
            cancel: options.cancel.clone(),
            seen_cursors: HashSet::new(),
        }
    }

    /// `false` once the page cap is reached or the caller cancelled.
    pub(crate) fn should_fetch(&self) -> bool {
        if let Some(cancel) = &self.cancel {
            if cancel.is_cancelled() {
                debug!(endpoint = %self.endpoint, pages = self.page, "pagination cancelled");
                return false;
            }
        }
        self.max_pages.is_none_or(|max| self.page < max)
    }

    pub(crate) fn page_done(&mut self, dispatcher: &Dispatcher, records: usize) {
        self.page += 1;
        self.total += records;
        dispatcher.emit(&Diagnostic::PageRetrieved {
            endpoint: self.endpoint.clone(),
            page: self.page,
            max_pages: self.max_pages,
            records,
            total: self.total,
        });
    }

    /// Record a cursor; `false` when the server repeated one.
    pub(crate) fn advance_cursor(&mut self, cursor: &str) -> bool {
        let fresh = self.seen_cursors.insert(cursor.to_owned());
        if !fresh {
            debug!(endpoint = %self.endpoint, cursor, "server repeated a cursor; stopping");
        }
        fresh
    }
}
