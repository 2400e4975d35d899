// Cursor-by-last-id pagination.
//
// After each page the driver re-requests with the cursor parameter set
// to the last id seen: the envelope's own cursor when the server sends
// one, otherwise the id of the final record.

use super::envelope::{cursor_id, has_more_flag};
use super::{BaseSequence, PageLoop, PageOptions};
use crate::credential::Credential;
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::materialize::Materializer;
use crate::request::{CallRequest, ParamValue};

/// Parameters of the last-id driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastIdKeys {
    pub cursor_param: &'static str,
    pub size_param: Option<&'static str>,
    /// Page size sent when the caller leaves [`PageOptions::page_size`] unset.
    pub default_size: u32,
}

impl LastIdKeys {
    /// The page size in force: the caller's, else the endpoint default
    /// when the endpoint takes a size parameter.
    fn page_size(&self, options: &PageOptions) -> Option<u32> {
        options
            .page_size
            .or_else(|| self.size_param.map(|_| self.default_size))
    }
}

/// Walk pages by last seen id.
///
/// Stops when a page is empty or flagged `hasMore = false`. Without the
/// flag, a page shorter than the page size is the last one. Also stops
/// when no cursor can be read.
pub async fn last_id_pages<M: Materializer>(
    dispatcher: &Dispatcher,
    credential: &Credential,
    base: CallRequest,
    keys: LastIdKeys,
    options: &PageOptions,
    materializer: &M,
) -> Result<BaseSequence<M::Record>, Error> {
    let endpoint = format!("{}/{}", base.module, base.endpoint);
    let mut progress = PageLoop::new(endpoint, options);
    let mut records: Vec<M::Record> = Vec::new();
    let mut cursor: Option<String> = None;
    let page_size = keys.page_size(options);

    while progress.should_fetch() {
        let mut request = base.clone();
        if let Some(last) = &cursor {
            request
                .query_params
                .insert(keys.cursor_param.to_owned(), ParamValue::Text(last.clone()));
        }
        if let (Some(param), Some(size)) = (keys.size_param, page_size) {
            request
                .query_params
                .insert(param.to_owned(), ParamValue::from(size));
        }

        let response = dispatcher.dispatch(credential, request).await?;
        let batch = materializer.materialize(&response)?;
        let count = batch.len();
        progress.page_done(dispatcher, count);

        let next = cursor_id(&response)
            .or_else(|| batch.last().and_then(|r| materializer.record_id(r)));
        records.extend(batch);

        let last_page = match has_more_flag(&response) {
            Some(more) => !more,
            None => page_size
                .is_some_and(|size| count < usize::try_from(size).unwrap_or(usize::MAX)),
        };
        if count == 0 || last_page {
            break;
        }
        let Some(next) = next else {
            break;
        };
        if !progress.advance_cursor(&next) {
            break;
        }
        cursor = Some(next);
    }

    Ok(records)
}
