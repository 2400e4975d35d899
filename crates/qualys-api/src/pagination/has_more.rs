// QPS hasMoreRecords pagination.
//
// QPS search endpoints return at most `limitResults` records plus a
// `hasMoreRecords` flag and the `lastId` served. The next page is the
// same search with `id GREATER lastId` appended to the filters.

use super::envelope::{cursor_id, has_more_flag};
use super::{BaseSequence, PageLoop, PageOptions};
use crate::credential::Credential;
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::materialize::Materializer;
use crate::qps::{Criterion, service_request_xml};
use crate::request::CallRequest;

/// Walk a QPS search until `hasMoreRecords` is false.
pub async fn has_more_pages<M: Materializer>(
    dispatcher: &Dispatcher,
    credential: &Credential,
    base: CallRequest,
    options: &PageOptions,
    materializer: &M,
) -> Result<BaseSequence<M::Record>, Error> {
    let endpoint = format!("{}/{}", base.module, base.endpoint);
    let mut progress = PageLoop::new(endpoint, options);
    let mut records = Vec::new();
    let mut last_id: Option<String> = None;

    while progress.should_fetch() {
        let mut criteria = options.criteria.clone();
        if let Some(id) = &last_id {
            criteria.push(Criterion::id_greater(id.clone()));
        }
        let request = base
            .clone()
            .xml_body(service_request_xml(&criteria, options.page_size));

        let response = dispatcher.dispatch(credential, request).await?;
        let batch = materializer.materialize(&response)?;
        progress.page_done(dispatcher, batch.len());
        records.extend(batch);

        if has_more_flag(&response) != Some(true) {
            break;
        }
        let Some(next) = cursor_id(&response) else {
            break;
        };
        if !progress.advance_cursor(&next) {
            break;
        }
        last_id = Some(next);
    }

    Ok(records)
}
