// Next-link pagination.
//
// Truncated classic API lists end with a WARNING element whose URL
// points at the next page (usually `...&id_min=<next id>`). The driver
// copies that URL's query pairs into the following request; pairs the
// endpoint does not accept are dropped.

use tracing::debug;
use url::Url;

use super::envelope::next_page_url;
use super::{BaseSequence, PageLoop, PageOptions};
use crate::credential::Credential;
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::materialize::Materializer;
use crate::registry::describe;
use crate::request::{CallRequest, ParamValue};

/// Follow next-page links until the server stops sending one.
pub async fn next_link_pages<M: Materializer>(
    dispatcher: &Dispatcher,
    credential: &Credential,
    base: CallRequest,
    options: &PageOptions,
    materializer: &M,
) -> Result<BaseSequence<M::Record>, Error> {
    let desc = describe(&base.module, &base.endpoint)?;
    let mut progress = PageLoop::new(desc.qualified_name(), options);
    let mut records = Vec::new();
    let mut request = base;

    while progress.should_fetch() {
        let response = dispatcher.dispatch(credential, request.clone()).await?;
        let batch = materializer.materialize(&response)?;
        progress.page_done(dispatcher, batch.len());
        records.extend(batch);

        let Some(next) = next_page_url(&response) else {
            break;
        };
        if !progress.advance_cursor(&next) {
            break;
        }

        let url = Url::parse(&next)?;
        for (key, value) in url.query_pairs() {
            if desc.allows_param(&key) {
                request
                    .query_params
                    .insert(key.into_owned(), ParamValue::Text(value.into_owned()));
            } else {
                debug!(%key, "ignoring next-link parameter the endpoint does not accept");
            }
        }
    }

    Ok(records)
}
