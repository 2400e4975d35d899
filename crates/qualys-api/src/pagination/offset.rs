// Page-number pagination.
//
// Writes the page number (and page size, when the caller set one) into
// the query or body, then walks pages until one comes back without
// records. Endpoints that end with an empty body also stop on that.

use tracing::debug;

use super::{BaseSequence, PageLoop, PageOptions};
use crate::credential::Credential;
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::materialize::Materializer;
use crate::registry::ParamPlacement;
use crate::request::{CallRequest, ParamValue};

/// Parameters of the page-number driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetKeys {
    pub page_param: &'static str,
    pub size_param: &'static str,
    pub first_page: u32,
    pub placement: ParamPlacement,
    /// Also stop when the server answers with an empty body.
    pub stop_on_empty_body: bool,
}

impl OffsetKeys {
    fn apply(&self, request: &mut CallRequest, page: u32, page_size: Option<u32>) {
        let target = match self.placement {
            ParamPlacement::Query => &mut request.query_params,
            ParamPlacement::Body => &mut request.body_fields,
        };
        target.insert(self.page_param.to_owned(), ParamValue::from(page));
        if let Some(size) = page_size {
            target.insert(self.size_param.to_owned(), ParamValue::from(size));
        }
    }
}

/// Walk numbered pages starting at `keys.first_page`.
pub async fn offset_pages<M: Materializer>(
    dispatcher: &Dispatcher,
    credential: &Credential,
    base: CallRequest,
    keys: OffsetKeys,
    options: &PageOptions,
    materializer: &M,
) -> Result<BaseSequence<M::Record>, Error> {
    let endpoint = format!("{}/{}", base.module, base.endpoint);
    let mut progress = PageLoop::new(endpoint, options);
    let mut records = Vec::new();
    let mut page = keys.first_page;

    while progress.should_fetch() {
        let mut request = base.clone();
        keys.apply(&mut request, page, options.page_size);

        let response = dispatcher.dispatch(credential, request).await?;
        if keys.stop_on_empty_body && response.is_empty() {
            debug!(page, "empty body; last page reached");
            break;
        }

        let batch = materializer.materialize(&response)?;
        let count = batch.len();
        progress.page_done(dispatcher, count);
        records.extend(batch);

        if count == 0 {
            break;
        }
        page += 1;
    }

    Ok(records)
}
