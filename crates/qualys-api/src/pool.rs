// Verbose details pool
//
// Some listings return ids only; the details come from one call per id.
// A shared FIFO feeds a fixed number of tokio workers, each dispatching
// independently on the same credential. Workers exit when the queue is
// empty. The first failure stops further dequeuing and is returned once
// every worker has finished.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::credential::Credential;
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::materialize::Materializer;
use crate::request::CallRequest;

type Queue = Arc<Mutex<VecDeque<(usize, String)>>>;

/// Fetch details for every id with `workers` concurrent tasks.
///
/// `build` turns an id into its request. Records come back grouped by
/// id, in the order the ids were supplied.
pub async fn fetch_details<M, F>(
    dispatcher: Arc<Dispatcher>,
    credential: Arc<Credential>,
    ids: impl IntoIterator<Item = String>,
    workers: usize,
    build: F,
    materializer: Arc<M>,
) -> Result<Vec<M::Record>, Error>
where
    M: Materializer + 'static,
    M::Record: 'static,
    F: Fn(&str) -> CallRequest + Send + Sync + 'static,
{
    let queue: Queue = Arc::new(Mutex::new(ids.into_iter().enumerate().collect()));
    let build = Arc::new(build);
    let stop = CancellationToken::new();
    let workers = workers.max(1);
    debug!(workers, "starting details pool");

    let mut set = JoinSet::new();
    for worker in 0..workers {
        let queue = Arc::clone(&queue);
        let dispatcher = Arc::clone(&dispatcher);
        let credential = Arc::clone(&credential);
        let build = Arc::clone(&build);
        let materializer = Arc::clone(&materializer);
        let stop = stop.clone();

        set.spawn(async move {
            let mut fetched = Vec::new();
            while !stop.is_cancelled() {
                let next = queue
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .pop_front();
                let Some((index, id)) = next else {
                    break;
                };

                let outcome = match dispatcher.dispatch(&credential, build(&id)).await {
                    Ok(response) => materializer.materialize(&response),
                    Err(e) => Err(e),
                };
                match outcome {
                    Ok(records) => fetched.push((index, records)),
                    Err(e) => {
                        warn!(worker, %id, error = %e, "details fetch failed");
                        stop.cancel();
                        return Err((index, e));
                    }
                }
            }
            Ok(fetched)
        });
    }

    let mut batches = Vec::new();
    let mut first_error: Option<(usize, Error)> = None;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(fetched)) => batches.extend(fetched),
            // Keep the failure for the earliest id, so the result does not
            // depend on worker scheduling.
            Ok(Err((index, e))) => {
                if first_error.as_ref().is_none_or(|(seen, _)| index < *seen) {
                    first_error = Some((index, e));
                }
            }
            Err(join) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
            Err(_) => {}
        }
    }

    if let Some((_, e)) = first_error {
        return Err(e);
    }
    batches.sort_by_key(|(index, _)| *index);
    Ok(batches.into_iter().flat_map(|(_, records)| records).collect())
}
