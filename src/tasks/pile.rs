use anyhow::{ensure, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;

/// Drains `inputs` by running at most `max_in_flight` workers at a time.
///
/// Workers are started in input order; completion order is unconstrained.
/// The call resolves once the queue and the in-flight set are both empty, so
/// an empty input resolves immediately without starting anything.
///
/// The first worker error aborts the drain and is returned; the remaining
/// in-flight futures are dropped, which cancels them at their next
/// suspension point. Callers that need failure isolation wrap the worker
/// body in [`retry_forever`](crate::tasks::retry::retry_forever).
pub async fn drain_bounded<I, F, Fut>(
    max_in_flight: usize,
    inputs: impl IntoIterator<Item = I>,
    mut worker: F,
) -> Result<()>
where
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    ensure!(max_in_flight > 0, "max_in_flight must be at least 1");

    let mut queue = inputs.into_iter();
    let mut in_flight = FuturesUnordered::new();

    loop {
        while in_flight.len() < max_in_flight {
            match queue.next() {
                Some(input) => in_flight.push(worker(input)),
                None => break,
            }
        }

        match in_flight.next().await {
            Some(finished) => finished?,
            None => return Ok(()),
        }
    }
}
